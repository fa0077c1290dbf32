//! # Mock Store & Testing Guide
//!
//! `MockStore<T>` hands out a real [`StoreClient<T>`] whose requests are answered from a
//! queue of scripted expectations instead of a running [`StoreActor`](crate::store::StoreActor).
//! Use it to test code that sits *around* the store, such as error mapping in a client
//! wrapper or a failure path that is hard to provoke with real state.
//!
//! | | MockStore | Real store |
//! |---|---|---|
//! | **State** | None, scripted replies | Real documents, real CAS |
//! | **Determinism** | Total | Subject to the scheduler |
//! | **Error injection** | `return_err` | Requires crafting the state |
//!
//! ```rust,ignore
//! let mut mock = MockStore::<Order>::new();
//! mock.expect_get(OrderId(1)).return_ok(Some(order));
//! mock.expect_action(OrderId(1)).return_err(StoreError::StoreClosed);
//!
//! let orders = OrderClient::new(mock.client());
//! // exercise orders...
//! mock.verify();
//! ```
//!
//! For finer control, [`create_mock_client`] returns the raw request receiver so a test can
//! inspect each request and reply by hand (see [`expect_action`]).

use crate::store::client::StoreClient;
use crate::store::document::Document;
use crate::store::error::StoreError;
use crate::store::message::StoreRequest;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};

/// A scripted reply. The id recorded with Get/Action is checked against the request.
enum Expectation<T: Document> {
    Get {
        id: T::Id,
        response: Result<Option<T>, StoreError>,
    },
    Create {
        response: Result<T::Id, StoreError>,
    },
    List {
        response: Result<Vec<T>, StoreError>,
    },
    Action {
        id: T::Id,
        response: Result<T::ActionResult, StoreError>,
    },
}

type Expectations<T> = Arc<Mutex<VecDeque<Expectation<T>>>>;

/// A mock store answering requests from a FIFO of expectations.
///
/// A request that does not match the next expectation (wrong kind or wrong id) panics the
/// background task; the caller then observes [`StoreError::StoreDropped`].
pub struct MockStore<T: Document> {
    client: StoreClient<T>,
    expectations: Expectations<T>,
    _handle: tokio::task::JoinHandle<()>,
}

impl<T: Document> Default for MockStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> MockStore<T> {
    /// Creates a mock with no expectations. Must be called inside a Tokio runtime.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest<T>>(100);
        let expectations: Expectations<T> = Arc::new(Mutex::new(VecDeque::new()));
        let queue = expectations.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = queue.lock().unwrap().pop_front();

                match (request, expectation) {
                    (StoreRequest::Get { id, respond_to }, Some(Expectation::Get { id: expected, response })) => {
                        assert_eq!(id, expected, "Get for an unexpected id");
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::Create { respond_to, .. }, Some(Expectation::Create { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::List { respond_to, .. }, Some(Expectation::List { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (
                        StoreRequest::Action { id, respond_to, .. },
                        Some(Expectation::Action { id: expected, response }),
                    ) => {
                        assert_eq!(id, expected, "Action for an unexpected id");
                        let _ = respond_to.send(response);
                    }
                    (request, _) => {
                        panic!("Unexpected request or expectation mismatch: {request:?}");
                    }
                }
            }
        });

        Self {
            client: StoreClient::new(sender),
            expectations,
            _handle: handle,
        }
    }

    /// A client wired to this mock.
    pub fn client(&self) -> StoreClient<T> {
        self.client.clone()
    }

    pub fn expect_get(&mut self, id: T::Id) -> ExpectationBuilder<T, Option<T>> {
        self.builder(move |response| Expectation::Get { id, response })
    }

    pub fn expect_create(&mut self) -> ExpectationBuilder<T, T::Id> {
        self.builder(|response| Expectation::Create { response })
    }

    pub fn expect_list(&mut self) -> ExpectationBuilder<T, Vec<T>> {
        self.builder(|response| Expectation::List { response })
    }

    pub fn expect_action(&mut self, id: T::Id) -> ExpectationBuilder<T, T::ActionResult> {
        self.builder(move |response| Expectation::Action { id, response })
    }

    /// Panics if any expectation is still queued.
    pub fn verify(&self) {
        let remaining = self.expectations.lock().unwrap().len();
        if remaining > 0 {
            panic!("Not all expectations were met. {remaining} remaining");
        }
    }

    fn builder<R>(
        &mut self,
        make: impl FnOnce(Result<R, StoreError>) -> Expectation<T> + Send + 'static,
    ) -> ExpectationBuilder<T, R> {
        ExpectationBuilder {
            make: Box::new(make),
            expectations: self.expectations.clone(),
        }
    }
}

/// Completes an expectation with its scripted reply.
pub struct ExpectationBuilder<T: Document, R> {
    make: Box<dyn FnOnce(Result<R, StoreError>) -> Expectation<T> + Send>,
    expectations: Expectations<T>,
}

impl<T: Document, R> ExpectationBuilder<T, R> {
    pub fn return_ok(self, value: R) {
        self.push(Ok(value));
    }

    pub fn return_err(self, error: StoreError) {
        self.push(Err(error));
    }

    fn push(self, response: Result<R, StoreError>) {
        let expectation = (self.make)(response);
        self.expectations.lock().unwrap().push_back(expectation);
    }
}

// =============================================================================
// RAW CHANNEL HELPERS
// =============================================================================

/// A client plus the receiver its requests land on.
pub fn create_mock_client<T: Document>(buffer_size: usize) -> (StoreClient<T>, mpsc::Receiver<StoreRequest<T>>) {
    let (sender, receiver) = mpsc::channel(buffer_size);
    (StoreClient::new(sender), receiver)
}

/// Next request, if it is a Create.
pub async fn expect_create<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Create, oneshot::Sender<Result<T::Id, StoreError>>)> {
    match receiver.recv().await {
        Some(StoreRequest::Create { params, respond_to }) => Some((params, respond_to)),
        _ => None,
    }
}

/// Next request, if it is a Get.
pub async fn expect_get<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Id, oneshot::Sender<Result<Option<T>, StoreError>>)> {
    match receiver.recv().await {
        Some(StoreRequest::Get { id, respond_to }) => Some((id, respond_to)),
        _ => None,
    }
}

/// Next request, if it is an Action.
pub async fn expect_action<T: Document>(
    receiver: &mut mpsc::Receiver<StoreRequest<T>>,
) -> Option<(T::Id, T::Action, oneshot::Sender<Result<T::ActionResult, StoreError>>)> {
    match receiver.recv().await {
        Some(StoreRequest::Action { id, action, respond_to }) => Some((id, action, respond_to)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreActor;
    use async_trait::async_trait;

    #[derive(Clone, Debug, PartialEq)]
    struct Counter {
        id: u32,
        value: u32,
    }

    #[derive(Debug)]
    enum CounterAction {
        /// Increment only if the current value equals the first field.
        IncrementIf(u32),
    }

    #[derive(Debug, thiserror::Error, PartialEq)]
    #[error("expected {expected}, found {actual}")]
    struct Stale {
        expected: u32,
        actual: u32,
    }

    #[async_trait]
    impl Document for Counter {
        type Id = u32;
        type Create = u32;
        type Action = CounterAction;
        type ActionResult = u32;
        type Context = ();
        type Error = Stale;

        fn from_create_params(id: u32, value: u32) -> Result<Self, Self::Error> {
            Ok(Self { id, value })
        }

        async fn handle_action(&mut self, action: CounterAction, _ctx: &()) -> Result<u32, Self::Error> {
            let CounterAction::IncrementIf(expected) = action;
            // Mutate first to prove a rejected draft is discarded
            let actual = self.value;
            self.value += 1;
            if actual != expected {
                return Err(Stale { expected, actual });
            }
            Ok(self.value)
        }
    }

    #[tokio::test]
    async fn raw_channel_create() {
        let (client, mut receiver) = create_mock_client::<Counter>(10);
        let task = tokio::spawn(async move { client.create(5).await });

        let (params, responder) = expect_create(&mut receiver).await.expect("Expected Create request");
        assert_eq!(params, 5);
        responder.send(Ok(1)).unwrap();

        assert!(matches!(task.await.unwrap(), Ok(1)));
    }

    #[tokio::test]
    async fn fluent_expectations() {
        let mut mock = MockStore::<Counter>::new();
        mock.expect_create().return_ok(1);
        mock.expect_get(1).return_ok(Some(Counter { id: 1, value: 9 }));
        mock.expect_action(1).return_err(StoreError::StoreClosed);

        let client = mock.client();
        assert_eq!(client.create(9).await.unwrap(), 1);
        assert_eq!(client.get(1).await.unwrap().unwrap().value, 9);
        assert!(matches!(
            client.perform_action(1, CounterAction::IncrementIf(9)).await,
            Err(StoreError::StoreClosed)
        ));
        mock.verify();
    }

    #[tokio::test]
    async fn real_store_commits_only_successful_actions() {
        let (actor, client) = StoreActor::<Counter>::new(10);
        let handle = tokio::spawn(actor.run(()));

        let id = client.create(0).await.unwrap();
        assert_eq!(client.perform_action(id, CounterAction::IncrementIf(0)).await.unwrap(), 1);

        let stale = client
            .perform_action(id, CounterAction::IncrementIf(0))
            .await
            .unwrap_err()
            .into_document_error::<Stale>()
            .unwrap();
        assert_eq!(stale, Stale { expected: 0, actual: 1 });
        assert_eq!(client.get(id).await.unwrap().unwrap().value, 1);

        assert!(matches!(
            client.perform_action(99, CounterAction::IncrementIf(0)).await,
            Err(StoreError::NotFound(_))
        ));

        drop(client);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn list_is_filtered_and_ordered_by_id() {
        let (actor, client) = StoreActor::<Counter>::new(10);
        tokio::spawn(actor.run(()));
        for value in [10, 3, 7, 12] {
            client.create(value).await.unwrap();
        }
        let big = client.list(|c: &Counter| c.value >= 7).await.unwrap();
        let ids: Vec<u32> = big.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }
}
