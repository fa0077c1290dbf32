//! # Store Messages
//!
//! Requests sent from a [`StoreClient`](crate::store::StoreClient) to a
//! [`StoreActor`](crate::store::StoreActor). Each carries a oneshot sender for its reply.

use crate::store::document::Document;
use crate::store::error::StoreError;
use tokio::sync::oneshot;

/// One-shot reply channel used by the store.
pub type Response<T> = oneshot::Sender<Result<T, StoreError>>;

/// Predicate used by [`StoreRequest::List`].
pub type Filter<T> = Box<dyn Fn(&T) -> bool + Send + Sync>;

/// Requests understood by the store.
///
/// - **Create**: builds a document from [`Document::Create`] and inserts it under a fresh id.
/// - **Get**: a snapshot of one document, or `None`.
/// - **List**: snapshots of every document matching a filter, in id order.
/// - **Action**: an atomic conditional update of one document.
pub enum StoreRequest<T: Document> {
    Create {
        params: T::Create,
        respond_to: Response<T::Id>,
    },
    Get {
        id: T::Id,
        respond_to: Response<Option<T>>,
    },
    List {
        filter: Filter<T>,
        respond_to: Response<Vec<T>>,
    },
    Action {
        id: T::Id,
        action: T::Action,
        respond_to: Response<T::ActionResult>,
    },
}

impl<T: Document> std::fmt::Debug for StoreRequest<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreRequest::Create { params, .. } => f.debug_struct("Create").field("params", params).finish(),
            StoreRequest::Get { id, .. } => f.debug_struct("Get").field("id", id).finish(),
            StoreRequest::List { .. } => f.write_str("List"),
            StoreRequest::Action { id, action, .. } => {
                f.debug_struct("Action").field("id", id).field("action", action).finish()
            }
        }
    }
}
