use crate::model::{Order, OrderCreate, OrderId, OrderStatus};
use crate::order_store::{ConditionalTransition, OrderError};
use crate::store::{DocumentClient, StoreClient, StoreError};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Client for the order store.
///
/// Document errors raised inside the store come back as the original [`OrderError`]; engine
/// failures become [`OrderError::StoreUnavailable`].
#[derive(Clone)]
pub struct OrderClient {
    inner: StoreClient<Order>,
}

impl OrderClient {
    pub fn new(inner: StoreClient<Order>) -> Self {
        Self { inner }
    }

    #[instrument(skip(self, params), fields(customer_id = %params.customer_id, items = params.items.len()))]
    pub async fn create_order(&self, params: OrderCreate) -> Result<OrderId, OrderError> {
        debug!("Sending create");
        self.inner.create(params).await.map_err(Self::map_error)
    }

    /// The order, or [`OrderError::NotFound`].
    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        self.fetch(id).await?.ok_or(OrderError::NotFound(id))
    }

    /// Orders still PLACED with no partner, oldest first.
    pub async fn list_unassigned(&self) -> Result<Vec<Order>, OrderError> {
        self.list_where(Order::is_open_for_dispatch).await
    }

    /// Orders currently in `status`, oldest first.
    pub async fn list_by_status(&self, status: OrderStatus) -> Result<Vec<Order>, OrderError> {
        self.list_where(move |order: &Order| order.status == status).await
    }

    /// Submits a conditional transition and returns the committed order.
    #[instrument(skip(self))]
    pub async fn apply(&self, id: OrderId, transition: ConditionalTransition) -> Result<Order, OrderError> {
        self.inner
            .perform_action(id, transition)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => OrderError::NotFound(id),
                other => Self::map_error(other),
            })
    }
}

#[async_trait]
impl DocumentClient<Order> for OrderClient {
    type Error = OrderError;

    fn inner(&self) -> &StoreClient<Order> {
        &self.inner
    }

    fn map_error(e: StoreError) -> Self::Error {
        match e.into_document_error::<OrderError>() {
            Ok(order_error) => order_error,
            Err(other) => OrderError::StoreUnavailable(other.to_string()),
        }
    }
}
