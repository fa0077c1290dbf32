//! # DocumentClient Trait
//!
//! Common surface for document-specific clients: they expose their inner
//! [`StoreClient`] and an error mapping, and get `fetch` and `list_where` for free.

use crate::store::{Document, StoreClient, StoreError};
use async_trait::async_trait;

#[async_trait]
pub trait DocumentClient<T: Document>: Send + Sync {
    /// The document-specific error type.
    type Error: Send + Sync;

    /// Access the inner generic client.
    fn inner(&self) -> &StoreClient<T>;

    /// Map store errors to the document error type.
    fn map_error(e: StoreError) -> Self::Error;

    /// Fetch a document by id.
    #[tracing::instrument(skip(self))]
    async fn fetch(&self, id: T::Id) -> Result<Option<T>, Self::Error> {
        tracing::debug!("Sending request");
        self.inner().get(id).await.map_err(Self::map_error)
    }

    /// All documents matching `filter`, in id order.
    async fn list_where<F>(&self, filter: F) -> Result<Vec<T>, Self::Error>
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.inner().list(filter).await.map_err(Self::map_error)
    }
}
