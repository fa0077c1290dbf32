//! Type-safe wrappers around [`StoreClient`](crate::store::StoreClient).

pub mod order_client;

pub use order_client::*;
