//! Error types for the order store.

use crate::model::{OrderId, OrderStatus, PartnerId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderError {
    /// The requested order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The conditional update lost: the persisted order no longer matches what the caller saw.
    /// The caller must refetch before deciding what to do next.
    #[error("Stale state for {order_id}: expected {expected}, found {actual}")]
    StaleStateConflict {
        order_id: OrderId,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    /// The acting partner is not the partner assigned to the order.
    #[error("Partner {partner_id} is not assigned to {order_id}")]
    Unauthorized { order_id: OrderId, partner_id: PartnerId },

    /// The requested step is not a legal move from the order's current state.
    #[error("Cannot {action} {order_id} while it is {status}")]
    InvalidTransition {
        order_id: OrderId,
        status: OrderStatus,
        action: &'static str,
    },

    /// The order data supplied at checkout is invalid.
    #[error("Order validation error: {0}")]
    Validation(String),

    /// The store could not be reached or failed internally.
    #[error("Order store unavailable: {0}")]
    StoreUnavailable(String),
}
