//! Errors surfaced by the dispatch broker.

use crate::dispatch::ConnectionId;
use crate::model::{OrderId, OrderStatus, PartnerId};
use crate::order_store::OrderError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    #[error(transparent)]
    Order(#[from] OrderError),

    /// The partner is not known to the partner directory.
    #[error("Unknown delivery partner: {0}")]
    UnknownPartner(PartnerId),

    /// Location reports are only accepted while an order is out for delivery.
    #[error("{order_id} is {status}, location reports need OUT_FOR_DELIVERY")]
    InvalidState { order_id: OrderId, status: OrderStatus },

    #[error("Invalid coordinates: {lat}, {lng}")]
    InvalidLocation { lat: f64, lng: f64 },

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),

    /// A backing actor has shut down.
    #[error("Dispatch unavailable: {0}")]
    Unavailable(String),
}

/// Coarse classification of a [`DispatchError`], for callers mapping errors onto a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    StaleStateConflict,
    Unauthorized,
    InvalidTransition,
    InvalidState,
    Validation,
    Unavailable,
}

impl DispatchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DispatchError::Order(e) => match e {
                OrderError::NotFound(_) => ErrorKind::NotFound,
                OrderError::StaleStateConflict { .. } => ErrorKind::StaleStateConflict,
                OrderError::Unauthorized { .. } => ErrorKind::Unauthorized,
                OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
                OrderError::Validation(_) => ErrorKind::Validation,
                OrderError::StoreUnavailable(_) => ErrorKind::Unavailable,
            },
            DispatchError::UnknownPartner(_) | DispatchError::UnknownConnection(_) => ErrorKind::NotFound,
            DispatchError::InvalidState { .. } => ErrorKind::InvalidState,
            DispatchError::InvalidLocation { .. } => ErrorKind::Validation,
            DispatchError::Unavailable(_) => ErrorKind::Unavailable,
        }
    }

    /// Whether the caller lost a race and should refetch the order.
    pub fn is_stale(&self) -> bool {
        self.kind() == ErrorKind::StaleStateConflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_errors_keep_their_kind() {
        let stale: DispatchError = OrderError::StaleStateConflict {
            order_id: OrderId(1),
            expected: OrderStatus::Placed,
            actual: OrderStatus::Confirmed,
        }
        .into();
        assert!(stale.is_stale());
        assert_eq!(stale.to_string(), "Stale state for order_1: expected PLACED, found CONFIRMED");

        let missing: DispatchError = OrderError::NotFound(OrderId(2)).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);
        assert_eq!(
            DispatchError::UnknownPartner(PartnerId::new("ghost")).kind(),
            ErrorKind::NotFound
        );
    }
}
