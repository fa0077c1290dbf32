//! # Order State Machine
//!
//! ```text
//! PLACED --accept--> CONFIRMED --mark preparing--> PREPARING --mark picked up--> OUT_FOR_DELIVERY --mark delivered--> DELIVERED
//!    \__________________\_____________________________\_______________________________\--cancel--> CANCELLED
//! ```
//!
//! Every transition is submitted as a [`ConditionalTransition`]: it names the status the caller
//! observed, and the store applies it only if the persisted status still matches.

use crate::model::{OrderStatus, PartnerId};

#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A partner takes an unassigned order.
    Accept { partner_id: PartnerId },
    /// The assigned partner reports the order is being prepared.
    MarkPreparing { partner_id: PartnerId },
    /// The assigned partner has collected the order.
    MarkPickedUp { partner_id: PartnerId },
    /// The assigned partner has handed the order over.
    MarkDelivered { partner_id: PartnerId },
    /// Admin or system cancellation from any non-terminal state.
    Cancel { reason: String },
}

impl Transition {
    pub fn target(&self) -> OrderStatus {
        match self {
            Transition::Accept { .. } => OrderStatus::Confirmed,
            Transition::MarkPreparing { .. } => OrderStatus::Preparing,
            Transition::MarkPickedUp { .. } => OrderStatus::OutForDelivery,
            Transition::MarkDelivered { .. } => OrderStatus::Delivered,
            Transition::Cancel { .. } => OrderStatus::Cancelled,
        }
    }

    /// Whether this transition is an edge of the state machine when leaving `from`.
    pub fn is_allowed_from(&self, from: OrderStatus) -> bool {
        match self {
            Transition::Accept { .. } => from == OrderStatus::Placed,
            Transition::MarkPreparing { .. } => from == OrderStatus::Confirmed,
            Transition::MarkPickedUp { .. } => from == OrderStatus::Preparing,
            Transition::MarkDelivered { .. } => from == OrderStatus::OutForDelivery,
            Transition::Cancel { .. } => !from.is_terminal(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transition::Accept { .. } => "accept",
            Transition::MarkPreparing { .. } => "mark preparing",
            Transition::MarkPickedUp { .. } => "mark picked up",
            Transition::MarkDelivered { .. } => "mark delivered",
            Transition::Cancel { .. } => "cancel",
        }
    }
}

/// A transition guarded by the status the caller last observed.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalTransition {
    pub expected: OrderStatus,
    pub transition: Transition,
}

impl ConditionalTransition {
    pub fn new(expected: OrderStatus, transition: Transition) -> Self {
        Self { expected, transition }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [OrderStatus; 6] = [
        OrderStatus::Placed,
        OrderStatus::Confirmed,
        OrderStatus::Preparing,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    #[test]
    fn each_partner_step_has_exactly_one_source_state() {
        let p = PartnerId::new("p1");
        let steps = [
            Transition::Accept { partner_id: p.clone() },
            Transition::MarkPreparing { partner_id: p.clone() },
            Transition::MarkPickedUp { partner_id: p.clone() },
            Transition::MarkDelivered { partner_id: p },
        ];
        for step in steps {
            let sources: Vec<_> = ALL.iter().filter(|s| step.is_allowed_from(**s)).collect();
            assert_eq!(sources.len(), 1, "{} should leave exactly one state", step.name());
        }
    }

    #[test]
    fn cancel_is_allowed_from_every_non_terminal_state() {
        let cancel = Transition::Cancel { reason: "out of stock".into() };
        for status in ALL {
            assert_eq!(cancel.is_allowed_from(status), !status.is_terminal());
        }
        assert_eq!(cancel.target(), OrderStatus::Cancelled);
    }
}
