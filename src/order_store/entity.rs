//! [`Document`] implementation for [`Order`].
//!
//! The store runs [`Document::handle_action`] on a draft copy of the order and commits it only
//! on `Ok`, so every check below either rejects the whole transition or lets it through
//! together with its version bump and timestamp.

use crate::model::{Order, OrderCreate, OrderId, OrderStatus};
use crate::order_store::{CommitHooks, ConditionalTransition, OrderError, Transition};
use crate::store::Document;
use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

#[async_trait]
impl Document for Order {
    type Id = OrderId;
    type Create = OrderCreate;
    type Action = ConditionalTransition;
    type ActionResult = Order;
    type Context = CommitHooks;
    type Error = OrderError;

    fn from_create_params(id: OrderId, params: OrderCreate) -> Result<Self, OrderError> {
        validate(&params)?;
        Ok(Order::new(id, params, Utc::now()))
    }

    async fn handle_action(&mut self, action: ConditionalTransition, _hooks: &CommitHooks) -> Result<Order, OrderError> {
        let ConditionalTransition { expected, transition } = action;

        if self.status != expected {
            return Err(OrderError::StaleStateConflict {
                order_id: self.id,
                expected,
                actual: self.status,
            });
        }
        if !transition.is_allowed_from(self.status) {
            return Err(OrderError::InvalidTransition {
                order_id: self.id,
                status: self.status,
                action: transition.name(),
            });
        }

        match &transition {
            Transition::Accept { partner_id } => {
                // A PLACED order that already carries a partner was taken by someone else
                if self.assigned_partner_id.is_some() {
                    return Err(OrderError::StaleStateConflict {
                        order_id: self.id,
                        expected,
                        actual: OrderStatus::Confirmed,
                    });
                }
                self.assigned_partner_id = Some(partner_id.clone());
            }
            Transition::MarkPreparing { partner_id }
            | Transition::MarkPickedUp { partner_id }
            | Transition::MarkDelivered { partner_id } => {
                if !self.is_assigned_to(partner_id) {
                    return Err(OrderError::Unauthorized {
                        order_id: self.id,
                        partner_id: partner_id.clone(),
                    });
                }
            }
            Transition::Cancel { reason } => {
                self.cancellation_reason = Some(reason.clone());
            }
        }

        let now = Utc::now();
        let target = transition.target();
        let timestamps = &mut self.timestamps;
        match target {
            OrderStatus::Confirmed => timestamps.confirmed_at = Some(now),
            OrderStatus::Preparing => timestamps.preparing_at = Some(now),
            OrderStatus::OutForDelivery => timestamps.picked_up_at = Some(now),
            OrderStatus::Delivered => timestamps.delivered_at = Some(now),
            OrderStatus::Cancelled => timestamps.cancelled_at = Some(now),
            OrderStatus::Placed => {}
        }
        self.status = target;
        self.version += 1;
        debug_assert!(
            self.status == OrderStatus::Cancelled
                || self.assigned_partner_id.is_some() == self.status.requires_partner(),
            "order {} is {} with partner {:?}",
            self.id,
            self.status,
            self.assigned_partner_id
        );

        Ok(self.clone())
    }

    async fn on_commit(&self, hooks: &CommitHooks) {
        if self.status.is_terminal() {
            if let Err(e) = hooks.samples.close(self.id).await {
                warn!(order_id = %self.id, error = %e, "Could not close tracking");
            }
        }
        hooks.hub.publish_order(self.clone()).await;
    }
}

fn validate(params: &OrderCreate) -> Result<(), OrderError> {
    if params.items.is_empty() {
        return Err(OrderError::Validation("order has no items".into()));
    }
    for item in &params.items {
        if item.quantity == 0 {
            return Err(OrderError::Validation(format!("{} has zero quantity", item.product_id)));
        }
        if !item.unit_price.is_finite() || item.unit_price < 0.0 {
            return Err(OrderError::Validation(format!("{} has an invalid price", item.product_id)));
        }
    }
    if !params.delivery_fee.is_finite() || params.delivery_fee < 0.0 {
        return Err(OrderError::Validation("delivery fee must be a non-negative amount".into()));
    }
    if let Some(location) = params.address.location {
        if !location.is_valid() {
            return Err(OrderError::Validation(format!(
                "delivery coordinates out of range: {}, {}",
                location.lat, location.lng
            )));
        }
    }
    Ok(())
}
