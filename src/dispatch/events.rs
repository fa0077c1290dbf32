//! # Dispatch Events
//!
//! Everything the core pushes to connected clients. Events serialise with a `type` tag and
//! camelCase fields, e.g.
//!
//! ```json
//! {"type":"order.statusChanged","orderId":7,"status":"OUT_FOR_DELIVERY","timestamp":"2026-10-19T09:12:44Z","version":4,"partnerId":"p-17"}
//! ```

use crate::earnings::{EarningsBreakdown, EarningsPolicy};
use crate::geo::GeoPoint;
use crate::model::{Order, OrderId, OrderStatus, PartnerId, PaymentMethod};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What a partner sees for an order they could accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderOffer {
    pub order_id: OrderId,
    pub order_number: String,
    pub item_count: usize,
    pub order_total: f64,
    pub payment_method: PaymentMethod,
    pub city: String,
    pub destination: Option<GeoPoint>,
    pub placed_at: DateTime<Utc>,
    /// Computed with the same policy that credits the delivery.
    pub earnings: EarningsBreakdown,
}

impl OrderOffer {
    pub fn from_order(order: &Order, policy: &EarningsPolicy) -> Self {
        Self {
            order_id: order.id,
            order_number: order.order_number.clone(),
            item_count: order.item_count(),
            order_total: order.total,
            payment_method: order.payment_method,
            city: order.address.city.clone(),
            destination: order.destination(),
            placed_at: order.timestamps.placed_at,
            earnings: policy.calculate(order.item_count()),
        }
    }
}

/// A processed position sample for an order out for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpdate {
    pub order_id: OrderId,
    pub partner_id: PartnerId,
    pub location: GeoPoint,
    pub sampled_at: DateTime<Utc>,
    /// Absent when the delivery address has no coordinates.
    pub distance_remaining_km: Option<f64>,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetractReason {
    /// Another partner won the order.
    Assigned,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DispatchEvent {
    /// A new order is open for acceptance. Sent to every registered partner.
    #[serde(rename = "order.offered")]
    OrderOffered { offer: OrderOffer },

    /// An offered order is no longer available. Sent to every partner except the winner.
    #[serde(rename = "order.retracted", rename_all = "camelCase")]
    OrderRetracted { order_id: OrderId, reason: RetractReason },

    /// Confirmation to the partner whose accept won.
    #[serde(rename = "order.accepted", rename_all = "camelCase")]
    OrderAccepted {
        order_id: OrderId,
        order_number: String,
        earnings: EarningsBreakdown,
    },

    #[serde(rename = "order.statusChanged", rename_all = "camelCase")]
    StatusChanged {
        order_id: OrderId,
        status: OrderStatus,
        timestamp: DateTime<Utc>,
        version: u64,
        partner_id: Option<PartnerId>,
    },

    #[serde(rename = "order.locationUpdated")]
    LocationUpdated(LocationUpdate),

    /// Sent to the assigned partner once the order is delivered.
    #[serde(rename = "partner.earningsCredited", rename_all = "camelCase")]
    EarningsCredited {
        order_id: OrderId,
        earnings: EarningsBreakdown,
    },
}

impl DispatchEvent {
    /// Status notification for a committed order snapshot.
    pub fn status_changed(order: &Order) -> Self {
        DispatchEvent::StatusChanged {
            order_id: order.id,
            status: order.status,
            timestamp: order
                .timestamps
                .entered(order.status)
                .unwrap_or(order.timestamps.placed_at),
            version: order.version,
            partner_id: order.assigned_partner_id.clone(),
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            DispatchEvent::OrderOffered { offer } => offer.order_id,
            DispatchEvent::OrderRetracted { order_id, .. }
            | DispatchEvent::OrderAccepted { order_id, .. }
            | DispatchEvent::StatusChanged { order_id, .. }
            | DispatchEvent::EarningsCredited { order_id, .. } => *order_id,
            DispatchEvent::LocationUpdated(update) => update.order_id,
        }
    }
}
