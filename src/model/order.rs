//! Represents a customer order as persisted by the order store.
//!
//! # Document Store
//! [`Order`] implements the [`Document`](crate::store::Document) trait (see
//! [`order_store::entity`](crate::order_store::entity)), so it can only change through
//! the conditional transitions of the order state machine.

use crate::geo::GeoPoint;
use crate::model::PartnerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub u32);

impl From<u32> for OrderId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

/// Fulfilment state. `Placed` is initial; `Delivered` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// States in which an order must carry an assigned partner.
    pub fn requires_partner(self) -> bool {
        matches!(
            self,
            OrderStatus::Confirmed | OrderStatus::Preparing | OrderStatus::OutForDelivery | OrderStatus::Delivered
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered product, with name and price snapshotted at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: f64,
    pub quantity: u32,
}

impl LineItem {
    pub fn new(product_id: impl Into<String>, name: impl Into<String>, unit_price: f64, quantity: u32) -> Self {
        Self {
            product_id: product_id.into(),
            name: name.into(),
            unit_price,
            quantity,
        }
    }

    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity as f64
    }
}

/// Delivery address snapshot. Coordinates come from an external geocoder and may be missing.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub name: String,
    pub phone: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub location: Option<GeoPoint>,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    Upi,
    Wallet,
}

/// When each reached state was entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusTimestamps {
    pub placed_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub preparing_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    pub fn placed(at: DateTime<Utc>) -> Self {
        Self {
            placed_at: at,
            confirmed_at: None,
            preparing_at: None,
            picked_up_at: None,
            delivered_at: None,
            cancelled_at: None,
        }
    }

    /// Time at which the order entered `status`, if it ever did.
    pub fn entered(&self, status: OrderStatus) -> Option<DateTime<Utc>> {
        match status {
            OrderStatus::Placed => Some(self.placed_at),
            OrderStatus::Confirmed => self.confirmed_at,
            OrderStatus::Preparing => self.preparing_at,
            OrderStatus::OutForDelivery => self.picked_up_at,
            OrderStatus::Delivered => self.delivered_at,
            OrderStatus::Cancelled => self.cancelled_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub subtotal: f64,
    pub delivery_fee: f64,
    pub total: f64,
    pub payment_method: PaymentMethod,
    pub address: DeliveryAddress,
    pub status: OrderStatus,
    pub assigned_partner_id: Option<PartnerId>,
    pub timestamps: StatusTimestamps,
    pub cancellation_reason: Option<String>,
    /// Starts at 1 and grows by one with every committed transition.
    pub version: u64,
}

/// Payload for creating a new order, produced by the external checkout flow.
#[derive(Debug, Clone)]
pub struct OrderCreate {
    pub customer_id: String,
    pub items: Vec<LineItem>,
    pub address: DeliveryAddress,
    pub payment_method: PaymentMethod,
    pub delivery_fee: f64,
}

impl Order {
    /// A freshly placed order. Totals are derived from the line items.
    pub fn new(id: OrderId, params: OrderCreate, placed_at: DateTime<Utc>) -> Self {
        let subtotal: f64 = params.items.iter().map(LineItem::line_total).sum();
        Self {
            id,
            order_number: format!("GRO-{}-{:06}", placed_at.format("%Y%m%d"), id.0),
            customer_id: params.customer_id,
            items: params.items,
            subtotal,
            delivery_fee: params.delivery_fee,
            total: subtotal + params.delivery_fee,
            payment_method: params.payment_method,
            address: params.address,
            status: OrderStatus::Placed,
            assigned_partner_id: None,
            timestamps: StatusTimestamps::placed(placed_at),
            cancellation_reason: None,
            version: 1,
        }
    }

    /// Number of line items. This is the count the earnings calculator pays on.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Placed and not yet taken by any partner.
    pub fn is_open_for_dispatch(&self) -> bool {
        self.status == OrderStatus::Placed && self.assigned_partner_id.is_none()
    }

    pub fn destination(&self) -> Option<GeoPoint> {
        self.address.location
    }

    pub fn is_assigned_to(&self, partner_id: &PartnerId) -> bool {
        self.assigned_partner_id.as_ref() == Some(partner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn params() -> OrderCreate {
        OrderCreate {
            customer_id: "cust_1".into(),
            items: vec![LineItem::new("p1", "Milk", 30.0, 2), LineItem::new("p2", "Bread", 45.5, 1)],
            address: DeliveryAddress::default(),
            payment_method: PaymentMethod::Upi,
            delivery_fee: 25.0,
        }
    }

    #[test]
    fn new_order_derives_totals_and_number() {
        let placed_at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let order = Order::new(OrderId(42), params(), placed_at);
        assert_eq!(order.order_number, "GRO-20260314-000042");
        assert_eq!(order.subtotal, 105.5);
        assert_eq!(order.total, 130.5);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.version, 1);
        assert!(order.is_open_for_dispatch());
        assert_eq!(order.timestamps.entered(OrderStatus::Placed), Some(placed_at));
        assert_eq!(order.timestamps.entered(OrderStatus::Delivered), None);
    }

    #[test]
    fn status_classification() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
        assert!(!OrderStatus::Placed.requires_partner());
        assert!(!OrderStatus::Cancelled.requires_partner());
        assert!(OrderStatus::Delivered.requires_partner());
        assert_eq!(OrderStatus::OutForDelivery.to_string(), "OUT_FOR_DELIVERY");
    }
}
