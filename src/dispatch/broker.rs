//! # Dispatch Broker
//!
//! Entry point for every inbound request: checkout, admin, partner and customer. The broker
//! holds no state of its own. Order changes go through the order store's conditional
//! transitions; sessions and subscriptions live in the [`DispatchHub`](crate::dispatch::DispatchHub).
//!
//! ## Accept races
//!
//! [`DispatchBroker::accept_order`] submits `PLACED -> CONFIRMED` with the expected status
//! `PLACED`. The store applies transitions one at a time, so the first accept commits and every
//! other accept for that order, concurrent or later, finds `CONFIRMED` and fails with
//! [`OrderError::StaleStateConflict`]. There is no lock in the broker.
//!
//! ## Missed broadcasts
//!
//! [`DispatchBroker::register_partner`] registers the session with the hub *before* it lists the
//! unassigned orders. An order placed in between shows up both in the list and as a live offer;
//! [`PartnerFeed`](crate::surfaces::PartnerFeed) dedupes by order id. Nothing can fall between
//! the two.

use crate::clients::OrderClient;
use crate::config::DispatchConfig;
use crate::dispatch::{
    ConnectionId, ConnectionRole, DispatchError, DispatchEvent, HubClient, HubStats, LocationUpdate, OrderOffer,
    PartnerDirectory,
};
use crate::earnings::{EarningsBreakdown, EarningsPolicy};
use crate::model::{DeliveryAddress, LineItem, Order, OrderCreate, OrderId, OrderStatus, PartnerId, PaymentMethod};
use crate::order_store::{ConditionalTransition, OrderError, Transition};
use crate::tracking::LocationTracker;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

/// A step the assigned partner can take after accepting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PartnerAction {
    Prepared,
    PickedUp,
    Delivered,
}

impl PartnerAction {
    fn into_transition(self, partner_id: PartnerId) -> Transition {
        match self {
            PartnerAction::Prepared => Transition::MarkPreparing { partner_id },
            PartnerAction::PickedUp => Transition::MarkPickedUp { partner_id },
            PartnerAction::Delivered => Transition::MarkDelivered { partner_id },
        }
    }
}

/// Kinds of read-only client connection. Partners connect through
/// [`DispatchBroker::register_partner`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRole {
    Customer,
    /// Receives every order's status and location events without subscribing.
    Admin,
}

/// A registered partner connection together with its reconciliation list.
#[derive(Debug)]
pub struct PartnerSession {
    pub partner_id: PartnerId,
    pub connection_id: ConnectionId,
    pub events: mpsc::Receiver<DispatchEvent>,
    /// Orders that were unassigned at registration, oldest first.
    pub unassigned: Vec<OrderOffer>,
}

/// A customer or admin connection.
#[derive(Debug)]
pub struct ViewerConnection {
    pub connection_id: ConnectionId,
    pub events: mpsc::Receiver<DispatchEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdvanceOutcome {
    pub order: Order,
    /// Present when the step was the delivery.
    pub earnings: Option<EarningsBreakdown>,
}

#[derive(Clone)]
pub struct DispatchBroker {
    orders: OrderClient,
    hub: HubClient,
    tracker: LocationTracker,
    directory: Arc<dyn PartnerDirectory>,
    earnings: EarningsPolicy,
    delivery_fee: f64,
}

impl DispatchBroker {
    pub fn new(
        orders: OrderClient,
        hub: HubClient,
        tracker: LocationTracker,
        directory: Arc<dyn PartnerDirectory>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            orders,
            hub,
            tracker,
            directory,
            earnings: config.earnings,
            delivery_fee: config.delivery_fee,
        }
    }

    // =========================================================================
    // Checkout and admin
    // =========================================================================

    /// Places a new order. It is offered to every registered partner as soon as it commits.
    #[instrument(skip(self, items, address), fields(items = items.len()))]
    pub async fn create_order(
        &self,
        customer_id: &str,
        items: Vec<LineItem>,
        address: DeliveryAddress,
        payment_method: PaymentMethod,
    ) -> Result<Order, DispatchError> {
        let params = OrderCreate {
            customer_id: customer_id.to_string(),
            items,
            address,
            payment_method,
            delivery_fee: self.delivery_fee,
        };
        let order_id = self.orders.create_order(params).await?;
        info!(%order_id, "Order placed");
        Ok(self.orders.get_order(order_id).await?)
    }

    /// Cancels an order from any non-terminal state.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId, reason: &str) -> Result<Order, DispatchError> {
        let current = self.orders.get_order(order_id).await?;
        let cancel = Transition::Cancel {
            reason: reason.to_string(),
        };
        if !cancel.is_allowed_from(current.status) {
            return Err(OrderError::InvalidTransition {
                order_id,
                status: current.status,
                action: cancel.name(),
            }
            .into());
        }
        let order = self
            .orders
            .apply(order_id, ConditionalTransition::new(current.status, cancel))
            .await?;
        info!(%order_id, "Order cancelled");
        Ok(order)
    }

    // =========================================================================
    // Partners
    // =========================================================================

    /// Opens a partner session and hands back every order that is still up for grabs.
    ///
    /// A partner that registers again replaces its previous session, whose event queue closes.
    #[instrument(skip(self))]
    pub async fn register_partner(&self, partner_id: PartnerId) -> Result<PartnerSession, DispatchError> {
        self.ensure_known(&partner_id).await?;

        let connection = self.hub.connect(ConnectionRole::Partner(partner_id.clone())).await?;
        let unassigned = match self.unassigned_orders().await {
            Ok(offers) => offers,
            Err(e) => {
                let _ = self.hub.disconnect(connection.id).await;
                return Err(e);
            }
        };
        info!(connection = %connection.id, pending = unassigned.len(), "Partner registered");

        Ok(PartnerSession {
            partner_id,
            connection_id: connection.id,
            events: connection.events,
            unassigned,
        })
    }

    /// Tries to take the order for `partner_id`.
    ///
    /// Exactly one caller per order succeeds; everyone else gets
    /// [`OrderError::StaleStateConflict`]. The partner's connection state does not matter: an
    /// accept from a partner that has since disconnected still commits.
    #[instrument(skip(self))]
    pub async fn accept_order(&self, order_id: OrderId, partner_id: PartnerId) -> Result<Order, DispatchError> {
        self.ensure_known(&partner_id).await?;
        let accept = ConditionalTransition::new(OrderStatus::Placed, Transition::Accept { partner_id });
        match self.orders.apply(order_id, accept).await {
            Ok(order) => {
                info!(%order_id, "Order accepted");
                Ok(order)
            }
            Err(e) => {
                if matches!(e, OrderError::StaleStateConflict { .. }) {
                    info!(%order_id, "Accept lost, order no longer available");
                }
                Err(e.into())
            }
        }
    }

    /// Moves an accepted order one step along the delivery flow.
    #[instrument(skip(self))]
    pub async fn advance_status(
        &self,
        order_id: OrderId,
        partner_id: PartnerId,
        action: PartnerAction,
    ) -> Result<AdvanceOutcome, DispatchError> {
        self.ensure_known(&partner_id).await?;

        let current = self.orders.get_order(order_id).await?;
        if !current.is_assigned_to(&partner_id) {
            return Err(OrderError::Unauthorized { order_id, partner_id }.into());
        }
        let transition = action.into_transition(partner_id);
        if !transition.is_allowed_from(current.status) {
            return Err(OrderError::InvalidTransition {
                order_id,
                status: current.status,
                action: transition.name(),
            }
            .into());
        }

        let order = self
            .orders
            .apply(order_id, ConditionalTransition::new(current.status, transition))
            .await?;
        info!(%order_id, status = %order.status, "Order advanced");

        let earnings =
            (order.status == OrderStatus::Delivered).then(|| self.earnings.calculate(order.item_count()));
        Ok(AdvanceOutcome { order, earnings })
    }

    pub async fn report_location(
        &self,
        order_id: OrderId,
        partner_id: PartnerId,
        lat: f64,
        lng: f64,
    ) -> Result<LocationUpdate, DispatchError> {
        self.ensure_known(&partner_id).await?;
        self.tracker.report_location(order_id, partner_id, lat, lng).await
    }

    // =========================================================================
    // Customers and admins
    // =========================================================================

    pub async fn connect(&self, role: ViewerRole) -> Result<ViewerConnection, DispatchError> {
        let role = match role {
            ViewerRole::Customer => ConnectionRole::Customer,
            ViewerRole::Admin => ConnectionRole::Admin,
        };
        let connection = self.hub.connect(role).await?;
        Ok(ViewerConnection {
            connection_id: connection.id,
            events: connection.events,
        })
    }

    /// Follows an order and returns its current state.
    ///
    /// The subscription is in place before the snapshot is read, so any later commit arrives
    /// as an event with a higher version than the snapshot.
    #[instrument(skip(self))]
    pub async fn subscribe_to_order(&self, connection: ConnectionId, order_id: OrderId) -> Result<Order, DispatchError> {
        self.hub.subscribe(connection, order_id).await?;
        match self.orders.get_order(order_id).await {
            Ok(order) => Ok(order),
            Err(e) => {
                let _ = self.hub.unsubscribe(connection, order_id).await;
                Err(e.into())
            }
        }
    }

    /// `false` if the connection was not following the order.
    pub async fn unsubscribe_from_order(&self, connection: ConnectionId, order_id: OrderId) -> Result<bool, DispatchError> {
        self.hub.unsubscribe(connection, order_id).await
    }

    /// Closes a connection of any kind. Its partner session and subscriptions go with it.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), DispatchError> {
        if !self.hub.disconnect(connection).await? {
            warn!(%connection, "Disconnect for unknown connection");
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub async fn get_order(&self, order_id: OrderId) -> Result<Order, DispatchError> {
        Ok(self.orders.get_order(order_id).await?)
    }

    /// Offers for every order still PLACED and unassigned, oldest first.
    pub async fn unassigned_orders(&self) -> Result<Vec<OrderOffer>, DispatchError> {
        let orders = self.orders.list_unassigned().await?;
        Ok(orders
            .iter()
            .map(|order| OrderOffer::from_order(order, &self.earnings))
            .collect())
    }

    /// The newest position of the delivering partner, while the order is out for delivery.
    pub async fn tracked_location(&self, order_id: OrderId) -> Result<Option<LocationUpdate>, DispatchError> {
        self.tracker.latest(order_id).await
    }

    pub async fn hub_stats(&self) -> Result<HubStats, DispatchError> {
        self.hub.stats().await
    }

    async fn ensure_known(&self, partner_id: &PartnerId) -> Result<(), DispatchError> {
        if self.directory.is_known(partner_id).await {
            Ok(())
        } else {
            Err(DispatchError::UnknownPartner(partner_id.clone()))
        }
    }
}
