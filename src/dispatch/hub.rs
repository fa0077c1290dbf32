//! # Dispatch Hub
//!
//! The session registry and event fan-out, run as one actor. It owns:
//!
//! * every live connection and the sending half of its event queue
//! * which connection currently speaks for each partner
//! * which connections follow which orders
//!
//! Order snapshots reach the hub through [`HubClient::publish_order`], called from the order
//! store's commit hook. The store awaits that call before taking its next request, and the hub
//! drains its queue in order, so clients see each order's events in commit order.
//!
//! Delivery to a connection never waits. A full queue drops the event with a warning; a closed
//! queue means the client went away and the connection is removed.

use crate::dispatch::{DispatchError, DispatchEvent, LocationUpdate, OrderOffer, RetractReason};
use crate::earnings::EarningsPolicy;
use crate::model::{Order, OrderId, OrderStatus, PartnerId};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn_{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionRole {
    Partner(PartnerId),
    Customer,
    Admin,
}

/// The client half of a connection: its id and the queue its events arrive on.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub events: mpsc::Receiver<DispatchEvent>,
}

/// Point-in-time counters for the hub.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HubStats {
    pub connections: usize,
    pub partners: usize,
    pub admins: usize,
    /// Sum over orders of the connections following each one.
    pub subscriptions: usize,
    pub events_sent: u64,
    pub events_dropped: u64,
}

enum HubRequest {
    Connect {
        role: ConnectionRole,
        respond_to: oneshot::Sender<Connection>,
    },
    Disconnect {
        connection: ConnectionId,
        respond_to: oneshot::Sender<bool>,
    },
    Subscribe {
        connection: ConnectionId,
        order_id: OrderId,
        respond_to: oneshot::Sender<bool>,
    },
    Unsubscribe {
        connection: ConnectionId,
        order_id: OrderId,
        respond_to: oneshot::Sender<bool>,
    },
    OrderCommitted(Box<Order>),
    Location(LocationUpdate),
    Stats {
        respond_to: oneshot::Sender<HubStats>,
    },
}

struct Outbound {
    role: ConnectionRole,
    sender: mpsc::Sender<DispatchEvent>,
}

pub struct DispatchHub {
    receiver: mpsc::Receiver<HubRequest>,
    connections: HashMap<ConnectionId, Outbound>,
    partners: HashMap<PartnerId, ConnectionId>,
    subscriptions: HashMap<OrderId, HashSet<ConnectionId>>,
    next_connection: u64,
    session_buffer: usize,
    earnings: EarningsPolicy,
    events_sent: u64,
    events_dropped: u64,
}

impl DispatchHub {
    /// Creates the hub and a client bound to it.
    ///
    /// `buffer_size` bounds the hub's own request queue; `session_buffer` bounds each
    /// connection's event queue.
    pub fn new(buffer_size: usize, session_buffer: usize, earnings: EarningsPolicy) -> (Self, HubClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let hub = Self {
            receiver,
            connections: HashMap::new(),
            partners: HashMap::new(),
            subscriptions: HashMap::new(),
            next_connection: 1,
            session_buffer,
            earnings,
            events_sent: 0,
            events_dropped: 0,
        };
        (hub, HubClient { sender })
    }

    /// Runs until every [`HubClient`] has been dropped.
    pub async fn run(mut self) {
        info!("Dispatch hub started");

        while let Some(request) = self.receiver.recv().await {
            match request {
                HubRequest::Connect { role, respond_to } => {
                    let connection = self.connect(role);
                    let _ = respond_to.send(connection);
                }
                HubRequest::Disconnect { connection, respond_to } => {
                    let existed = self.remove_connection(connection);
                    let _ = respond_to.send(existed);
                }
                HubRequest::Subscribe {
                    connection,
                    order_id,
                    respond_to,
                } => {
                    let known = self.connections.contains_key(&connection);
                    if known {
                        self.subscriptions.entry(order_id).or_default().insert(connection);
                        debug!(%connection, %order_id, "Subscribed");
                    }
                    let _ = respond_to.send(known);
                }
                HubRequest::Unsubscribe {
                    connection,
                    order_id,
                    respond_to,
                } => {
                    let removed = self.unsubscribe(connection, order_id);
                    let _ = respond_to.send(removed);
                }
                HubRequest::OrderCommitted(order) => self.on_order_committed(*order),
                HubRequest::Location(update) => self.on_location(update),
                HubRequest::Stats { respond_to } => {
                    let _ = respond_to.send(self.stats());
                }
            }
        }

        info!(connections = self.connections.len(), "Dispatch hub shut down");
    }

    fn connect(&mut self, role: ConnectionRole) -> Connection {
        let id = ConnectionId(self.next_connection);
        self.next_connection += 1;
        let (sender, events) = mpsc::channel(self.session_buffer);

        if let ConnectionRole::Partner(partner_id) = &role {
            // One live session per partner; the newest registration wins
            if let Some(previous) = self.partners.insert(partner_id.clone(), id) {
                info!(%partner_id, %previous, replacement = %id, "Replacing partner session");
                self.remove_connection(previous);
            }
        }
        info!(connection = %id, ?role, "Connected");
        self.connections.insert(id, Outbound { role, sender });
        Connection { id, events }
    }

    fn remove_connection(&mut self, id: ConnectionId) -> bool {
        let Some(outbound) = self.connections.remove(&id) else {
            return false;
        };
        if let ConnectionRole::Partner(partner_id) = &outbound.role {
            if self.partners.get(partner_id) == Some(&id) {
                self.partners.remove(partner_id);
            }
        }
        self.subscriptions.retain(|_, followers| {
            followers.remove(&id);
            !followers.is_empty()
        });
        info!(connection = %id, role = ?outbound.role, "Disconnected");
        true
    }

    fn unsubscribe(&mut self, connection: ConnectionId, order_id: OrderId) -> bool {
        let Some(followers) = self.subscriptions.get_mut(&order_id) else {
            return false;
        };
        let removed = followers.remove(&connection);
        if followers.is_empty() {
            self.subscriptions.remove(&order_id);
        }
        removed
    }

    fn on_order_committed(&mut self, order: Order) {
        debug!(order_id = %order.id, status = %order.status, version = order.version, "Fanning out commit");
        let mut closed = Vec::new();

        match order.status {
            OrderStatus::Placed => {
                let offer = OrderOffer::from_order(&order, &self.earnings);
                for connection in self.partner_connections(None) {
                    let event = DispatchEvent::OrderOffered { offer: offer.clone() };
                    self.deliver(connection, event, &mut closed);
                }
            }
            OrderStatus::Confirmed => {
                let winner = order
                    .assigned_partner_id
                    .as_ref()
                    .and_then(|p| self.partners.get(p).copied());
                if let Some(connection) = winner {
                    let accepted = DispatchEvent::OrderAccepted {
                        order_id: order.id,
                        order_number: order.order_number.clone(),
                        earnings: self.earnings.calculate(order.item_count()),
                    };
                    self.deliver(connection, accepted, &mut closed);
                }
                self.retract(order.id, RetractReason::Assigned, winner, &mut closed);
            }
            // Cancelled before anyone accepted: it is still sitting in partners' offer lists
            OrderStatus::Cancelled if order.assigned_partner_id.is_none() => {
                self.retract(order.id, RetractReason::Cancelled, None, &mut closed);
            }
            OrderStatus::Delivered => {
                if let Some(connection) = self.assigned_connection(&order) {
                    let credited = DispatchEvent::EarningsCredited {
                        order_id: order.id,
                        earnings: self.earnings.calculate(order.item_count()),
                    };
                    self.deliver(connection, credited, &mut closed);
                }
            }
            _ => {}
        }

        let status_event = DispatchEvent::status_changed(&order);
        for connection in self.order_audience(&order) {
            self.deliver(connection, status_event.clone(), &mut closed);
        }

        self.prune(closed);
    }

    fn on_location(&mut self, update: LocationUpdate) {
        let mut closed = Vec::new();
        let mut audience: HashSet<ConnectionId> = self.followers(update.order_id);
        audience.extend(self.admin_connections());
        for connection in audience {
            self.deliver(connection, DispatchEvent::LocationUpdated(update.clone()), &mut closed);
        }
        self.prune(closed);
    }

    fn retract(
        &mut self,
        order_id: OrderId,
        reason: RetractReason,
        except: Option<ConnectionId>,
        closed: &mut Vec<ConnectionId>,
    ) {
        for connection in self.partner_connections(except) {
            self.deliver(connection, DispatchEvent::OrderRetracted { order_id, reason }, closed);
        }
    }

    /// Subscribers, admins, and the assigned partner's live session.
    fn order_audience(&self, order: &Order) -> HashSet<ConnectionId> {
        let mut audience = self.followers(order.id);
        audience.extend(self.admin_connections());
        audience.extend(self.assigned_connection(order));
        audience
    }

    fn followers(&self, order_id: OrderId) -> HashSet<ConnectionId> {
        self.subscriptions.get(&order_id).cloned().unwrap_or_default()
    }

    fn admin_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, out)| out.role == ConnectionRole::Admin)
            .map(|(id, _)| *id)
            .collect()
    }

    fn partner_connections(&self, except: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.partners
            .values()
            .copied()
            .filter(|id| Some(*id) != except)
            .collect()
    }

    fn assigned_connection(&self, order: &Order) -> Option<ConnectionId> {
        order
            .assigned_partner_id
            .as_ref()
            .and_then(|p| self.partners.get(p).copied())
    }

    fn deliver(&mut self, connection: ConnectionId, event: DispatchEvent, closed: &mut Vec<ConnectionId>) {
        let Some(outbound) = self.connections.get(&connection) else {
            return;
        };
        match outbound.sender.try_send(event) {
            Ok(()) => self.events_sent += 1,
            Err(TrySendError::Full(event)) => {
                self.events_dropped += 1;
                warn!(%connection, order_id = %event.order_id(), "Event queue full, dropping event");
            }
            Err(TrySendError::Closed(_)) => closed.push(connection),
        }
    }

    fn prune(&mut self, closed: Vec<ConnectionId>) {
        for connection in closed {
            debug!(%connection, "Pruning closed connection");
            self.remove_connection(connection);
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            connections: self.connections.len(),
            partners: self.partners.len(),
            admins: self.admin_connections().len(),
            subscriptions: self.subscriptions.values().map(HashSet::len).sum(),
            events_sent: self.events_sent,
            events_dropped: self.events_dropped,
        }
    }
}

/// Handle to the [`DispatchHub`]. Cheap to clone.
#[derive(Clone)]
pub struct HubClient {
    sender: mpsc::Sender<HubRequest>,
}

impl HubClient {
    pub async fn connect(&self, role: ConnectionRole) -> Result<Connection, DispatchError> {
        self.request(|respond_to| HubRequest::Connect { role, respond_to }).await
    }

    /// `false` if the connection was already gone.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<bool, DispatchError> {
        self.request(|respond_to| HubRequest::Disconnect { connection, respond_to })
            .await
    }

    pub async fn subscribe(&self, connection: ConnectionId, order_id: OrderId) -> Result<(), DispatchError> {
        let known = self
            .request(|respond_to| HubRequest::Subscribe {
                connection,
                order_id,
                respond_to,
            })
            .await?;
        if known {
            Ok(())
        } else {
            Err(DispatchError::UnknownConnection(connection))
        }
    }

    /// `false` if the connection was not following the order.
    pub async fn unsubscribe(&self, connection: ConnectionId, order_id: OrderId) -> Result<bool, DispatchError> {
        self.request(|respond_to| HubRequest::Unsubscribe {
            connection,
            order_id,
            respond_to,
        })
        .await
    }

    pub async fn stats(&self) -> Result<HubStats, DispatchError> {
        self.request(|respond_to| HubRequest::Stats { respond_to }).await
    }

    /// Queues a committed order snapshot for fan-out.
    ///
    /// Waits only for queue space, not for delivery. A stopped hub is logged and ignored: the
    /// commit has already happened and must not be failed after the fact.
    pub async fn publish_order(&self, order: Order) {
        let order_id = order.id;
        if self.sender.send(HubRequest::OrderCommitted(Box::new(order))).await.is_err() {
            warn!(%order_id, "Dispatch hub stopped, commit not broadcast");
        }
    }

    pub async fn publish_location(&self, update: LocationUpdate) {
        let order_id = update.order_id;
        if self.sender.send(HubRequest::Location(update)).await.is_err() {
            warn!(%order_id, "Dispatch hub stopped, location not broadcast");
        }
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> HubRequest) -> Result<R, DispatchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(make(respond_to))
            .await
            .map_err(|_| DispatchError::Unavailable("dispatch hub closed".into()))?;
        response
            .await
            .map_err(|_| DispatchError::Unavailable("dispatch hub dropped response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeliveryAddress, LineItem, OrderCreate, PaymentMethod};
    use chrono::Utc;

    fn start() -> HubClient {
        let (hub, client) = DispatchHub::new(32, 8, EarningsPolicy::default());
        tokio::spawn(hub.run());
        client
    }

    fn placed(id: u32) -> Order {
        let params = OrderCreate {
            customer_id: "cust_1".into(),
            items: vec![LineItem::new("p1", "Milk", 30.0, 1), LineItem::new("p2", "Tea", 80.0, 1)],
            address: DeliveryAddress::default(),
            payment_method: PaymentMethod::Card,
            delivery_fee: 25.0,
        };
        Order::new(OrderId(id), params, Utc::now())
    }

    fn confirmed(id: u32, partner: &str) -> Order {
        let mut order = placed(id);
        order.status = OrderStatus::Confirmed;
        order.assigned_partner_id = Some(PartnerId::new(partner));
        order.timestamps.confirmed_at = Some(Utc::now());
        order.version = 2;
        order
    }

    #[tokio::test]
    async fn new_orders_are_offered_to_every_partner() {
        let hub = start();
        let mut p1 = hub.connect(ConnectionRole::Partner("p1".into())).await.unwrap();
        let mut p2 = hub.connect(ConnectionRole::Partner("p2".into())).await.unwrap();
        let mut customer = hub.connect(ConnectionRole::Customer).await.unwrap();

        hub.publish_order(placed(1)).await;
        hub.stats().await.unwrap();

        for partner in [&mut p1, &mut p2] {
            match partner.events.try_recv().unwrap() {
                DispatchEvent::OrderOffered { offer } => assert_eq!(offer.earnings.total, 50.0),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(customer.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn acceptance_notifies_winner_and_retracts_for_the_rest() {
        let hub = start();
        let mut winner = hub.connect(ConnectionRole::Partner("p1".into())).await.unwrap();
        let mut loser = hub.connect(ConnectionRole::Partner("p2".into())).await.unwrap();

        hub.publish_order(confirmed(1, "p1")).await;
        hub.stats().await.unwrap();

        assert!(matches!(winner.events.try_recv().unwrap(), DispatchEvent::OrderAccepted { .. }));
        assert!(matches!(
            winner.events.try_recv().unwrap(),
            DispatchEvent::StatusChanged {
                status: OrderStatus::Confirmed,
                ..
            }
        ));
        assert_eq!(
            loser.events.try_recv().unwrap(),
            DispatchEvent::OrderRetracted {
                order_id: OrderId(1),
                reason: RetractReason::Assigned,
            }
        );
        assert!(loser.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn status_changes_reach_subscribers_and_admins() {
        let hub = start();
        let mut follower = hub.connect(ConnectionRole::Customer).await.unwrap();
        let mut bystander = hub.connect(ConnectionRole::Customer).await.unwrap();
        let mut admin = hub.connect(ConnectionRole::Admin).await.unwrap();
        hub.subscribe(follower.id, OrderId(1)).await.unwrap();

        hub.publish_order(confirmed(1, "p1")).await;
        let stats = hub.stats().await.unwrap();
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.admins, 1);

        assert!(matches!(follower.events.try_recv().unwrap(), DispatchEvent::StatusChanged { version: 2, .. }));
        assert!(matches!(admin.events.try_recv().unwrap(), DispatchEvent::StatusChanged { .. }));
        assert!(bystander.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn newer_partner_session_replaces_the_old_one() {
        let hub = start();
        let mut old = hub.connect(ConnectionRole::Partner("p1".into())).await.unwrap();
        let mut new = hub.connect(ConnectionRole::Partner("p1".into())).await.unwrap();

        // The old queue is closed once its sender is dropped
        assert!(old.events.recv().await.is_none());
        assert_eq!(hub.stats().await.unwrap().partners, 1);

        // Offers go to the live session only
        hub.publish_order(placed(1)).await;
        hub.stats().await.unwrap();
        assert!(matches!(new.events.try_recv().unwrap(), DispatchEvent::OrderOffered { .. }));
        assert!(new.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_clients_are_pruned_and_full_queues_drop_events() {
        let (hub, client) = DispatchHub::new(32, 1, EarningsPolicy::default());
        tokio::spawn(hub.run());

        let slow = client.connect(ConnectionRole::Partner("slow".into())).await.unwrap();
        let gone = client.connect(ConnectionRole::Partner("gone".into())).await.unwrap();
        drop(gone);

        client.publish_order(placed(1)).await;
        client.publish_order(placed(2)).await;
        let stats = client.stats().await.unwrap();

        assert_eq!(stats.partners, 1);
        assert_eq!(stats.connections, 1);
        assert_eq!(stats.events_sent, 1);
        assert_eq!(stats.events_dropped, 1);
        drop(slow);
    }

    #[tokio::test]
    async fn subscribing_an_unknown_connection_fails() {
        let hub = start();
        assert_eq!(
            hub.subscribe(ConnectionId(99), OrderId(1)).await,
            Err(DispatchError::UnknownConnection(ConnectionId(99)))
        );
        assert!(!hub.disconnect(ConnectionId(99)).await.unwrap());
    }
}
