//! # Tracking View
//!
//! A customer's live view of one order: its status and the delivering partner's last position.
//! Events are applied only if they are newer than what the view already shows, so a refetch
//! after reconnecting can be mixed freely with events still in the queue.

use crate::dispatch::{ConnectionId, DispatchBroker, DispatchError, DispatchEvent, LocationUpdate, ViewerRole};
use crate::model::{OrderId, OrderStatus, PartnerId};
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TryRecvError};

pub struct TrackingView {
    order_id: OrderId,
    connection_id: ConnectionId,
    events: mpsc::Receiver<DispatchEvent>,
    status: OrderStatus,
    version: u64,
    updated_at: DateTime<Utc>,
    partner_id: Option<PartnerId>,
    location: Option<LocationUpdate>,
}

impl TrackingView {
    /// Connects as a customer, subscribes to the order and loads its current state.
    pub async fn open(broker: &DispatchBroker, order_id: OrderId) -> Result<Self, DispatchError> {
        let connection = broker.connect(ViewerRole::Customer).await?;
        let order = match broker.subscribe_to_order(connection.connection_id, order_id).await {
            Ok(order) => order,
            Err(e) => {
                let _ = broker.disconnect(connection.connection_id).await;
                return Err(e);
            }
        };
        let location = broker.tracked_location(order_id).await?;
        Ok(Self {
            order_id,
            connection_id: connection.connection_id,
            events: connection.events,
            status: order.status,
            version: order.version,
            updated_at: order.timestamps.entered(order.status).unwrap_or(order.timestamps.placed_at),
            partner_id: order.assigned_partner_id,
            location,
        })
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn partner_id(&self) -> Option<&PartnerId> {
        self.partner_id.as_ref()
    }

    pub fn location(&self) -> Option<&LocationUpdate> {
        self.location.as_ref()
    }

    pub fn distance_remaining_km(&self) -> Option<f64> {
        self.location.as_ref().and_then(|l| l.distance_remaining_km)
    }

    pub fn estimated_arrival(&self) -> Option<DateTime<Utc>> {
        self.location.as_ref().and_then(|l| l.estimated_arrival)
    }

    /// Applies an event for this order. Returns whether the view changed.
    pub fn apply(&mut self, event: &DispatchEvent) -> bool {
        match event {
            DispatchEvent::StatusChanged {
                order_id,
                status,
                timestamp,
                version,
                partner_id,
            } if *order_id == self.order_id => {
                if *version <= self.version {
                    return false;
                }
                self.status = *status;
                self.version = *version;
                self.updated_at = *timestamp;
                self.partner_id = partner_id.clone();
                if status.is_terminal() {
                    self.location = None;
                }
                true
            }
            DispatchEvent::LocationUpdated(update) if update.order_id == self.order_id => {
                if self.status.is_terminal() {
                    return false;
                }
                let newer = self
                    .location
                    .as_ref()
                    .map_or(true, |current| update.sampled_at > current.sampled_at);
                if newer {
                    self.location = Some(update.clone());
                }
                newer
            }
            _ => false,
        }
    }

    /// Applies every queued event without waiting. Returns how many changed the view.
    pub fn drain(&mut self) -> usize {
        let mut changed = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    if self.apply(&event) {
                        changed += 1;
                    }
                }
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        changed
    }

    /// Waits for the next event and applies it. `None` once the connection is closed.
    pub async fn next_event(&mut self) -> Option<DispatchEvent> {
        let event = self.events.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Refetches status and last location, e.g. after events may have been dropped.
    pub async fn refresh(&mut self, broker: &DispatchBroker) -> Result<(), DispatchError> {
        let order = broker.get_order(self.order_id).await?;
        if order.version >= self.version {
            self.status = order.status;
            self.version = order.version;
            self.updated_at = order.timestamps.entered(order.status).unwrap_or(order.timestamps.placed_at);
            self.partner_id = order.assigned_partner_id;
        }
        self.location = broker.tracked_location(self.order_id).await?;
        Ok(())
    }

    pub async fn close(self, broker: &DispatchBroker) -> Result<(), DispatchError> {
        broker.disconnect(self.connection_id).await
    }
}
