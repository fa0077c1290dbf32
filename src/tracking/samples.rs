//! # Sample Store
//!
//! Keeps the newest position sample per `(order, partner)` pair. Samples are stamped by the
//! server on receipt, so "newest" is decided by the server clock, never by the device.
//!
//! ## Closing an order
//!
//! [`SampleClient::close`] drops an order's samples and remembers the order as closed; any
//! later report for it is refused. Accepted reports are handed to the hub from inside the store
//! loop, so once `close` has returned no location for that order can reach the hub anymore.
//! The order store closes an order before it broadcasts DELIVERED or CANCELLED, which keeps
//! every location event ahead of the terminal status.

use crate::dispatch::{DispatchError, HubClient, LocationUpdate};
use crate::geo::GeoPoint;
use crate::model::{OrderId, PartnerId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub location: GeoPoint,
    pub sampled_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn now(location: GeoPoint) -> Self {
        Self {
            location,
            sampled_at: Utc::now(),
        }
    }
}

impl From<&LocationUpdate> for LocationSample {
    fn from(update: &LocationUpdate) -> Self {
        Self {
            location: update.location,
            sampled_at: update.sampled_at,
        }
    }
}

/// What happened to a reported position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Stored and broadcast.
    Stored,
    /// A newer sample is already held; nothing changed.
    Superseded,
    /// The order has been closed for tracking; nothing changed.
    Closed,
}

type SampleKey = (OrderId, PartnerId);

#[derive(Debug)]
enum SampleRequest {
    Record {
        update: LocationUpdate,
        respond_to: oneshot::Sender<RecordOutcome>,
    },
    Latest {
        key: SampleKey,
        respond_to: oneshot::Sender<Option<LocationSample>>,
    },
    Close {
        order_id: OrderId,
        respond_to: oneshot::Sender<usize>,
    },
}

pub struct SampleStore {
    receiver: mpsc::Receiver<SampleRequest>,
    samples: HashMap<SampleKey, LocationSample>,
    closed: HashSet<OrderId>,
}

impl SampleStore {
    pub fn new(buffer_size: usize) -> (Self, SampleClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let store = Self {
            receiver,
            samples: HashMap::new(),
            closed: HashSet::new(),
        };
        (store, SampleClient { sender })
    }

    /// Runs the store until every [`SampleClient`] is dropped. Stored samples are published
    /// through `hub`.
    pub async fn run(mut self, hub: HubClient) {
        info!("Sample store started");

        while let Some(request) = self.receiver.recv().await {
            match request {
                SampleRequest::Record { update, respond_to } => {
                    let outcome = self.record(&update);
                    if outcome == RecordOutcome::Stored {
                        hub.publish_location(update).await;
                    }
                    let _ = respond_to.send(outcome);
                }
                SampleRequest::Latest { key, respond_to } => {
                    let _ = respond_to.send(self.samples.get(&key).copied());
                }
                SampleRequest::Close { order_id, respond_to } => {
                    self.closed.insert(order_id);
                    let before = self.samples.len();
                    self.samples.retain(|(order, _), _| *order != order_id);
                    let removed = before - self.samples.len();
                    debug!(%order_id, removed, "Order closed for tracking");
                    let _ = respond_to.send(removed);
                }
            }
        }

        info!(samples = self.samples.len(), closed = self.closed.len(), "Sample store shut down");
    }

    fn record(&mut self, update: &LocationUpdate) -> RecordOutcome {
        if self.closed.contains(&update.order_id) {
            debug!(order_id = %update.order_id, "Ignoring sample for a closed order");
            return RecordOutcome::Closed;
        }
        let key = (update.order_id, update.partner_id.clone());
        let sample = LocationSample::from(update);
        let newer = self
            .samples
            .get(&key)
            .map_or(true, |current| sample.sampled_at >= current.sampled_at);
        if !newer {
            debug!(order_id = %key.0, partner_id = %key.1, "Ignoring out-of-order sample");
            return RecordOutcome::Superseded;
        }
        self.samples.insert(key, sample);
        RecordOutcome::Stored
    }
}

#[derive(Clone)]
pub struct SampleClient {
    sender: mpsc::Sender<SampleRequest>,
}

impl SampleClient {
    /// Stores the update's sample unless a newer one is held or the order is closed, and
    /// broadcasts it if stored.
    pub async fn record(&self, update: LocationUpdate) -> Result<RecordOutcome, DispatchError> {
        self.request(|respond_to| SampleRequest::Record { update, respond_to })
            .await
    }

    pub async fn latest(
        &self,
        order_id: OrderId,
        partner_id: PartnerId,
    ) -> Result<Option<LocationSample>, DispatchError> {
        self.request(|respond_to| SampleRequest::Latest {
            key: (order_id, partner_id),
            respond_to,
        })
        .await
    }

    /// Drops every sample held for the order and refuses new ones. Returns how many were
    /// removed.
    pub async fn close(&self, order_id: OrderId) -> Result<usize, DispatchError> {
        self.request(|respond_to| SampleRequest::Close { order_id, respond_to })
            .await
    }

    async fn request<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> SampleRequest) -> Result<R, DispatchError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(make(respond_to))
            .await
            .map_err(|_| DispatchError::Unavailable("sample store closed".into()))?;
        response
            .await
            .map_err(|_| DispatchError::Unavailable("sample store dropped response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{ConnectionRole, DispatchEvent, DispatchHub};
    use crate::earnings::EarningsPolicy;
    use chrono::Duration;

    fn update(order: u32, partner: &str, sample: LocationSample) -> LocationUpdate {
        LocationUpdate {
            order_id: OrderId(order),
            partner_id: PartnerId::new(partner),
            location: sample.location,
            sampled_at: sample.sampled_at,
            distance_remaining_km: None,
            estimated_arrival: None,
        }
    }

    fn start() -> (SampleClient, HubClient) {
        let (hub, hub_client) = DispatchHub::new(8, 8, EarningsPolicy::default());
        tokio::spawn(hub.run());
        let (store, client) = SampleStore::new(8);
        tokio::spawn(store.run(hub_client.clone()));
        (client, hub_client)
    }

    #[tokio::test]
    async fn keeps_only_the_newest_sample() {
        let (client, _hub) = start();
        let partner = PartnerId::new("p1");

        let first = LocationSample::now(GeoPoint::new(12.90, 77.60));
        let second = LocationSample {
            location: GeoPoint::new(12.91, 77.61),
            sampled_at: first.sampled_at + Duration::seconds(5),
        };
        let late = LocationSample {
            location: GeoPoint::new(0.0, 0.0),
            sampled_at: first.sampled_at - Duration::seconds(5),
        };

        assert_eq!(client.record(update(1, "p1", first)).await.unwrap(), RecordOutcome::Stored);
        assert_eq!(client.record(update(1, "p1", second)).await.unwrap(), RecordOutcome::Stored);
        assert_eq!(client.record(update(1, "p1", late)).await.unwrap(), RecordOutcome::Superseded);
        assert_eq!(client.latest(OrderId(1), partner.clone()).await.unwrap(), Some(second));

        assert_eq!(client.close(OrderId(1)).await.unwrap(), 1);
        assert_eq!(client.latest(OrderId(1), partner).await.unwrap(), None);
    }

    #[tokio::test]
    async fn samples_are_scoped_to_the_partner() {
        let (client, _hub) = start();
        let sample = LocationSample::now(GeoPoint::new(12.90, 77.60));
        client.record(update(1, "p1", sample)).await.unwrap();
        assert_eq!(client.latest(OrderId(1), PartnerId::new("p2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn closed_orders_refuse_new_samples() {
        let (client, hub) = start();
        let mut admin = hub.connect(ConnectionRole::Admin).await.unwrap();

        assert_eq!(client.close(OrderId(1)).await.unwrap(), 0);
        let sample = LocationSample::now(GeoPoint::new(12.90, 77.60));
        assert_eq!(client.record(update(1, "p1", sample)).await.unwrap(), RecordOutcome::Closed);
        assert_eq!(client.latest(OrderId(1), PartnerId::new("p1")).await.unwrap(), None);

        // Other orders are unaffected and their samples reach the hub
        assert_eq!(client.record(update(2, "p1", sample)).await.unwrap(), RecordOutcome::Stored);
        hub.stats().await.unwrap();
        match admin.events.try_recv() {
            Ok(DispatchEvent::LocationUpdated(location)) => assert_eq!(location.order_id, OrderId(2)),
            other => panic!("expected a location for order 2, got {other:?}"),
        }
        assert!(admin.events.try_recv().is_err());
    }
}
