//! # Location Tracker
//!
//! Accepts position reports from the partner delivering an order, keeps the newest one, and
//! turns it into a [`LocationUpdate`] with remaining distance and ETA for the order's followers.

use crate::clients::OrderClient;
use crate::dispatch::{DispatchError, LocationUpdate};
use crate::geo::{distance_km, estimate_eta_from, GeoPoint};
use crate::model::{Order, OrderId, OrderStatus, PartnerId};
use crate::order_store::OrderError;
use crate::tracking::{LocationSample, RecordOutcome, SampleClient};
use tracing::{debug, instrument};

#[derive(Clone)]
pub struct LocationTracker {
    orders: OrderClient,
    samples: SampleClient,
    average_speed_kmh: f64,
}

impl LocationTracker {
    pub fn new(orders: OrderClient, samples: SampleClient, average_speed_kmh: f64) -> Self {
        Self {
            orders,
            samples,
            average_speed_kmh,
        }
    }

    /// Records a position report from `partner_id` for an order it is delivering.
    ///
    /// The report is rejected if the coordinates are out of range, the partner is not the
    /// assigned one, or the order is not OUT_FOR_DELIVERY. A rejected report leaves the stored
    /// sample unchanged. A report that loses a race with delivery or cancellation is rejected
    /// with the order's terminal status and is never broadcast.
    #[instrument(skip(self))]
    pub async fn report_location(
        &self,
        order_id: OrderId,
        partner_id: PartnerId,
        lat: f64,
        lng: f64,
    ) -> Result<LocationUpdate, DispatchError> {
        let location = GeoPoint::new(lat, lng);
        if !location.is_valid() {
            return Err(DispatchError::InvalidLocation { lat, lng });
        }

        let order = self.orders.get_order(order_id).await?;
        if !order.is_assigned_to(&partner_id) {
            return Err(OrderError::Unauthorized { order_id, partner_id }.into());
        }
        if order.status != OrderStatus::OutForDelivery {
            return Err(DispatchError::InvalidState {
                order_id,
                status: order.status,
            });
        }

        let sample = LocationSample::now(location);
        let update = self.describe(&order, partner_id, sample);
        let outcome = self.samples.record(update.clone()).await?;
        if outcome == RecordOutcome::Closed {
            // Delivered or cancelled since the read above
            let current = self.orders.get_order(order_id).await?;
            return Err(DispatchError::InvalidState {
                order_id,
                status: current.status,
            });
        }
        debug!(?outcome, distance_km = ?update.distance_remaining_km, "Location processed");
        Ok(update)
    }

    /// The newest position of the partner delivering `order`, while it is out for delivery.
    pub async fn latest_for(&self, order: &Order) -> Result<Option<LocationUpdate>, DispatchError> {
        let Some(partner_id) = order.assigned_partner_id.clone() else {
            return Ok(None);
        };
        if order.status != OrderStatus::OutForDelivery {
            return Ok(None);
        }
        let sample = self.samples.latest(order.id, partner_id.clone()).await?;
        Ok(sample.map(|sample| self.describe(order, partner_id, sample)))
    }

    pub async fn latest(&self, order_id: OrderId) -> Result<Option<LocationUpdate>, DispatchError> {
        let order = self.orders.get_order(order_id).await?;
        self.latest_for(&order).await
    }

    fn describe(&self, order: &Order, partner_id: PartnerId, sample: LocationSample) -> LocationUpdate {
        let distance_remaining_km = order.destination().map(|to| distance_km(sample.location, to));
        let estimated_arrival =
            distance_remaining_km.map(|d| estimate_eta_from(sample.sampled_at, d, self.average_speed_kmh));
        LocationUpdate {
            order_id: order.id,
            partner_id,
            location: sample.location,
            sampled_at: sample.sampled_at,
            distance_remaining_km,
            estimated_arrival,
        }
    }
}
