//! # Partner Feed
//!
//! A partner's list of orders it could accept. Seeded from the reconciliation list handed out
//! at registration, then kept current by live events: new offers are added, retracted ones
//! removed. An order seen both in the list and as a live offer appears once.

use crate::dispatch::{
    ConnectionId, DispatchBroker, DispatchError, DispatchEvent, OrderOffer, PartnerSession,
};
use crate::earnings::EarningsBreakdown;
use crate::model::{Order, OrderId, PartnerId};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::debug;

/// Result of an accept from the feed.
#[derive(Debug, Clone, PartialEq)]
pub enum AcceptOutcome {
    Won(Order),
    /// Someone else took it, or it was cancelled. The offer has been removed from the feed.
    NoLongerAvailable,
}

pub struct PartnerFeed {
    partner_id: PartnerId,
    connection_id: ConnectionId,
    events: mpsc::Receiver<DispatchEvent>,
    pending: BTreeMap<OrderId, OrderOffer>,
    dismissed: HashSet<OrderId>,
    won: Vec<OrderId>,
    credited: Vec<(OrderId, EarningsBreakdown)>,
    closed: bool,
}

impl PartnerFeed {
    pub fn new(session: PartnerSession) -> Self {
        let pending = session
            .unassigned
            .into_iter()
            .map(|offer| (offer.order_id, offer))
            .collect();
        Self {
            partner_id: session.partner_id,
            connection_id: session.connection_id,
            events: session.events,
            pending,
            dismissed: HashSet::new(),
            won: Vec::new(),
            credited: Vec::new(),
            closed: false,
        }
    }

    pub fn partner_id(&self) -> &PartnerId {
        &self.partner_id
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Offers still open, oldest order first.
    pub fn pending(&self) -> Vec<&OrderOffer> {
        self.pending.values().collect()
    }

    pub fn is_pending(&self, order_id: OrderId) -> bool {
        self.pending.contains_key(&order_id)
    }

    /// Orders this partner won, in the order it won them.
    pub fn won(&self) -> &[OrderId] {
        &self.won
    }

    pub fn credited(&self) -> &[(OrderId, EarningsBreakdown)] {
        &self.credited
    }

    pub fn total_credited(&self) -> f64 {
        self.credited.iter().map(|(_, e)| e.total).sum()
    }

    /// `true` once the hub has closed this session, e.g. after a newer registration.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Hides an offer. It does not come back if the same offer is delivered again.
    pub fn dismiss(&mut self, order_id: OrderId) -> bool {
        self.dismissed.insert(order_id);
        self.pending.remove(&order_id).is_some()
    }

    pub fn apply(&mut self, event: &DispatchEvent) {
        match event {
            DispatchEvent::OrderOffered { offer } => {
                if !self.dismissed.contains(&offer.order_id) {
                    self.pending.entry(offer.order_id).or_insert_with(|| offer.clone());
                }
            }
            DispatchEvent::OrderRetracted { order_id, reason } => {
                // A retracted order is never offered again
                self.dismissed.remove(order_id);
                if self.pending.remove(order_id).is_some() {
                    debug!(%order_id, ?reason, "Offer retracted");
                }
            }
            DispatchEvent::OrderAccepted { order_id, .. } => {
                self.pending.remove(order_id);
                if !self.won.contains(order_id) {
                    self.won.push(*order_id);
                }
            }
            DispatchEvent::EarningsCredited { order_id, earnings } => {
                if !self.credited.iter().any(|(id, _)| id == order_id) {
                    self.credited.push((*order_id, *earnings));
                }
            }
            DispatchEvent::StatusChanged { .. } | DispatchEvent::LocationUpdated(_) => {}
        }
    }

    /// Applies every event already queued without waiting. Returns how many were applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.apply(&event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    break;
                }
            }
        }
        applied
    }

    /// Waits for the next event, applies it and returns it. `None` once the session is closed.
    pub async fn next_event(&mut self) -> Option<DispatchEvent> {
        match self.events.recv().await {
            Some(event) => {
                self.apply(&event);
                Some(event)
            }
            None => {
                self.closed = true;
                None
            }
        }
    }

    /// Accepts an offer. Losing the race is an expected outcome, not an error.
    pub async fn accept(&mut self, broker: &DispatchBroker, order_id: OrderId) -> Result<AcceptOutcome, DispatchError> {
        match broker.accept_order(order_id, self.partner_id.clone()).await {
            Ok(order) => {
                self.pending.remove(&order_id);
                if !self.won.contains(&order_id) {
                    self.won.push(order_id);
                }
                Ok(AcceptOutcome::Won(order))
            }
            Err(e) if e.is_stale() => {
                self.pending.remove(&order_id);
                Ok(AcceptOutcome::NoLongerAvailable)
            }
            Err(e) => Err(e),
        }
    }

    /// Rebuilds the open offers from the broker's unassigned list, e.g. after live offers may
    /// have been dropped on a full queue. Dismissed orders stay hidden.
    pub async fn refresh(&mut self, broker: &DispatchBroker) -> Result<(), DispatchError> {
        let unassigned = broker.unassigned_orders().await?;
        let open: HashSet<OrderId> = unassigned.iter().map(|offer| offer.order_id).collect();
        self.dismissed.retain(|order_id| open.contains(order_id));
        self.pending = unassigned
            .into_iter()
            .filter(|offer| !self.dismissed.contains(&offer.order_id))
            .map(|offer| (offer.order_id, offer))
            .collect();
        debug!(pending = self.pending.len(), "Offers refreshed");
        Ok(())
    }

    pub async fn disconnect(self, broker: &DispatchBroker) -> Result<(), DispatchError> {
        broker.disconnect(self.connection_id).await
    }
}
