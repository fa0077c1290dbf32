//! The order store: orders kept in a [`StoreActor`] and changed only through conditional
//! transitions.
//!
//! Every committed change is handed to the [`DispatchHub`](crate::dispatch::DispatchHub) from
//! inside the store loop, so the hub sees each order's commits in version order. A commit that
//! ends the order closes its tracking first, before the hub hears about it.

pub mod entity;
pub mod error;
pub mod transition;

pub use error::*;
pub use transition::*;

use crate::clients::OrderClient;
use crate::dispatch::HubClient;
use crate::model::Order;
use crate::store::StoreActor;
use crate::tracking::SampleClient;

/// What the order store notifies after each commit.
#[derive(Clone)]
pub struct CommitHooks {
    pub hub: HubClient,
    pub samples: SampleClient,
}

/// Creates the order store actor and its client.
pub fn new(buffer_size: usize) -> (StoreActor<Order>, OrderClient) {
    let (actor, generic_client) = StoreActor::new(buffer_size);
    (actor, OrderClient::new(generic_client))
}
