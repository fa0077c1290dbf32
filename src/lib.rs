//! # Grocery Dispatch
//!
//! > **Real-time order dispatch and delivery tracking for a grocery delivery platform.**
//!
//! New orders are broadcast to every connected delivery partner. Partners race to accept;
//! exactly one wins. The winner walks the order through preparation, pickup and delivery while
//! reporting its position, and the customer sees status and ETA as they change.
//!
//! ## Architecture Notes
//!
//! ### 1. One conditional write decides every race
//! Orders live in a [`StoreActor`](store::StoreActor) and change only through
//! [`ConditionalTransition`](order_store::ConditionalTransition)s: "move to X if the order is
//! still in Y". The actor applies them one at a time, so the first accept commits and every
//! other accept fails with `StaleStateConflict`. Nothing else takes a lock.
//!
//! ### 2. Commits drive notifications
//! The order store hands every committed snapshot to the [`DispatchHub`](dispatch::DispatchHub)
//! before processing its next request. Subscribers therefore see an order's status changes in
//! commit order.
//!
//! ### 3. Broadcast, then reconcile
//! A partner registering late would miss earlier broadcasts, so registration also returns every
//! order still unassigned. See [`DispatchBroker::register_partner`](dispatch::DispatchBroker::register_partner).
//!
//! ### 4. Lossy delivery
//! Each connection has a bounded queue. A client that falls behind loses events rather than
//! slowing anyone else down, and refetches state when it notices.
//!
//! ## Module Tour
//!
//! - [`store`]: the generic document store actor, its client and a mock for tests
//! - [`model`]: orders, line items, addresses, partner ids
//! - [`order_store`] and [`clients`]: the order state machine and its typed client
//! - [`dispatch`]: broker, hub, events, partner directory
//! - [`tracking`]: position samples, distance and ETA
//! - [`surfaces`]: partner feed and customer tracking view
//! - [`geo`], [`earnings`]: pure helpers
//! - [`config`], [`lifecycle`]: tunables, start-up and shutdown, tracing
//!
//! ## Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! ```

pub mod clients;
pub mod config;
pub mod dispatch;
pub mod earnings;
pub mod geo;
pub mod lifecycle;
pub mod model;
pub mod order_store;
pub mod store;
pub mod surfaces;
pub mod tracking;
