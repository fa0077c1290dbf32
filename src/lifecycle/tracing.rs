//! # Observability & Tracing
//!
//! [`setup_tracing`] installs the global `tracing` subscriber. Call it once, at the top of the
//! binary; library code only emits events.
//!
//! ## Configuration
//!
//! Verbosity comes from `RUST_LOG`. The compact format hides module paths; the structured
//! fields (`order_id`, `partner_id`, `connection`, `document_type`) carry the context instead.
//!
//! ```bash
//! # Lifecycle, placements, accepts and status changes
//! RUST_LOG=info cargo run
//!
//! # Adds every store request, fan-out decision and pruned connection
//! RUST_LOG=debug cargo run
//!
//! # Only the hub
//! RUST_LOG=grocery_dispatch::dispatch::hub=debug cargo run
//! ```
//!
//! ## What Gets Traced
//!
//! - **Actors**: start and shutdown of the order store, hub and sample store
//! - **Order store**: creates, committed transitions, rejected transitions with the reason
//! - **Broker**: one span per entry point (`accept_order`, `advance_status`, ...) carrying its ids
//! - **Hub**: connects, replaced sessions, dropped events on full queues, pruned connections
//!
//! A lost accept race looks like this at `info`:
//!
//! ```text
//! WARN accept_order{order_id=OrderId(1) partner_id=PartnerId("p-2")}: Action rejected document_type="Order" id=order_1 error=Stale state for order_1: expected PLACED, found CONFIRMED
//! INFO accept_order{order_id=OrderId(1) partner_id=PartnerId("p-2")}: Accept lost, order no longer available order_id=order_1
//! ```
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
