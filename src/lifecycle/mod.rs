//! Runtime orchestration: starting, wiring and stopping the actors, and tracing setup.
//!
//! - [`DispatchSystem`] - creates every actor, injects dependencies, exposes the broker
//! - [`setup_tracing`] - installs the log subscriber

pub mod dispatch_system;
pub mod tracing;

pub use dispatch_system::*;
pub use self::tracing::setup_tracing;
