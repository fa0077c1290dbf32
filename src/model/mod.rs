//! Pure data: orders as persisted by the order store, and partner identities.

pub mod order;
pub mod partner;

pub use order::*;
pub use partner::*;
