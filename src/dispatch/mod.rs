//! Order dispatch: the broker that arbitrates accepts and the hub that fans events out to
//! connected partners, customers and admins.

pub mod broker;
pub mod directory;
pub mod error;
pub mod events;
pub mod hub;

pub use broker::*;
pub use directory::*;
pub use error::*;
pub use events::*;
pub use hub::*;
