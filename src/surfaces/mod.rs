//! Client-side views over the event stream: what a partner app and a customer's tracking
//! screen hold in memory.

pub mod partner_feed;
pub mod tracking_view;

pub use partner_feed::*;
pub use tracking_view::*;
