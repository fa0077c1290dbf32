//! Live delivery tracking: partner position samples, remaining distance, and ETA.

pub mod samples;
pub mod tracker;

pub use samples::*;
pub use tracker::*;
