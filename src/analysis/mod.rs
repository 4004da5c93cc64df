//! Analysis modules.
//!
//! Aggregation of reports across an organization or instance, and
//! differencing of two reports of the same application.

pub mod aggregator;
pub mod diff;

pub use aggregator::*;
pub use diff::{compare, order_chronologically};
