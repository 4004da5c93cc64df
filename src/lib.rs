//! iqreport - report retrieval and differencing for Nexus IQ style servers.
//!
//! Retrieves per-application, per-stage evaluation reports (raw component
//! inventory plus policy verdicts), aggregates them across organizations,
//! and computes which components were fixed or waived between two reports.

pub mod analysis;
pub mod client;
pub mod error;
pub mod models;
pub mod report;
pub mod reports;

pub use analysis::{Aggregator, ItemFailure, Partial};
pub use client::{Cancel, HttpSettings, HttpTransport, IqClient, Transport};
pub use error::{IqError, Result};
