//! CMDB client for auditing and repairing the subnet assignment of IP
//! addresses.
//!
//! - [`cmdb`] - CMDB API access (JSON-RPC and snapshot)
//! - [`models`] - Subnets, objects, IP entries and statistics
//! - [`processing`] - The `fixip` reconciliation run
//! - [`output`] - Run summary

pub mod cmdb;
pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod processing;

pub use config::ReconciliationConfig;
pub use error::{DataQualityWarning, Error, Result};
pub use models::RunStatistics;
pub use processing::reconcile;
