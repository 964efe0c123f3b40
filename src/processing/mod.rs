//! IP address reconciliation.
//!
//! This module contains the logic of the `fixip` run:
//! - [`catalog`] - Index of all layer-3-net subnets
//! - [`collector`] - Windows of objects with their IP entries
//! - [`engine`] - Classification and repair planning per window
//! - [`dispatch`] - Batched writing of repairs
//! - [`fixip`] - The run tying them together

pub mod catalog;
pub mod collector;
pub mod dispatch;
pub mod engine;
mod fixip;

// Re-export public functions
pub use catalog::{build_catalog, SubnetCatalog};
pub use collector::ObjectWindows;
pub use dispatch::Dispatcher;
pub use engine::{EntryOutcome, EntryReport, Reconciler, WindowReport};
pub use fixip::reconcile;
