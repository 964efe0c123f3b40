//! Domain models for IP address reconciliation.
//!
//! This module contains the core data structures used throughout the application:
//! - [`AddressRange`] and [`NetFamily`] - IPv4 range arithmetic and address families
//! - [`SubnetRecord`] - a layer-3-net object as seen by the reconciler
//! - [`NetworkObject`] and [`IpAddressEntry`] - objects and their IP category entries
//! - [`RunStatistics`] - counters reported at the end of a run

mod ipv4;
mod object;
mod stats;
mod subnet;

// Re-export public types
pub use ipv4::{parse_ipv4, AddressRange, NetFamily};
pub use object::{attribute_const, attribute_id, attribute_text, IpAddressEntry, NetworkObject};
pub use stats::RunStatistics;
pub use subnet::SubnetRecord;
