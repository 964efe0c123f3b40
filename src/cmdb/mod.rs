//! CMDB access.
//!
//! This module handles all communication with the configuration database:
//! - [`api`] - The [`CmdbApi`] trait and the request/response types it uses
//! - [`rpc`] - JSON-RPC over HTTP implementation for a live CMDB
//! - [`memory`] - In-memory implementation backed by a JSON snapshot file

mod api;
mod memory;
mod rpc;

// Re-export public types and functions
pub use api::{CategoryEntry, CategoryUpdate, CmdbApi, ObjectFilter, ObjectSummary, ObjectType};
pub use memory::{MemoryCmdb, Snapshot};
pub use rpc::JsonRpcClient;
