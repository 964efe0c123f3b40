//! Error types for the IP reconciliation run.
//!
//! Fatal conditions abort the whole run and are returned as [`Error`].
//! Per-entry data problems are not errors; they are collected as
//! [`DataQualityWarning`] values and processing continues.

use std::fmt;
use thiserror::Error;

/// Fatal errors. Any of these terminates the run.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote dataset is internally inconsistent (e.g. fewer subnet
    /// results than requested).
    #[error("Inconsistent CMDB data: {0}")]
    Consistency(String),

    /// Network or HTTP failure talking to the CMDB.
    #[error("CMDB transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The CMDB answered with a JSON-RPC error object.
    #[error("CMDB API error {code} in {method}: {message}")]
    Api {
        method: String,
        code: i64,
        message: String,
    },

    /// A response did not have the expected shape.
    #[error("Unexpected response from {method}: path={path} error={source}")]
    Decode {
        method: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid or incomplete configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub fn is_consistency(&self) -> bool {
        matches!(self, Error::Consistency(_))
    }
}

/// Convenience Result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A per-entry data-quality finding. Logged and counted, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataQualityWarning {
    /// Address text could not be parsed as IPv4.
    Unparsable(String),
    /// IPv6 addresses are reported but never repaired.
    Ipv6(String),
    /// The entry's net type is neither IPv4 nor IPv6.
    UnknownNetType(String),
    /// No proper subnet contains the address.
    NoCandidate,
    /// More than one proper subnet contains the address.
    Ambiguous(usize),
    /// Another entry with the same address is already assigned to the
    /// chosen subnet.
    Collision { other_entry: u64 },
}

impl DataQualityWarning {
    /// Broken entries are counted as `broken`; the others are `lost`.
    pub fn is_broken(&self) -> bool {
        matches!(
            self,
            DataQualityWarning::Unparsable(_)
                | DataQualityWarning::Ipv6(_)
                | DataQualityWarning::UnknownNetType(_)
        )
    }
}

impl fmt::Display for DataQualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataQualityWarning::Unparsable(addr) => write!(f, "unparsable address '{addr}'"),
            DataQualityWarning::Ipv6(addr) => write!(f, "IPv6 address {addr} is not supported"),
            DataQualityWarning::UnknownNetType(t) => write!(f, "unknown net type '{t}'"),
            DataQualityWarning::NoCandidate => write!(f, "no suitable subnet"),
            DataQualityWarning::Ambiguous(n) => write!(f, "ambiguous, {n} subnets match"),
            DataQualityWarning::Collision { other_entry } => write!(
                f,
                "address already assigned to this subnet by entry #{other_entry}"
            ),
        }
    }
}
