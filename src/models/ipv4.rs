//! IPv4 address range utilities.
//!
//! Provides [`AddressRange`] for inclusive `from..=to` ranges and
//! [`NetFamily`] for classifying CMDB net type constants.

use crate::config::{NET_TYPE_IPV4, NET_TYPE_IPV6};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parse an IPv4 address as stored in the CMDB, ignoring surrounding spaces.
///
/// # Examples
/// ```
/// use cmdb_fixip::models::parse_ipv4;
/// assert_eq!(u32::from(parse_ipv4(" 10.0.0.5 ").unwrap()), 0x0A000005);
/// assert!(parse_ipv4("10.0.0.256").is_none());
/// ```
pub fn parse_ipv4(text: &str) -> Option<Ipv4Addr> {
    Ipv4Addr::from_str(text.trim()).ok()
}

/// Address family of a net or IP entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NetFamily {
    Ipv4,
    Ipv6,
    /// Carries the unrecognised constant (or id) for reporting.
    Unknown(String),
}

impl NetFamily {
    /// Classify a net type constant such as `C__CATS_NET_TYPE__IPV4`.
    pub fn from_const(net_type: &str) -> NetFamily {
        match net_type.trim() {
            NET_TYPE_IPV4 => NetFamily::Ipv4,
            NET_TYPE_IPV6 => NetFamily::Ipv6,
            other => NetFamily::Unknown(other.to_string()),
        }
    }

    /// Classify a numeric net type id, used when no constant is returned.
    pub fn from_id(id: u64) -> NetFamily {
        match id {
            1 => NetFamily::Ipv4,
            1000 => NetFamily::Ipv6,
            other => NetFamily::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for NetFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NetFamily::Ipv4 => write!(f, "IPv4"),
            NetFamily::Ipv6 => write!(f, "IPv6"),
            NetFamily::Unknown(c) => write!(f, "unknown({c})"),
        }
    }
}

/// Inclusive IPv4 address range. `from <= to` always holds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AddressRange {
    from: Ipv4Addr,
    to: Ipv4Addr,
}

impl AddressRange {
    /// Build a range, rejecting reversed bounds.
    pub fn new(from: Ipv4Addr, to: Ipv4Addr) -> Result<AddressRange, String> {
        if u32::from(from) > u32::from(to) {
            return Err(format!("range start {from} is above range end {to}"));
        }
        Ok(AddressRange { from, to })
    }

    /// Build a range from the textual bounds of a net category entry.
    pub fn parse(from: &str, to: &str) -> Result<AddressRange, String> {
        let lo = parse_ipv4(from).ok_or_else(|| format!("invalid range start '{from}'"))?;
        let hi = parse_ipv4(to).ok_or_else(|| format!("invalid range end '{to}'"))?;
        AddressRange::new(lo, hi)
    }

    pub fn start(&self) -> Ipv4Addr {
        self.from
    }

    pub fn end(&self) -> Ipv4Addr {
        self.to
    }

    /// Inclusive on both ends.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let a = u32::from(addr);
        u32::from(self.from) <= a && a <= u32::from(self.to)
    }
}

impl fmt::Display for AddressRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}
