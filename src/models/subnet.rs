//! Layer-3-net subnet record.

use super::{AddressRange, NetFamily};
use std::fmt;
use std::net::Ipv4Addr;

/// A layer-3-net object indexed by the catalog. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SubnetRecord {
    /// CMDB object id of the layer-3-net object.
    pub object_id: u64,
    /// Object title, matched against the unproper subnet list.
    pub title: String,
    pub family: NetFamily,
    /// Address range, only set for IPv4 subnets.
    pub range: Option<AddressRange>,
    /// Catch-all subnet that must never be a repair target.
    pub is_unproper: bool,
}

impl SubnetRecord {
    /// True if this is an IPv4 subnet whose range holds `addr`.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.range.map(|r| r.contains(addr)).unwrap_or(false)
    }

    /// Only proper IPv4 subnets with a range may be chosen for repairs.
    pub fn is_repair_target(&self) -> bool {
        self.family == NetFamily::Ipv4 && !self.is_unproper && self.range.is_some()
    }
}

impl fmt::Display for SubnetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' #{} ({}", self.title, self.object_id, self.family)?;
        if let Some(range) = self.range {
            write!(f, " {range}")?;
        }
        if self.is_unproper {
            write!(f, ", unproper")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(title: &str, from: &str, to: &str) -> SubnetRecord {
        SubnetRecord {
            object_id: 100,
            title: title.to_string(),
            family: NetFamily::Ipv4,
            range: Some(AddressRange::parse(from, to).unwrap()),
            is_unproper: false,
        }
    }

    #[test]
    fn test_subnet_contains() {
        let s = subnet("office", "10.0.0.1", "10.0.0.254");
        assert!(s.contains(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!s.contains(Ipv4Addr::new(10, 0, 1, 5)));
        assert!(s.is_repair_target());
        assert_eq!(s.to_string(), "'office' #100 (IPv4 10.0.0.1-10.0.0.254)");
    }

    #[test]
    fn test_unproper_and_ipv6_are_not_targets() {
        let mut global = subnet("Global v4", "0.0.0.0", "255.255.255.255");
        global.is_unproper = true;
        assert!(global.contains(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!global.is_repair_target());

        let v6 = SubnetRecord {
            object_id: 101,
            title: "v6-lan".to_string(),
            family: NetFamily::Ipv6,
            range: None,
            is_unproper: false,
        };
        assert!(!v6.contains(Ipv4Addr::new(10, 0, 0, 5)));
        assert!(!v6.is_repair_target());
    }
}
