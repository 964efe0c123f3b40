//! CMDB objects and their IP address category entries.

use super::{parse_ipv4, NetFamily};
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

/// Plain text of a category attribute.
///
/// Attributes come back either as scalars or as dialog/object-browser
/// objects (`{"id": .., "title": .., "ref_title": ..}`).
pub fn attribute_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => ["ref_title", "title", "value"]
            .iter()
            .find_map(|k| map.get(*k).and_then(attribute_text)),
        _ => None,
    }
}

/// Numeric id of a category attribute (`5`, `"5"` or `{"id": "5"}`).
pub fn attribute_id(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Object(map) => map.get("id").and_then(attribute_id),
        _ => None,
    }
}

/// Constant of a dialog attribute (`{"const": "C__.."}`), or the string
/// itself. Numeric strings are ids, not constants.
pub fn attribute_const(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() && s.parse::<u64>().is_err() => Some(s.clone()),
        Value::Object(map) => map
            .get("const")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// One entry of the IP category.
#[derive(Debug, Clone, PartialEq)]
pub struct IpAddressEntry {
    pub entry_id: u64,
    /// Address as written in the CMDB.
    pub address_text: String,
    /// Parsed IPv4 address, `None` if unparsable or not IPv4.
    pub address: Option<Ipv4Addr>,
    pub family: NetFamily,
    /// Object id of the subnet the entry is bound to.
    pub assigned_subnet: Option<u64>,
    /// Every attribute as returned by the API; carried into updates.
    pub raw: Map<String, Value>,
}

impl IpAddressEntry {
    /// Build a typed entry from a raw category entry. Returns `None` when
    /// the entry has no id.
    pub fn from_raw(raw: Map<String, Value>) -> Option<IpAddressEntry> {
        let entry_id = raw.get("id").and_then(attribute_id)?;

        let family = match raw.get("net_type") {
            Some(v) => match attribute_const(v) {
                Some(c) => NetFamily::from_const(&c),
                None => attribute_id(v)
                    .map(NetFamily::from_id)
                    .unwrap_or_else(|| NetFamily::Unknown("none".to_string())),
            },
            None => NetFamily::Unknown("none".to_string()),
        };

        let address_key = match family {
            NetFamily::Ipv6 => "ipv6_address",
            _ => "ipv4_address",
        };
        let address_text = raw
            .get(address_key)
            .or_else(|| raw.get("hostaddress"))
            .and_then(attribute_text)
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        let address = match family {
            NetFamily::Ipv4 => parse_ipv4(&address_text),
            _ => None,
        };

        let assigned_subnet = raw
            .get("net")
            .and_then(attribute_id)
            .filter(|id| *id > 0);

        Some(IpAddressEntry {
            entry_id,
            address_text,
            address,
            family,
            assigned_subnet,
            raw,
        })
    }

    pub fn has_address(&self) -> bool {
        !self.address_text.is_empty()
    }
}

/// An object of one fetch window together with its IP entries.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkObject {
    pub id: u64,
    pub title: String,
    pub type_title: String,
    pub ip_entries: Vec<IpAddressEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_attribute_helpers() {
        assert_eq!(attribute_text(&json!("10.0.0.1")), Some("10.0.0.1".to_string()));
        assert_eq!(
            attribute_text(&json!({"ref_id": "7", "ref_title": "10.0.0.1"})),
            Some("10.0.0.1".to_string())
        );
        assert_eq!(attribute_id(&json!("42")), Some(42));
        assert_eq!(attribute_id(&json!({"id": 42, "title": "lan"})), Some(42));
        assert_eq!(attribute_id(&json!(null)), None);
        assert_eq!(
            attribute_const(&json!({"id": "1", "const": "C__CATS_NET_TYPE__IPV4"})),
            Some("C__CATS_NET_TYPE__IPV4".to_string())
        );
        assert_eq!(attribute_const(&json!({"id": "1"})), None);
        assert_eq!(attribute_const(&json!("1000")), None);
    }

    #[test]
    fn test_ipv4_entry_from_raw() {
        let e = IpAddressEntry::from_raw(raw(json!({
            "id": "17",
            "objID": "5",
            "net_type": {"id": "1", "title": "IPv4", "const": "C__CATS_NET_TYPE__IPV4"},
            "ipv4_address": {"ref_id": "99", "ref_title": "10.0.0.5"},
            "net": {"id": "100", "title": "office"},
            "hostname": "host1"
        })))
        .unwrap();
        assert_eq!(e.entry_id, 17);
        assert_eq!(e.family, NetFamily::Ipv4);
        assert_eq!(e.address, Some(Ipv4Addr::new(10, 0, 0, 5)));
        assert_eq!(e.assigned_subnet, Some(100));
        assert_eq!(e.raw.get("hostname"), Some(&json!("host1")));
    }

    #[test]
    fn test_ipv6_and_unparsable_entries() {
        let v6 = IpAddressEntry::from_raw(raw(json!({
            "id": 1,
            "net_type": {"const": "C__CATS_NET_TYPE__IPV6"},
            "ipv6_address": "fd00::1"
        })))
        .unwrap();
        assert_eq!(v6.family, NetFamily::Ipv6);
        assert_eq!(v6.address_text, "fd00::1");
        assert!(v6.address.is_none());

        let bad = IpAddressEntry::from_raw(raw(json!({
            "id": 2,
            "net_type": 1,
            "ipv4_address": "10.0.0.x",
            "net": "0"
        })))
        .unwrap();
        assert_eq!(bad.family, NetFamily::Ipv4);
        assert!(bad.has_address());
        assert!(bad.address.is_none());
        assert!(bad.assigned_subnet.is_none());
    }

    #[test]
    fn test_entry_without_id_or_address() {
        assert!(IpAddressEntry::from_raw(raw(json!({"ipv4_address": "10.0.0.1"}))).is_none());
        let empty = IpAddressEntry::from_raw(raw(json!({"id": 3}))).unwrap();
        assert!(!empty.has_address());
        assert_eq!(empty.family, NetFamily::Unknown("none".to_string()));
    }
}
