//! Reconciliation engine.
//!
//! Classifies every IP entry of a window as fine, broken or lost, picks the
//! single proper subnet containing a lost address, and builds the update
//! that binds the entry to it.

use super::catalog::SubnetCatalog;
use crate::cmdb::CategoryUpdate;
use crate::config::CATEGORY_IP;
use crate::error::DataQualityWarning;
use crate::models::{
    attribute_id, attribute_text, IpAddressEntry, NetFamily, NetworkObject, RunStatistics,
};
use colored::Colorize;
use serde_json::{Map, Value};
use std::net::Ipv4Addr;

/// What happened to one IP entry.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryOutcome {
    /// Bound to a proper subnet that contains the address.
    Fine,
    /// Cannot be handled at all.
    Broken(DataQualityWarning),
    /// Lost, but no repair is possible.
    Unrepaired(DataQualityWarning),
    /// Lost, an update binding it to `subnet_id` was queued.
    Repaired { subnet_id: u64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EntryReport {
    pub object_id: u64,
    pub entry_id: u64,
    pub address: String,
    pub outcome: EntryOutcome,
}

/// Result of reconciling one window.
#[derive(Debug, Default)]
pub struct WindowReport {
    /// Queued corrective updates, one per repaired entry.
    pub updates: Vec<CategoryUpdate>,
    /// One report per IP entry in the window.
    pub entries: Vec<EntryReport>,
}

impl WindowReport {
    /// Data-quality findings of this window.
    pub fn warnings(&self) -> impl Iterator<Item = &DataQualityWarning> {
        self.entries.iter().filter_map(|e| match &e.outcome {
            EntryOutcome::Broken(w) | EntryOutcome::Unrepaired(w) => Some(w),
            _ => None,
        })
    }
}

pub struct Reconciler<'a> {
    catalog: &'a SubnetCatalog,
}

impl<'a> Reconciler<'a> {
    pub fn new(catalog: &'a SubnetCatalog) -> Reconciler<'a> {
        Reconciler { catalog }
    }

    /// An entry is lost if it is unassigned, assigned to an unproper subnet,
    /// assigned to something that is not a known subnet, or assigned to a
    /// subnet whose range does not hold the address.
    pub fn is_lost(&self, entry: &IpAddressEntry, addr: Ipv4Addr) -> bool {
        match entry.assigned_subnet.and_then(|id| self.catalog.get(id)) {
            None => true,
            Some(subnet) => subnet.is_unproper || !subnet.contains(addr),
        }
    }

    /// Reconcile all entries of a window. Increments `broken` and `lost`;
    /// `fixed` is left to the dispatcher.
    pub fn reconcile_window(
        &self,
        window: &[NetworkObject],
        stats: &mut RunStatistics,
    ) -> WindowReport {
        let mut report = WindowReport::default();

        for object in window {
            for entry in &object.ip_entries {
                let outcome = self.reconcile_entry(window, object, entry, stats);
                if let EntryOutcome::Repaired { subnet_id } = outcome {
                    report.updates.push(build_update(object, entry, subnet_id));
                }
                report.entries.push(EntryReport {
                    object_id: object.id,
                    entry_id: entry.entry_id,
                    address: entry.address_text.clone(),
                    outcome,
                });
            }
        }
        report
    }

    fn reconcile_entry(
        &self,
        window: &[NetworkObject],
        object: &NetworkObject,
        entry: &IpAddressEntry,
        stats: &mut RunStatistics,
    ) -> EntryOutcome {
        let addr = match (&entry.family, entry.address) {
            (NetFamily::Ipv4, Some(addr)) => addr,
            (NetFamily::Ipv4, None) => {
                let warning = DataQualityWarning::Unparsable(entry.address_text.clone());
                return broken(object, entry, warning, stats);
            }
            (NetFamily::Ipv6, _) => {
                let warning = DataQualityWarning::Ipv6(entry.address_text.clone());
                return broken(object, entry, warning, stats);
            }
            (NetFamily::Unknown(c), _) => {
                let warning = DataQualityWarning::UnknownNetType(c.clone());
                return broken(object, entry, warning, stats);
            }
        };

        if !self.is_lost(entry, addr) {
            return EntryOutcome::Fine;
        }

        stats.lost += 1;
        log::info!(
            "{lost} IP {addr} of '{title}' #{obj} (entry #{entry}, assigned subnet {assigned:?})",
            lost = "lost".yellow(),
            title = object.title,
            obj = object.id,
            entry = entry.entry_id,
            assigned = entry.assigned_subnet,
        );

        let candidates = self.catalog.candidates(addr);
        let subnet = match candidates.as_slice() {
            [] => return unrepaired(object, entry, DataQualityWarning::NoCandidate),
            [only] => *only,
            many => return unrepaired(object, entry, DataQualityWarning::Ambiguous(many.len())),
        };

        if let Some(other_entry) = find_collision(window, entry, subnet.object_id) {
            return unrepaired(object, entry, DataQualityWarning::Collision { other_entry });
        }

        log::info!(
            "{fix} IP {addr} of '{title}' #{obj} -> subnet {subnet}",
            fix = "repair".green(),
            title = object.title,
            obj = object.id,
        );
        EntryOutcome::Repaired {
            subnet_id: subnet.object_id,
        }
    }
}

fn broken(
    object: &NetworkObject,
    entry: &IpAddressEntry,
    warning: DataQualityWarning,
    stats: &mut RunStatistics,
) -> EntryOutcome {
    stats.broken += 1;
    log::warn!(
        "{broken} IP entry #{} of '{}' #{}: {warning}",
        entry.entry_id,
        object.title,
        object.id,
        broken = "broken".red()
    );
    EntryOutcome::Broken(warning)
}

fn unrepaired(
    object: &NetworkObject,
    entry: &IpAddressEntry,
    warning: DataQualityWarning,
) -> EntryOutcome {
    log::warn!(
        "cannot fix IP {} of '{}' #{} (entry #{}): {warning}",
        entry.address_text,
        object.title,
        object.id,
        entry.entry_id
    );
    EntryOutcome::Unrepaired(warning)
}

/// Another entry of the window with the same address text that is already
/// bound to `subnet_id`. Only assignments as read from the CMDB count;
/// repairs queued earlier in the same window do not.
fn find_collision(window: &[NetworkObject], entry: &IpAddressEntry, subnet_id: u64) -> Option<u64> {
    window
        .iter()
        .flat_map(|o| o.ip_entries.iter())
        .find(|other| {
            other.entry_id != entry.entry_id
                && other.address_text == entry.address_text
                && other.assigned_subnet == Some(subnet_id)
        })
        .map(|other| other.entry_id)
}

/// Write form of an attribute as read. Dialogs collapse to their value or
/// id, object-browser references to their id or title, lists to ids. Null
/// attributes are left out.
fn write_value(value: &Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => map
            .get("value")
            .cloned()
            .or_else(|| attribute_id(value).map(Value::from))
            .or_else(|| attribute_text(value).map(Value::from)),
        Value::Array(items) => Some(Value::Array(
            items
                .iter()
                .filter_map(|item| match item {
                    Value::Object(_) => attribute_id(item).map(Value::from),
                    other => Some(other.clone()),
                })
                .collect(),
        )),
        scalar => Some(scalar.clone()),
    }
}

/// Update binding `entry` to `subnet_id`. Every other attribute of the
/// entry is carried over in write form.
fn build_update(object: &NetworkObject, entry: &IpAddressEntry, subnet_id: u64) -> CategoryUpdate {
    let mut data: Map<String, Value> = entry
        .raw
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "id" | "objID" | "net"))
        .filter_map(|(key, value)| write_value(value).map(|v| (key.clone(), v)))
        .collect();
    data.insert(
        "ipv4_address".to_string(),
        Value::from(entry.address_text.as_str()),
    );
    data.insert("net".to_string(), Value::from(subnet_id));
    CategoryUpdate {
        object_id: object.id,
        category: CATEGORY_IP.to_string(),
        entry_id: entry.entry_id,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AddressRange, SubnetRecord};
    use serde_json::json;

    fn subnet(id: u64, title: &str, from: &str, to: &str, unproper: bool) -> SubnetRecord {
        SubnetRecord {
            object_id: id,
            title: title.to_string(),
            family: NetFamily::Ipv4,
            range: Some(AddressRange::parse(from, to).unwrap()),
            is_unproper: unproper,
        }
    }

    fn catalog() -> SubnetCatalog {
        SubnetCatalog::new(vec![
            subnet(100, "Global v4", "0.0.0.0", "255.255.255.255", true),
            subnet(110, "A", "10.0.0.1", "10.0.0.254", false),
            subnet(120, "B", "192.168.1.0", "192.168.1.127", false),
            subnet(121, "C", "192.168.1.0", "192.168.1.255", false),
        ])
    }

    fn ip(entry_id: u64, addr: &str, net: Option<u64>) -> IpAddressEntry {
        let mut raw = json!({
            "id": entry_id,
            "net_type": {"id": "1", "const": "C__CATS_NET_TYPE__IPV4"},
            "ipv4_address": {"ref_title": addr},
            "hostname": format!("h{entry_id}"),
            "dns_server": [{"id": "4", "title": "ns1"}],
        });
        if let Some(n) = net {
            raw["net"] = json!({"id": n.to_string()});
        }
        IpAddressEntry::from_raw(raw.as_object().cloned().unwrap()).unwrap()
    }

    fn object(id: u64, entries: Vec<IpAddressEntry>) -> NetworkObject {
        NetworkObject {
            id,
            title: format!("host{id}"),
            type_title: "Server".to_string(),
            ip_entries: entries,
        }
    }

    #[test]
    fn test_unassigned_ip_is_repaired() {
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let window = vec![object(1, vec![ip(11, "10.0.0.5", None)])];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);

        assert_eq!(stats.lost, 1);
        assert_eq!(stats.fixed, 0);
        assert_eq!(report.entries[0].outcome, EntryOutcome::Repaired { subnet_id: 110 });
        assert_eq!(report.updates.len(), 1);
        let update = &report.updates[0];
        assert_eq!(update.object_id, 1);
        assert_eq!(update.entry_id, 11);
        assert_eq!(update.category, CATEGORY_IP);
        assert_eq!(update.data["net"], json!(110));
        assert_eq!(update.data["hostname"], json!("h11"));
        assert_eq!(update.data["ipv4_address"], json!("10.0.0.5"));
        assert_eq!(update.data["dns_server"], json!([4]));
        assert!(update.data.get("id").is_none());
    }

    #[test]
    fn test_correctly_assigned_ip_is_fine() {
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let window = vec![object(2, vec![ip(21, "10.0.0.6", Some(110))])];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);
        assert_eq!(stats, RunStatistics::default());
        assert_eq!(report.entries[0].outcome, EntryOutcome::Fine);
        assert!(report.updates.is_empty());
    }

    #[test]
    fn test_lost_classification() {
        let catalog = catalog();
        let r = Reconciler::new(&catalog);
        let addr = Ipv4Addr::new(10, 0, 0, 5);
        assert!(r.is_lost(&ip(1, "10.0.0.5", None), addr));
        assert!(r.is_lost(&ip(1, "10.0.0.5", Some(100)), addr)); // unproper
        assert!(r.is_lost(&ip(1, "10.0.0.5", Some(999)), addr)); // unknown subnet
        assert!(r.is_lost(&ip(1, "10.0.0.5", Some(120)), addr)); // out of range
        assert!(!r.is_lost(&ip(1, "10.0.0.5", Some(110)), addr));
        // range bounds are inclusive
        assert!(!r.is_lost(&ip(1, "10.0.0.254", Some(110)), Ipv4Addr::new(10, 0, 0, 254)));
    }

    #[test]
    fn test_ambiguous_and_no_candidate() {
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let window = vec![
            object(3, vec![ip(31, "192.168.1.5", None)]),
            object(8, vec![ip(81, "172.16.0.1", None)]),
        ];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);
        assert_eq!(stats.lost, 2);
        assert!(report.updates.is_empty());
        assert_eq!(
            report.entries[0].outcome,
            EntryOutcome::Unrepaired(DataQualityWarning::Ambiguous(2))
        );
        assert_eq!(
            report.entries[1].outcome,
            EntryOutcome::Unrepaired(DataQualityWarning::NoCandidate)
        );
        assert_eq!(report.warnings().count(), 2);
    }

    #[test]
    fn test_broken_entries() {
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let v6 = IpAddressEntry::from_raw(
            json!({
                "id": 41,
                "net_type": {"const": "C__CATS_NET_TYPE__IPV6"},
                "ipv6_address": "fd00::5"
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
        .unwrap();
        let unknown = IpAddressEntry::from_raw(
            json!({
                "id": 42,
                "net_type": {"const": "C__CATS_NET_TYPE__IPX"},
                "ipv4_address": "10.0.0.7"
            })
            .as_object()
            .cloned()
            .unwrap(),
        )
        .unwrap();
        let window = vec![object(4, vec![v6, unknown, ip(43, "10.0.0.x", None)])];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);
        assert_eq!(stats.broken, 3);
        assert_eq!(stats.lost, 0);
        assert!(report.updates.is_empty());
        assert!(report.warnings().all(|w| w.is_broken()));
    }

    #[test]
    fn test_collision_with_assigned_address_blocks_repair() {
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let window = vec![
            object(5, vec![ip(51, "10.0.0.9", Some(110))]),
            object(6, vec![ip(61, "10.0.0.9", None)]),
        ];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);
        assert_eq!(stats.lost, 1);
        assert!(report.updates.is_empty());
        assert_eq!(
            report.entries[1].outcome,
            EntryOutcome::Unrepaired(DataQualityWarning::Collision { other_entry: 51 })
        );
    }

    #[test]
    fn test_two_unassigned_duplicates_are_both_repaired() {
        // only collisions with an existing assignment are detected
        let catalog = catalog();
        let mut stats = RunStatistics::default();
        let window = vec![
            object(5, vec![ip(51, "10.0.0.9", None)]),
            object(6, vec![ip(61, "10.0.0.9", None)]),
        ];
        let report = Reconciler::new(&catalog).reconcile_window(&window, &mut stats);
        assert_eq!(stats.lost, 2);
        assert_eq!(report.updates.len(), 2);
    }

    #[test]
    fn test_update_carries_attributes_in_write_form() {
        let raw = json!({
            "id": "91",
            "objID": "9",
            "net_type": {"id": "1", "title": "IPv4", "const": "C__CATS_NET_TYPE__IPV4"},
            "primary": {"title": "Yes", "value": "1"},
            "active": {"title": "Yes", "value": "1"},
            "ipv4_address": {"ref_id": "5091", "ref_title": "10.0.0.30"},
            "net": {"id": "121", "title": "net"},
            "hostname": "host9",
            "dns_domain": [{"id": "3", "title": "example.net"}],
            "dns_server": [{"id": "9", "title": "10.0.0.53"}],
            "use_standard_gateway": {"title": "No", "value": "0"},
            "assigned_port": null,
            "description": "mgmt"
        });
        let entry = IpAddressEntry::from_raw(raw.as_object().cloned().unwrap()).unwrap();
        let update = build_update(&object(9, vec![]), &entry, 110);

        assert_eq!(
            Value::Object(update.data.clone()),
            json!({
                "net_type": 1,
                "primary": "1",
                "active": "1",
                "ipv4_address": "10.0.0.30",
                "net": 110,
                "hostname": "host9",
                "dns_domain": [3],
                "dns_server": [9],
                "use_standard_gateway": "0",
                "description": "mgmt"
            })
        );
        assert!(update.data.values().all(|v| !v.is_object()));
    }

    #[test]
    fn test_write_value_fallbacks() {
        assert_eq!(write_value(&json!(null)), None);
        assert_eq!(write_value(&json!("x")), Some(json!("x")));
        assert_eq!(write_value(&json!({"ref_title": "10.0.0.1"})), Some(json!("10.0.0.1")));
        assert_eq!(write_value(&json!(["a", {"id": 7}])), Some(json!(["a", 7])));
    }
}
