//! Subnet catalog.
//!
//! Loads every layer-3-net object once, before any object window is
//! processed, and indexes it by object id. The catalog is never mutated
//! afterwards.

use crate::cmdb::{CategoryEntry, CmdbApi, ObjectFilter, ObjectSummary};
use crate::config::{ReconciliationConfig, CATEGORY_NET, OBJTYPE_LAYER3_NET, STATUS_NORMAL};
use crate::error::{Error, Result};
use crate::models::{attribute_const, attribute_id, attribute_text};
use crate::models::{AddressRange, NetFamily, SubnetRecord};
use colored::Colorize;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;

/// Index of subnet records by object id.
#[derive(Debug, Default)]
pub struct SubnetCatalog {
    subnets: BTreeMap<u64, SubnetRecord>,
}

impl SubnetCatalog {
    pub fn new<I: IntoIterator<Item = SubnetRecord>>(records: I) -> SubnetCatalog {
        SubnetCatalog {
            subnets: records.into_iter().map(|s| (s.object_id, s)).collect(),
        }
    }

    pub fn get(&self, object_id: u64) -> Option<&SubnetRecord> {
        self.subnets.get(&object_id)
    }

    pub fn len(&self) -> usize {
        self.subnets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubnetRecord> {
        self.subnets.values()
    }

    /// Proper IPv4 subnets whose range holds `addr`, ordered by object id.
    pub fn candidates(&self, addr: Ipv4Addr) -> Vec<&SubnetRecord> {
        self.subnets
            .values()
            .filter(|s| s.is_repair_target() && s.contains(addr))
            .collect()
    }
}

/// Read all layer-3-net objects and their network definitions.
///
/// Fails with [`Error::Consistency`] when the CMDB answers fewer range
/// reads than requested or a subnet has no network definition at all.
/// Subnets with an unknown net type or without range bounds are logged and
/// left out.
pub fn build_catalog<A: CmdbApi>(api: &A, config: &ReconciliationConfig) -> Result<SubnetCatalog> {
    let filter = ObjectFilter::by_type(OBJTYPE_LAYER3_NET).with_status(STATUS_NORMAL);
    let nets: Vec<ObjectSummary> = api
        .read_objects(&filter, 0, 0)?
        .into_iter()
        .filter(|o| o.status == STATUS_NORMAL)
        .collect();
    log::info!("Found {} layer-3-net objects", nets.len());

    if nets.is_empty() {
        return Ok(SubnetCatalog::default());
    }

    let ids: Vec<u64> = nets.iter().map(|o| o.id).collect();
    let definitions = api.batch_read_category(&ids, CATEGORY_NET)?;
    if definitions.len() != ids.len() {
        return Err(Error::Consistency(format!(
            "requested network definitions of {} subnets but received {}",
            ids.len(),
            definitions.len()
        )));
    }

    let mut records = Vec::with_capacity(nets.len());
    for (net, entries) in nets.iter().zip(definitions) {
        let entry = entries.first().ok_or_else(|| {
            Error::Consistency(format!(
                "subnet '{}' #{} has no network definition",
                net.title, net.id
            ))
        })?;
        let is_unproper = config.is_unproper(&net.title);
        match subnet_from_entry(net, entry, is_unproper) {
            Ok(record) => {
                log::debug!("subnet {record}");
                records.push(record);
            }
            Err(reason) => log::warn!(
                "{skip} subnet '{}' #{}: {reason}",
                net.title,
                net.id,
                skip = "skip".yellow()
            ),
        }
    }

    let catalog = SubnetCatalog::new(records);
    log::info!(
        "Subnet catalog: {} usable of {} ({} repair targets)",
        catalog.len(),
        nets.len(),
        catalog.iter().filter(|s| s.is_repair_target()).count()
    );
    Ok(catalog)
}

/// Turn a network definition entry into a record. `Err` carries the reason
/// the subnet is left out.
fn subnet_from_entry(
    net: &ObjectSummary,
    entry: &CategoryEntry,
    is_unproper: bool,
) -> Result<SubnetRecord, String> {
    let net_type = entry.get("type").ok_or("no net type")?;
    let family = match attribute_const(net_type) {
        Some(c) => NetFamily::from_const(&c),
        None => attribute_id(net_type)
            .map(NetFamily::from_id)
            .ok_or("no net type")?,
    };

    let bound = |key: &str| {
        entry
            .get(key)
            .and_then(attribute_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(format!("missing {key}"))
    };

    let range = match &family {
        NetFamily::Ipv4 => Some(AddressRange::parse(&bound("range_from")?, &bound("range_to")?)?),
        NetFamily::Ipv6 => {
            bound("range_from")?;
            bound("range_to")?;
            None
        }
        NetFamily::Unknown(c) => return Err(format!("unknown net type '{c}'")),
    };

    Ok(SubnetRecord {
        object_id: net.id,
        title: net.title.clone(),
        family,
        range,
        is_unproper,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdb::MemoryCmdb;
    use serde_json::json;

    fn net(id: u64, title: &str) -> ObjectSummary {
        ObjectSummary {
            id,
            title: title.to_string(),
            type_id: 27,
            type_title: "Layer 3-Net".to_string(),
            status: STATUS_NORMAL,
        }
    }

    fn entry(v: serde_json::Value) -> CategoryEntry {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_subnet_from_entry_ipv4() {
        let rec = subnet_from_entry(
            &net(110, "lan-a"),
            &entry(json!({
                "type": {"id": "1", "const": "C__CATS_NET_TYPE__IPV4"},
                "range_from": "10.0.0.1",
                "range_to": "10.0.0.254"
            })),
            false,
        )
        .unwrap();
        assert_eq!(rec.family, NetFamily::Ipv4);
        assert!(rec.contains(Ipv4Addr::new(10, 0, 0, 1)));
        assert!(rec.is_repair_target());
    }

    #[test]
    fn test_subnet_from_entry_excluded() {
        let bad_type = entry(json!({"type": {"const": "C__CATS_NET_TYPE__IPX"}}));
        assert!(subnet_from_entry(&net(1, "x"), &bad_type, false)
            .unwrap_err()
            .contains("unknown net type"));

        let no_range = entry(json!({
            "type": {"const": "C__CATS_NET_TYPE__IPV4"},
            "range_from": ""
        }));
        assert_eq!(
            subnet_from_entry(&net(1, "x"), &no_range, false).unwrap_err(),
            "missing range_from"
        );

        let reversed = entry(json!({
            "type": 1, "range_from": "10.0.0.9", "range_to": "10.0.0.1"
        }));
        assert!(subnet_from_entry(&net(1, "x"), &reversed, false).is_err());
    }

    #[test]
    fn test_subnet_from_entry_ipv6_has_no_range() {
        let rec = subnet_from_entry(
            &net(130, "v6-lan"),
            &entry(json!({
                "type": {"const": "C__CATS_NET_TYPE__IPV6"},
                "range_from": "fd00::1",
                "range_to": "fd00::ffff"
            })),
            false,
        )
        .unwrap();
        assert_eq!(rec.family, NetFamily::Ipv6);
        assert!(rec.range.is_none());
        assert!(!rec.is_repair_target());
    }

    #[test]
    fn test_build_catalog_from_snapshot() {
        let cmdb = MemoryCmdb::from_file("src/tests/test_data/cmdb_snapshot_01.json").unwrap();
        let catalog = build_catalog(&cmdb, &ReconciliationConfig::default()).unwrap();

        // archived, unknown-type and rangeless nets are left out
        assert!(catalog.get(140).is_none());
        assert!(catalog.get(150).is_none());
        assert!(catalog.get(151).is_none());
        assert_eq!(catalog.len(), 6);
        assert!(catalog.get(100).unwrap().is_unproper);
        for s in catalog.iter() {
            if let Some(r) = s.range {
                assert!(u32::from(r.start()) <= u32::from(r.end()));
            }
        }

        let hits: Vec<u64> = catalog
            .candidates(Ipv4Addr::new(192, 168, 1, 5))
            .iter()
            .map(|s| s.object_id)
            .collect();
        assert_eq!(hits, vec![120, 121]);
        // Global v4 contains everything but is never a candidate
        assert!(catalog.candidates(Ipv4Addr::new(172, 16, 0, 1)).is_empty());
    }

    #[test]
    fn test_build_catalog_count_mismatch_is_fatal() {
        let cmdb = MemoryCmdb::from_file("src/tests/test_data/cmdb_snapshot_01.json")
            .unwrap()
            .without_answers_for(&[121]);
        let err = build_catalog(&cmdb, &ReconciliationConfig::default()).unwrap_err();
        assert!(err.is_consistency());
    }
}
