//! In-memory CMDB backed by a JSON snapshot.
//!
//! Lets a run work offline against an exported dataset. Updates are applied
//! to the in-memory entries and every update batch is recorded.

use super::api::{CategoryEntry, CategoryUpdate, CmdbApi, ObjectFilter, ObjectSummary, ObjectType};
use crate::error::{Error, Result};
use crate::models::attribute_id;
use serde::Deserialize;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// Snapshot file layout.
///
/// `categories` maps a category constant to object id (as JSON key) to the
/// entries of that object.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub object_types: Vec<ObjectType>,
    pub objects: Vec<ObjectSummary>,
    pub categories: HashMap<String, HashMap<String, Vec<CategoryEntry>>>,
}

pub struct MemoryCmdb {
    object_types: Vec<ObjectType>,
    objects: Vec<ObjectSummary>,
    categories: RefCell<HashMap<String, BTreeMap<u64, Vec<CategoryEntry>>>>,
    update_batches: RefCell<Vec<Vec<CategoryUpdate>>>,
    /// Objects whose batch read answers are dropped, like a server losing
    /// sub-responses.
    unanswered: HashSet<u64>,
}

impl MemoryCmdb {
    pub fn from_snapshot(snapshot: Snapshot) -> Result<MemoryCmdb> {
        let mut categories = HashMap::new();
        for (category, per_object) in snapshot.categories {
            let mut entries = BTreeMap::new();
            for (key, list) in per_object {
                let id: u64 = key.trim().parse().map_err(|_| {
                    Error::Config(format!("snapshot: invalid object id '{key}' in {category}"))
                })?;
                entries.insert(id, list);
            }
            categories.insert(category, entries);
        }

        let mut objects = snapshot.objects;
        objects.sort_by_key(|o| o.id);

        Ok(MemoryCmdb {
            object_types: snapshot.object_types,
            objects,
            categories: RefCell::new(categories),
            update_batches: RefCell::new(vec![]),
            unanswered: HashSet::new(),
        })
    }

    pub fn from_json(json: &str) -> Result<MemoryCmdb> {
        let mut de = serde_json::Deserializer::from_str(json);
        let snapshot: Snapshot = serde_path_to_error::deserialize(&mut de).map_err(|e| {
            Error::Config(format!(
                "error parsing snapshot: path={} error={}",
                e.path(),
                e.inner()
            ))
        })?;
        MemoryCmdb::from_snapshot(snapshot)
    }

    /// Load a snapshot file.
    pub fn from_file(path: &str) -> Result<MemoryCmdb> {
        if !Path::new(path).exists() {
            return Err(Error::Config(format!("snapshot file does not exist: {path}")));
        }
        log::info!("Reading from snapshot file: {path}");
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("error reading snapshot {path}: {e}")))?;
        MemoryCmdb::from_json(&json)
    }

    /// Drop batch read answers for these objects.
    pub fn without_answers_for(mut self, object_ids: &[u64]) -> MemoryCmdb {
        self.unanswered.extend(object_ids.iter().copied());
        self
    }

    /// Every update batch received so far, in order.
    pub fn update_batches(&self) -> Vec<Vec<CategoryUpdate>> {
        self.update_batches.borrow().clone()
    }

    /// Number of write requests issued.
    pub fn update_request_count(&self) -> usize {
        self.update_batches.borrow().len()
    }

    /// Current entries of one object's category.
    pub fn category_entries(&self, category: &str, object_id: u64) -> Vec<CategoryEntry> {
        self.categories
            .borrow()
            .get(category)
            .and_then(|c| c.get(&object_id))
            .cloned()
            .unwrap_or_default()
    }

    fn type_id(&self, type_const: &str) -> Option<u64> {
        self.object_types
            .iter()
            .find(|t| t.constant == type_const)
            .map(|t| t.id)
    }
}

impl CmdbApi for MemoryCmdb {
    fn read_object_types(&self) -> Result<Vec<ObjectType>> {
        Ok(self.object_types.clone())
    }

    fn read_objects(
        &self,
        filter: &ObjectFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ObjectSummary>> {
        let type_id = match &filter.type_const {
            Some(c) => match self.type_id(c) {
                Some(id) => Some(id),
                None => return Ok(vec![]),
            },
            None => None,
        };
        let matching = self
            .objects
            .iter()
            .filter(|o| type_id.map_or(true, |t| o.type_id == t))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .skip(offset);

        let page: Vec<ObjectSummary> = if limit == 0 {
            matching.cloned().collect()
        } else {
            matching.take(limit).cloned().collect()
        };
        log::trace!("read_objects offset={offset} limit={limit} -> {}", page.len());
        Ok(page)
    }

    fn batch_read_category(
        &self,
        object_ids: &[u64],
        category: &str,
    ) -> Result<Vec<Vec<CategoryEntry>>> {
        let categories = self.categories.borrow();
        let per_object = categories.get(category);
        Ok(object_ids
            .iter()
            .filter(|id| !self.unanswered.contains(id))
            .map(|id| {
                per_object
                    .and_then(|c| c.get(id))
                    .cloned()
                    .unwrap_or_default()
            })
            .collect())
    }

    fn batch_update_category(&self, updates: &[CategoryUpdate]) -> Result<()> {
        let mut categories = self.categories.borrow_mut();
        for update in updates {
            if let Some((key, _)) = update.data.iter().find(|(_, v)| v.is_object()) {
                return Err(Error::Api {
                    method: "cmdb.category.update".to_string(),
                    code: -32602,
                    message: format!("attribute {key} is not a plain value"),
                });
            }
            let entry = categories
                .get_mut(&update.category)
                .and_then(|c| c.get_mut(&update.object_id))
                .and_then(|entries| {
                    entries
                        .iter_mut()
                        .find(|e| e.get("id").and_then(attribute_id) == Some(update.entry_id))
                })
                .ok_or_else(|| Error::Api {
                    method: "cmdb.category.update".to_string(),
                    code: -32099,
                    message: format!(
                        "no {} entry #{} on object #{}",
                        update.category, update.entry_id, update.object_id
                    ),
                })?;
            for (k, v) in &update.data {
                entry.insert(k.clone(), v.clone());
            }
            entry.insert("id".to_string(), Value::from(update.entry_id));
        }
        self.update_batches.borrow_mut().push(updates.to_vec());
        Ok(())
    }
}
