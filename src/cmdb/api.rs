//! The CMDB API seam.
//!
//! Everything the reconciler needs from the remote database goes through
//! [`CmdbApi`], so a run can target a live JSON-RPC endpoint or a snapshot.

use crate::error::Result;
use crate::models::attribute_id;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Raw category entry: attribute name to value, as returned by the API.
pub type CategoryEntry = Map<String, Value>;

/// Accept ids sent as JSON numbers or as numeric strings.
fn de_lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    attribute_id(&v).ok_or_else(|| de::Error::custom(format!("invalid numeric id: {v}")))
}

fn de_lenient_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let n = de_lenient_u64(deserializer)?;
    u8::try_from(n).map_err(|_| de::Error::custom(format!("status out of range: {n}")))
}

/// Object type as listed by the schema.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObjectType {
    #[serde(deserialize_with = "de_lenient_u64")]
    pub id: u64,
    pub title: String,
    #[serde(rename = "const")]
    pub constant: String,
}

/// One row of an object listing.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ObjectSummary {
    #[serde(deserialize_with = "de_lenient_u64")]
    pub id: u64,
    pub title: String,
    #[serde(rename = "type", deserialize_with = "de_lenient_u64")]
    pub type_id: u64,
    #[serde(default)]
    pub type_title: String,
    #[serde(deserialize_with = "de_lenient_u8")]
    pub status: u8,
}

/// Server-side filter for object listings.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ObjectFilter {
    /// Object type constant.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_const: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u8>,
}

impl ObjectFilter {
    pub fn all() -> ObjectFilter {
        ObjectFilter::default()
    }

    pub fn by_type(type_const: &str) -> ObjectFilter {
        ObjectFilter {
            type_const: Some(type_const.to_string()),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u8) -> ObjectFilter {
        self.status = Some(status);
        self
    }
}

/// Update of one category entry.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryUpdate {
    pub object_id: u64,
    pub category: String,
    pub entry_id: u64,
    /// Attributes to write; everything except the entry and object ids.
    pub data: CategoryEntry,
}

/// Operations the reconciler consumes from the CMDB.
///
/// Batch reads return one result per requested object in request order.
/// A result list shorter than the request means the server dropped
/// responses; callers treat that as inconsistent data.
pub trait CmdbApi {
    /// List all object types (id, title, constant).
    fn read_object_types(&self) -> Result<Vec<ObjectType>>;

    /// Read one page of objects. `limit == 0` reads everything.
    fn read_objects(
        &self,
        filter: &ObjectFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ObjectSummary>>;

    /// Read the entries of `category` for every object in `object_ids`.
    fn batch_read_category(
        &self,
        object_ids: &[u64],
        category: &str,
    ) -> Result<Vec<Vec<CategoryEntry>>>;

    /// Write all `updates` in a single batch request.
    fn batch_update_category(&self, updates: &[CategoryUpdate]) -> Result<()>;
}
