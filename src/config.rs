//! Configuration and CMDB constants.
//!
//! Settings come from built-in defaults, an optional JSON config file and
//! environment variables (loaded through `dotenv` by the binary), in
//! increasing order of precedence. Command-line flags are applied last by
//! `main.rs`.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Category holding one entry per IP address of an object.
pub const CATEGORY_IP: &str = "C__CATG__IP";
/// Network definition category of layer-3-net objects.
pub const CATEGORY_NET: &str = "C__CATS__NET";
/// Object type of real subnets.
pub const OBJTYPE_LAYER3_NET: &str = "C__OBJTYPE__LAYER3_NET";
pub const NET_TYPE_IPV4: &str = "C__CATS_NET_TYPE__IPV4";
pub const NET_TYPE_IPV6: &str = "C__CATS_NET_TYPE__IPV6";
/// Record status "normal" (not archived, not deleted).
pub const STATUS_NORMAL: u8 = 2;

/// Default page size when reading objects.
pub const DEFAULT_LIMIT: usize = 100;
/// Default max sub-requests per JSON-RPC batch.
pub const DEFAULT_BATCH_LIMIT: usize = 500;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Object types that never carry IP addresses worth auditing.
pub fn default_object_type_blacklist() -> Vec<String> {
    [
        OBJTYPE_LAYER3_NET,
        "C__OBJTYPE__LAYER2_NET",
        "C__OBJTYPE__RELATION",
        "C__OBJTYPE__PARALLEL_RELATION",
        "C__OBJTYPE__CABLE",
        "C__OBJTYPE__PERSON",
        "C__OBJTYPE__PERSON_GROUP",
        "C__OBJTYPE__ORGANIZATION",
        "C__OBJTYPE__BUILDING",
        "C__OBJTYPE__ROOM",
        "C__OBJTYPE__CITY",
        "C__OBJTYPE__COUNTRY",
        "C__OBJTYPE__OPERATING_SYSTEM",
        "C__OBJTYPE__APPLICATION",
        "C__OBJTYPE__LICENCE",
        "C__OBJTYPE__SERVICE",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Catch-all subnets shipped with the CMDB, never valid repair targets.
pub fn default_unproper_subnets() -> Vec<String> {
    vec!["Global v4".to_string(), "Global v6".to_string()]
}

/// Knobs of one reconciliation run.
#[derive(Debug, Clone)]
pub struct ReconciliationConfig {
    /// Object type constants to skip.
    pub object_type_blacklist: Vec<String>,
    /// Subnet titles that must never be chosen as repair target.
    pub unproper_subnets: Vec<String>,
    /// Objects per page, 0 = everything in one page.
    pub limit: usize,
    /// Max updates per batch request, 0 = one unbounded batch.
    pub batch_limit: usize,
    pub dry_run: bool,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        ReconciliationConfig {
            object_type_blacklist: default_object_type_blacklist(),
            unproper_subnets: default_unproper_subnets(),
            limit: DEFAULT_LIMIT,
            batch_limit: DEFAULT_BATCH_LIMIT,
            dry_run: false,
        }
    }
}

impl ReconciliationConfig {
    pub fn is_unproper(&self, subnet_title: &str) -> bool {
        self.unproper_subnets.iter().any(|t| t == subnet_title)
    }
}

/// Connection settings for the JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct Settings {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub language: Option<String>,
    pub timeout_secs: u64,
    pub batch_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            url: None,
            api_key: None,
            username: None,
            password: None,
            language: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            batch_limit: DEFAULT_BATCH_LIMIT,
        }
    }
}

impl Settings {
    pub fn require_url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| Error::Config("no CMDB url set (CMDB_URL or \"url\")".into()))
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("no API key set (CMDB_APIKEY or \"key\")".into()))
    }
}

/// Layout of the optional JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigFile {
    pub url: Option<String>,
    pub key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub language: Option<String>,
    pub timeout: Option<u64>,
    pub limit_batch_requests: Option<usize>,
    pub fixip: FixipSection,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FixipSection {
    pub blacklisted_object_types: Option<Vec<String>>,
    pub unproper_subnets: Option<Vec<String>>,
    pub limit: Option<usize>,
}

/// Read and parse a JSON config file.
pub fn read_config_file(path: &str) -> Result<ConfigFile> {
    if !Path::new(path).exists() {
        return Err(Error::Config(format!("config file does not exist: {path}")));
    }
    log::info!("Reading config file: {path}");
    let json = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("error reading {path}: {e}")))?;
    let mut de = serde_json::Deserializer::from_str(&json);
    serde_path_to_error::deserialize(&mut de).map_err(|e| {
        Error::Config(format!(
            "error parsing {path}: path={} error={}",
            e.path(),
            e.inner()
        ))
    })
}

/// Merge defaults, config file and environment into settings.
///
/// `env` looks up a variable by name; the binary passes `std::env::var`,
/// tests pass a closure over a fixed map.
pub fn build_config<F>(file: ConfigFile, env: F) -> Result<(Settings, ReconciliationConfig)>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings {
        url: file.url,
        api_key: file.key,
        username: file.username,
        password: file.password,
        language: file.language,
        timeout_secs: file.timeout.unwrap_or(DEFAULT_TIMEOUT_SECS),
        batch_limit: file.limit_batch_requests.unwrap_or(DEFAULT_BATCH_LIMIT),
    };

    if let Some(v) = env("CMDB_URL") {
        settings.url = Some(v);
    }
    if let Some(v) = env("CMDB_APIKEY") {
        settings.api_key = Some(v);
    }
    if let Some(v) = env("CMDB_USERNAME") {
        settings.username = Some(v);
    }
    if let Some(v) = env("CMDB_PASSWORD") {
        settings.password = Some(v);
    }
    if let Some(v) = env("CMDB_LANGUAGE") {
        settings.language = Some(v);
    }
    if let Some(v) = env("CMDB_BATCH_LIMIT") {
        settings.batch_limit = v
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("CMDB_BATCH_LIMIT is not a number: {v}")))?;
    }

    let fixip = ReconciliationConfig {
        object_type_blacklist: file
            .fixip
            .blacklisted_object_types
            .unwrap_or_else(default_object_type_blacklist),
        unproper_subnets: file
            .fixip
            .unproper_subnets
            .unwrap_or_else(default_unproper_subnets),
        limit: file.fixip.limit.unwrap_or(DEFAULT_LIMIT),
        batch_limit: settings.batch_limit,
        dry_run: false,
    };

    log::debug!(
        "config: url={:?} batch_limit={} limit={} blacklist={} unproper={:?}",
        settings.url,
        settings.batch_limit,
        fixip.limit,
        fixip.object_type_blacklist.len(),
        fixip.unproper_subnets
    );

    Ok((settings, fixip))
}
