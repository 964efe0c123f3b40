//! JSON-RPC client for a live CMDB.
//!
//! Requests are plain JSON-RPC 2.0 posted over HTTP. Batched calls are
//! split into chunks of at most `batch_limit` sub-requests and the answers
//! are put back into request order by id. Failures are never retried.

use super::api::{CategoryEntry, CategoryUpdate, CmdbApi, ObjectFilter, ObjectSummary, ObjectType};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::attribute_id;
use colored::Colorize;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cell::Cell;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Serialize, Debug)]
struct Request<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: u64,
}

#[derive(Deserialize, Debug)]
struct Response {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
    #[serde(default)]
    id: Value,
}

#[derive(Deserialize, Debug)]
struct RpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Blocking JSON-RPC client.
pub struct JsonRpcClient {
    http: Client,
    url: String,
    api_key: String,
    language: Option<String>,
    batch_limit: usize,
    next_id: Cell<u64>,
}

impl JsonRpcClient {
    /// Build a client from connection settings. Fails if url or key is missing.
    pub fn new(settings: &Settings) -> Result<JsonRpcClient> {
        let url = settings.require_url()?.to_string();
        let api_key = settings.require_api_key()?.to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let (Some(user), Some(pass)) = (&settings.username, &settings.password) {
            headers.insert(
                HeaderName::from_static("x-rpc-auth-username"),
                header_value(user)?,
            );
            headers.insert(
                HeaderName::from_static("x-rpc-auth-password"),
                header_value(pass)?,
            );
        }

        let http = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        log::debug!("JSON-RPC endpoint {url} batch_limit={}", settings.batch_limit);

        Ok(JsonRpcClient {
            http,
            url,
            api_key,
            language: settings.language.clone(),
            batch_limit: settings.batch_limit,
            next_id: Cell::new(1),
        })
    }

    fn take_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Add credentials and language to the method parameters.
    fn with_auth(&self, mut params: Map<String, Value>) -> Value {
        params.insert("apikey".to_string(), Value::from(self.api_key.as_str()));
        if let Some(lang) = &self.language {
            params.insert("language".to_string(), Value::from(lang.as_str()));
        }
        Value::Object(params)
    }

    fn post<T: Serialize + ?Sized>(&self, method: &str, body: &T) -> Result<String> {
        let response = self.http.post(&self.url).json(body).send().map_err(|e| {
            log::warn!("{failed} to call {method}", failed = "failed".on_red());
            e
        })?;
        let text = response.error_for_status()?.text()?;
        log::trace!("{method} response.len()={}", text.len());
        Ok(text)
    }

    /// Single call.
    fn call(&self, method: &str, params: Map<String, Value>) -> Result<Value> {
        let request = Request {
            jsonrpc: "2.0",
            method,
            params: self.with_auth(params),
            id: self.take_id(),
        };
        log::debug!("call({method})");
        let text = self.post(method, &request)?;
        let response: Response = decode_str(method, &text)?;
        unwrap_response(method, response)
    }

    /// Batched call of one method with many parameter sets.
    ///
    /// Results are returned in request order. Sub-requests the server did
    /// not answer are missing from the result, so it can be shorter than
    /// `params`.
    fn call_batch(&self, method: &str, params: Vec<Map<String, Value>>) -> Result<Vec<Value>> {
        let size = chunk_size(self.batch_limit, params.len());
        let mut results = Vec::with_capacity(params.len());

        for (block, chunk) in params.chunks(size).enumerate() {
            let requests: Vec<Request> = chunk
                .iter()
                .map(|p| Request {
                    jsonrpc: "2.0",
                    method,
                    params: self.with_auth(p.clone()),
                    id: self.take_id(),
                })
                .collect();
            let ids: Vec<u64> = requests.iter().map(|r| r.id).collect();

            log::debug!(
                "batch({method}) block#{block} with {} sub-requests",
                requests.len()
            );
            let text = self.post(method, &requests)?;
            let responses: Vec<Response> = decode_str(method, &text)?;
            results.extend(order_responses(method, &ids, responses)?);
        }

        Ok(results)
    }
}

/// Sub-requests per batch request, `0` puts everything in one request.
fn chunk_size(batch_limit: usize, total: usize) -> usize {
    if batch_limit == 0 {
        total.max(1)
    } else {
        batch_limit
    }
}

/// Put the answers of one batch request into the order of `ids`. Answers
/// without a usable id are dropped, as are requests without an answer; for
/// a repeated id the last answer wins.
fn order_responses(method: &str, ids: &[u64], responses: Vec<Response>) -> Result<Vec<Value>> {
    let mut by_id: HashMap<u64, Response> = HashMap::new();
    for r in responses {
        match attribute_id(&r.id) {
            Some(id) => {
                if by_id.insert(id, r).is_some() {
                    log::warn!("{method}: duplicate response for sub-request #{id}");
                }
            }
            None => log::warn!("{method}: response without usable id: {:?}", r.id),
        }
    }

    let mut results = Vec::with_capacity(ids.len());
    for id in ids {
        match by_id.remove(id) {
            Some(r) => results.push(unwrap_response(method, r)?),
            None => log::warn!("{method}: no response for sub-request #{id}"),
        }
    }
    Ok(results)
}

/// Every update must be answered, and none may report `success: false`.
fn confirm_updates(method: &str, sent: usize, results: &[Value]) -> Result<()> {
    if results.len() != sent {
        return Err(Error::Consistency(format!(
            "sent {sent} updates but {} were confirmed",
            results.len()
        )));
    }
    for result in results {
        if result.get("success").and_then(Value::as_bool) == Some(false) {
            let message = result
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("update rejected")
                .to_string();
            return Err(Error::Api {
                method: method.to_string(),
                code: 0,
                message,
            });
        }
    }
    Ok(())
}

fn header_value(v: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(v).map_err(|e| Error::Config(format!("invalid header value: {e}")))
}

fn unwrap_response(method: &str, response: Response) -> Result<Value> {
    if let Some(err) = response.error {
        log::error!(
            "{method} failed: code={} message={} data={:?}",
            err.code,
            err.message,
            err.data
        );
        return Err(Error::Api {
            method: method.to_string(),
            code: err.code,
            message: err.message,
        });
    }
    Ok(response.result.unwrap_or(Value::Null))
}

fn decode_str<T: DeserializeOwned>(method: &str, text: &str) -> Result<T> {
    let mut de = serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(&mut de).map_err(|e| {
        log::error!("OUTPUT START:\n\n{text}\n\nOUTPUT END\n");
        Error::Decode {
            method: method.to_string(),
            path: e.path().to_string(),
            source: e.into_inner(),
        }
    })
}

fn decode_value<T: DeserializeOwned>(method: &str, value: Value) -> Result<T> {
    serde_path_to_error::deserialize(value).map_err(|e| Error::Decode {
        method: method.to_string(),
        path: e.path().to_string(),
        source: e.into_inner(),
    })
}

/// Parameters of `cmdb.category.update` for one entry.
fn update_params(update: &CategoryUpdate) -> Map<String, Value> {
    let mut data = update.data.clone();
    data.insert("id".to_string(), Value::from(update.entry_id));
    let mut params = Map::new();
    params.insert("objID".to_string(), Value::from(update.object_id));
    params.insert("category".to_string(), Value::from(update.category.as_str()));
    params.insert("data".to_string(), Value::Object(data));
    params
}

/// Parameters of `cmdb.objects.read`. The API takes the page as "offset,limit".
fn objects_params(filter: &ObjectFilter, limit: usize, offset: usize) -> Map<String, Value> {
    let mut params = Map::new();
    params.insert("filter".to_string(), json!(filter));
    if limit > 0 {
        params.insert("limit".to_string(), Value::from(format!("{offset},{limit}")));
    }
    params.insert("order_by".to_string(), Value::from("id"));
    params.insert("sort".to_string(), Value::from("ASC"));
    params
}

impl CmdbApi for JsonRpcClient {
    fn read_object_types(&self) -> Result<Vec<ObjectType>> {
        const METHOD: &str = "cmdb.object_types.read";
        let result = self.call(METHOD, Map::new())?;
        decode_value(METHOD, result)
    }

    fn read_objects(
        &self,
        filter: &ObjectFilter,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ObjectSummary>> {
        const METHOD: &str = "cmdb.objects.read";
        let result = self.call(METHOD, objects_params(filter, limit, offset))?;
        decode_value(METHOD, result)
    }

    fn batch_read_category(
        &self,
        object_ids: &[u64],
        category: &str,
    ) -> Result<Vec<Vec<CategoryEntry>>> {
        const METHOD: &str = "cmdb.category.read";
        if object_ids.is_empty() {
            return Ok(vec![]);
        }
        let params = object_ids
            .iter()
            .map(|id| {
                let mut p = Map::new();
                p.insert("objID".to_string(), Value::from(*id));
                p.insert("category".to_string(), Value::from(category));
                p
            })
            .collect();
        self.call_batch(METHOD, params)?
            .into_iter()
            .map(|v| decode_value(METHOD, v))
            .collect()
    }

    fn batch_update_category(&self, updates: &[CategoryUpdate]) -> Result<()> {
        const METHOD: &str = "cmdb.category.update";
        if updates.is_empty() {
            return Ok(());
        }
        let params = updates.iter().map(update_params).collect();
        let results = self.call_batch(METHOD, params)?;
        confirm_updates(METHOD, updates.len(), &results)
    }
}
