//! Batch update dispatcher.
//!
//! Sends the corrective updates of a window in batches of bounded size, or
//! only reports them in dry-run mode.

use crate::cmdb::{CategoryUpdate, CmdbApi};
use crate::error::Result;
use crate::models::RunStatistics;
use colored::Colorize;
use itertools::Itertools;

pub struct Dispatcher<'a, A: CmdbApi> {
    api: &'a A,
    dry_run: bool,
    /// Max updates per request, 0 = everything in one request.
    batch_limit: usize,
}

impl<'a, A: CmdbApi> Dispatcher<'a, A> {
    pub fn new(api: &'a A, dry_run: bool, batch_limit: usize) -> Dispatcher<'a, A> {
        Dispatcher {
            api,
            dry_run,
            batch_limit,
        }
    }

    /// Flush `updates`. Returns the number of write requests issued.
    ///
    /// `fixed` grows by the number of updates actually sent. A failing
    /// request is not retried; the error aborts the run.
    pub fn dispatch(&self, updates: &[CategoryUpdate], stats: &mut RunStatistics) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }

        if self.dry_run {
            for u in updates {
                log::info!(
                    "{dry} would bind entry #{} of object #{} to subnet {}",
                    u.entry_id,
                    u.object_id,
                    u.data.get("net").map(|v| v.to_string()).unwrap_or_default(),
                    dry = "dry-run".cyan()
                );
            }
            return Ok(0);
        }

        let chunk_size = if self.batch_limit == 0 {
            updates.len()
        } else {
            self.batch_limit
        };

        let mut requests = 0;
        for batch in updates.chunks(chunk_size) {
            log::debug!(
                "update batch of {} entries: [{}]",
                batch.len(),
                batch.iter().map(|u| u.entry_id).join(", ")
            );
            self.api.batch_update_category(batch)?;
            stats.fixed += batch.len();
            requests += 1;
        }
        log::info!("Sent {} update(s) in {requests} request(s)", updates.len());
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmdb::MemoryCmdb;
    use crate::config::CATEGORY_IP;
    use serde_json::json;

    fn cmdb() -> MemoryCmdb {
        MemoryCmdb::from_json(
            r#"{"categories": {"C__CATG__IP": {
                "1": [{"id": 11}], "2": [{"id": 21}], "3": [{"id": 31}]
            }}}"#,
        )
        .unwrap()
    }

    fn updates() -> Vec<CategoryUpdate> {
        [(1, 11), (2, 21), (3, 31)]
            .iter()
            .map(|(obj, entry)| {
                let mut data = serde_json::Map::new();
                data.insert("net".to_string(), json!(110));
                CategoryUpdate {
                    object_id: *obj,
                    category: CATEGORY_IP.to_string(),
                    entry_id: *entry,
                    data,
                }
            })
            .collect()
    }

    #[test]
    fn test_dispatch_in_batches() {
        let api = cmdb();
        let mut stats = RunStatistics::default();
        let requests = Dispatcher::new(&api, false, 2)
            .dispatch(&updates(), &mut stats)
            .unwrap();
        assert_eq!(requests, 2);
        assert_eq!(stats.fixed, 3);
        let sizes: Vec<usize> = api.update_batches().iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 1]);
    }

    #[test]
    fn test_dispatch_unbounded_batch() {
        let api = cmdb();
        let mut stats = RunStatistics::default();
        let requests = Dispatcher::new(&api, false, 0)
            .dispatch(&updates(), &mut stats)
            .unwrap();
        assert_eq!(requests, 1);
        assert_eq!(stats.fixed, 3);
    }

    #[test]
    fn test_dry_run_sends_nothing() {
        let api = cmdb();
        let mut stats = RunStatistics::default();
        let requests = Dispatcher::new(&api, true, 2)
            .dispatch(&updates(), &mut stats)
            .unwrap();
        assert_eq!(requests, 0);
        assert_eq!(stats.fixed, 0);
        assert_eq!(api.update_request_count(), 0);
    }

    #[test]
    fn test_failed_batch_stops_dispatch() {
        let api = cmdb();
        let mut stats = RunStatistics::default();
        let mut bad = updates();
        bad[2].entry_id = 99;
        let result = Dispatcher::new(&api, false, 2).dispatch(&bad, &mut stats);
        assert!(result.is_err());
        // first batch went through before the failure
        assert_eq!(stats.fixed, 2);
    }
}
