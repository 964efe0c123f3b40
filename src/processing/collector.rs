//! Object and IP collector.
//!
//! Pages through all CMDB objects and yields one window of qualifying
//! objects per page. A window can be empty while more pages remain; the
//! sequence ends only when a page comes back shorter than the limit, or
//! after the single page of an unlimited read.

use crate::cmdb::{CmdbApi, ObjectFilter, ObjectSummary};
use crate::config::{ReconciliationConfig, CATEGORY_IP, STATUS_NORMAL};
use crate::error::{Error, Result};
use crate::models::{IpAddressEntry, NetworkObject};
use std::collections::HashSet;

/// Lazy, finite sequence of object windows. Not restartable.
pub struct ObjectWindows<'a, A: CmdbApi> {
    api: &'a A,
    limit: usize,
    offset: usize,
    blacklist: HashSet<u64>,
    done: bool,
    window: usize,
}

impl<'a, A: CmdbApi> ObjectWindows<'a, A> {
    /// Resolve the object type blacklist and position at the first page.
    pub fn new(api: &'a A, config: &ReconciliationConfig) -> Result<ObjectWindows<'a, A>> {
        let types = api.read_object_types()?;
        let mut blacklist = HashSet::new();
        for constant in &config.object_type_blacklist {
            match types.iter().find(|t| &t.constant == constant) {
                Some(t) => {
                    blacklist.insert(t.id);
                }
                None => log::warn!("Unknown object type in blacklist: {constant}"),
            }
        }
        log::debug!("blacklisted object type ids: {:?}", blacklist);

        Ok(ObjectWindows {
            api,
            limit: config.limit,
            offset: 0,
            blacklist,
            done: false,
            window: 0,
        })
    }

    /// Number of windows produced so far.
    pub fn windows_read(&self) -> usize {
        self.window
    }

    fn qualifies(&self, object: &ObjectSummary) -> bool {
        object.status == STATUS_NORMAL && !self.blacklist.contains(&object.type_id)
    }

    fn fetch_window(&mut self) -> Result<Vec<NetworkObject>> {
        let filter = ObjectFilter::all().with_status(STATUS_NORMAL);
        let page = self.api.read_objects(&filter, self.limit, self.offset)?;

        if self.limit == 0 || page.len() < self.limit {
            self.done = true;
        } else {
            self.offset += self.limit;
        }

        let survivors: Vec<ObjectSummary> =
            page.iter().filter(|o| self.qualifies(o)).cloned().collect();

        log::info!(
            "window#{:<3} page={:3} qualified={:3} offset={}",
            self.window,
            page.len(),
            survivors.len(),
            self.offset
        );

        if survivors.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<u64> = survivors.iter().map(|o| o.id).collect();
        let entries = self.api.batch_read_category(&ids, CATEGORY_IP)?;
        if entries.len() != ids.len() {
            return Err(Error::Consistency(format!(
                "requested IP addresses of {} objects but received {}",
                ids.len(),
                entries.len()
            )));
        }

        let mut objects = Vec::with_capacity(survivors.len());
        for (object, raw_entries) in survivors.into_iter().zip(entries) {
            let ip_entries: Vec<IpAddressEntry> = raw_entries
                .into_iter()
                .filter_map(|raw| {
                    let entry = IpAddressEntry::from_raw(raw);
                    if entry.is_none() {
                        log::warn!(
                            "IP entry without id on '{}' #{} skipped",
                            object.title,
                            object.id
                        );
                    }
                    entry
                })
                .filter(IpAddressEntry::has_address)
                .collect();
            if ip_entries.is_empty() {
                log::trace!("object '{}' #{} has no IP address", object.title, object.id);
                continue;
            }
            objects.push(NetworkObject {
                id: object.id,
                title: object.title,
                type_title: object.type_title,
                ip_entries,
            });
        }
        Ok(objects)
    }
}

impl<'a, A: CmdbApi> Iterator for ObjectWindows<'a, A> {
    type Item = Result<Vec<NetworkObject>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let result = self.fetch_window();
        if result.is_err() {
            self.done = true;
        }
        self.window += 1;
        Some(result)
    }
}
