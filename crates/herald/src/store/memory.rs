/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! In-process queue store.
//!
//! Entries live in a sharded concurrent map, each behind its own mutex, so
//! the real-time and batch paths only contend when they touch the same URL.
//!
//! Lock order is always map shard, then entry. Upsert and prune hold the
//! shard while they touch an entry; paths that need several entries clone
//! the entry handles out of the map first and lock them one at a time
//! afterwards.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{QueueStore, INTERRUPTED_MESSAGE};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::models::{ClaimRequest, EntryStatus, QueueEntry, QueueSnapshot, UpsertMode};

type Slot = Arc<Mutex<QueueEntry>>;

/// Queue store held entirely in process memory.
pub struct MemoryQueueStore {
    entries: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
}

impl MemoryQueueStore {
    /// Creates an empty store using the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping entries with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    fn slot(&self, url: &str) -> Option<Slot> {
        self.entries.get(url).map(|slot| slot.value().clone())
    }

    fn slots(&self) -> Vec<Slot> {
        self.entries
            .iter()
            .map(|slot| slot.value().clone())
            .collect()
    }
}

impl Default for MemoryQueueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn upsert(
        &self,
        url: &str,
        subject_id: &str,
        mode: UpsertMode,
        max_attempts: u32,
    ) -> Result<QueueEntry, StoreError> {
        let now = self.clock.now();

        match self.entries.entry(url.to_string()) {
            Entry::Vacant(vacant) => {
                let entry = QueueEntry::new(url, subject_id, now);
                vacant.insert(Arc::new(Mutex::new(entry.clone())));
                debug!("Queued new entry for {}", url);
                Ok(entry)
            }
            // The shard stays locked while the entry is inspected so that a
            // concurrent prune cannot remove the slot being re-queued.
            Entry::Occupied(occupied) => {
                let mut entry = occupied.get().lock();
                if mode == UpsertMode::Force && entry.is_requeueable(max_attempts) {
                    debug!(
                        "Forced re-queue of {} (was {} after {} attempts)",
                        url, entry.status, entry.attempts
                    );
                    *entry = QueueEntry::new(url, subject_id, now);
                }
                let current = entry.clone();
                Ok(current)
            }
        }
    }

    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<QueueEntry>, StoreError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let now = self.clock.now();

        let mut candidates: Vec<(DateTime<Utc>, Slot)> = self
            .slots()
            .into_iter()
            .filter_map(|slot| {
                let enqueued_at = {
                    let entry = slot.lock();
                    if !entry.is_claimable(request, now) {
                        return None;
                    }
                    entry.enqueued_at
                };
                Some((enqueued_at, slot))
            })
            .collect();
        candidates.sort_by_key(|(enqueued_at, _)| *enqueued_at);

        let mut claimed = Vec::with_capacity(request.limit.min(candidates.len()));
        for (_, slot) in candidates {
            if claimed.len() >= request.limit {
                break;
            }
            // Another claimer may have taken it since the scan; re-check under the lock.
            let mut entry = slot.lock();
            if entry.is_claimable(request, now) {
                entry.apply_claim(now);
                claimed.push(entry.clone());
            }
        }

        debug!("Claimed {} entries", claimed.len());
        Ok(claimed)
    }

    async fn claim_url(
        &self,
        url: &str,
        request: &ClaimRequest,
    ) -> Result<Option<QueueEntry>, StoreError> {
        let Some(slot) = self.slot(url) else {
            return Ok(None);
        };
        let now = self.clock.now();
        let mut entry = slot.lock();
        if !entry.is_claimable(request, now) {
            return Ok(None);
        }
        entry.apply_claim(now);
        Ok(Some(entry.clone()))
    }

    async fn mark_success(&self, url: &str) -> Result<(), StoreError> {
        if let Some(slot) = self.slot(url) {
            let now = self.clock.now();
            if slot.lock().apply_success(now) {
                debug!("Marked {} as indexed", url);
            }
        }
        Ok(())
    }

    async fn mark_failure(&self, url: &str, message: &str) -> Result<(), StoreError> {
        if let Some(slot) = self.slot(url) {
            let now = self.clock.now();
            if slot.lock().apply_failure(message, now) {
                debug!("Marked {} as failed: {}", url, message);
            }
        }
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, StoreError> {
        Ok(self.slot(url).map(|slot| slot.lock().clone()))
    }

    async fn snapshot(&self, max_attempts: u32) -> Result<QueueSnapshot, StoreError> {
        let mut snapshot = QueueSnapshot::default();
        for slot in self.slots() {
            snapshot.record(&slot.lock(), max_attempts);
        }
        Ok(snapshot)
    }

    async fn size(&self) -> Result<usize, StoreError> {
        Ok(self.entries.len())
    }

    async fn prune(&self, cutoff: DateTime<Utc>, max_attempts: u32) -> Result<usize, StoreError> {
        let before = self.entries.len();
        self.entries.retain(|_, slot| {
            let entry = slot.lock();
            let expired = match entry.status {
                EntryStatus::Success => entry.last_success_at.is_some_and(|at| at < cutoff),
                EntryStatus::Failed if entry.attempts >= max_attempts => {
                    entry.last_failure_at.is_some_and(|at| at < cutoff)
                }
                _ => false,
            };
            !expired
        });
        Ok(before.saturating_sub(self.entries.len()))
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = self.clock.now();
        let mut released = 0;
        for slot in self.slots() {
            let mut entry = slot.lock();
            let stale = entry.status == EntryStatus::InProgress
                && entry.last_attempt_at.is_some_and(|at| at < cutoff);
            if stale && entry.apply_failure(INTERRUPTED_MESSAGE, now) {
                released += 1;
            }
        }
        Ok(released)
    }
}
