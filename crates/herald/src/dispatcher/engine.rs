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

//! The dispatch engine.
//!
//! Owns every state transition of queue entries. Two paths feed the
//! publisher:
//!
//! - **Real-time**: an enqueue claims its own URL and publishes it right away.
//! - **Batch**: [`DispatchEngine::dispatch_batch`] claims the oldest eligible
//!   entries and publishes them together, one batch at a time.
//!
//! Both paths go through the store's atomic claim, so a URL has at most one
//! dispatch in flight. Store and publisher errors are logged and recorded,
//! never returned to producers.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::{counter, gauge};
use tracing::{debug, error, info, warn};

use super::run_lock::RunLock;
use super::{BatchReport, BatchSummary, Resolution};
use crate::clock::{Clock, SystemClock};
use crate::config::{to_chrono, DispatchConfig};
use crate::error::StoreError;
use crate::health::{assess_health, project_metrics, Health, MetricsSnapshot};
use crate::models::{QueueEntry, UpsertMode};
use crate::publisher::{PublishOutcome, Publisher};
use crate::store::QueueStore;

/// Failure message for a claimed URL absent from a batch response.
pub const MISSING_RESULT_MESSAGE: &str = "missing result";

/// Failure message when the publisher gives no reason.
const UNSPECIFIED_FAILURE_MESSAGE: &str = "publish failed";

const OUTCOME_WRITE_ATTEMPTS: u32 = 2;

/// Coordinates the queue store and the publisher.
pub struct DispatchEngine {
    config: DispatchConfig,
    store: Arc<dyn QueueStore>,
    publisher: Arc<dyn Publisher>,
    clock: Arc<dyn Clock>,
    run_lock: RunLock,
}

impl DispatchEngine {
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn QueueStore>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self::with_clock(config, store, publisher, Arc::new(SystemClock))
    }

    /// Creates an engine that reads the time from `clock` for health,
    /// pruning and stale-claim recovery. Stores keep their own clock.
    pub fn with_clock(
        config: DispatchConfig,
        store: Arc<dyn QueueStore>,
        publisher: Arc<dyn Publisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            store,
            publisher,
            clock,
            run_lock: RunLock::new(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn QueueStore> {
        &self.store
    }

    /// Queues `url` for announcement. Fire-and-forget.
    ///
    /// Ignored when the engine is disabled or the URL is blank. With
    /// real-time dispatch on, the URL is published before this returns.
    pub async fn enqueue(&self, url: &str, subject_id: &str) {
        self.process_event(url, subject_id, UpsertMode::KeepExisting)
            .await;
    }

    /// Like [`enqueue`](Self::enqueue), but restarts the lifecycle of a URL
    /// that already succeeded or was dead-lettered.
    pub async fn enqueue_forced(&self, url: &str, subject_id: &str) {
        self.process_event(url, subject_id, UpsertMode::Force).await;
    }

    /// Handles a change event for a single URL.
    pub async fn handle_realtime_event(&self, url: &str, subject_id: &str) {
        self.process_event(url, subject_id, UpsertMode::KeepExisting)
            .await;
    }

    async fn process_event(&self, url: &str, subject_id: &str, mode: UpsertMode) {
        if !self.config.enabled() {
            debug!("Dispatch disabled, dropping {}", url);
            return;
        }
        let url = url.trim();
        if url.is_empty() {
            return;
        }

        let entry = match self
            .store
            .upsert(url, subject_id, mode, self.config.max_attempts())
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                error!("Failed to enqueue {}: {}", url, e);
                return;
            }
        };
        counter!("herald_enqueued_total").increment(1);
        debug!(
            "Enqueued {} (status {}, {} attempts)",
            entry.url, entry.status, entry.attempts
        );

        if !self.config.realtime_enabled() {
            return;
        }

        let claimed = match self
            .store
            .claim_url(url, &self.config.realtime_claim())
            .await
        {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!("{} not claimable now, leaving it to the batch", url);
                return;
            }
            Err(e) => {
                error!("Failed to claim {}: {}", url, e);
                return;
            }
        };

        let outcome = self.publisher.publish_one(&claimed.url).await;
        self.record_outcome(&claimed, &outcome).await;
    }

    /// Runs one batch dispatch.
    ///
    /// Returns [`BatchReport::Skipped`] without waiting if another batch is
    /// running. Every entry claimed by the batch is resolved to `Success` or
    /// `Failed` before this returns, unless the store rejects the outcome
    /// write twice. Such entries are counted as unresolved and released by
    /// the first batch that runs after `stale_after` has passed.
    pub async fn dispatch_batch(&self) -> BatchReport {
        if !self.config.enabled() {
            return BatchReport::Disabled;
        }
        let Some(_guard) = self.run_lock.try_acquire() else {
            counter!("herald_batch_skipped_total").increment(1);
            warn!("Batch dispatch already running, skipping");
            return BatchReport::Skipped;
        };

        // Claims whose outcome write was lost become retryable here.
        if let Err(e) = self.release_stale(self.config.stale_after()).await {
            error!("Failed to release stale claims: {}", e);
        }

        let claimed = match self.store.claim_pending(&self.config.batch_claim()).await {
            Ok(claimed) => claimed,
            Err(e) => {
                error!("Failed to claim batch: {}", e);
                return BatchReport::ClaimFailed;
            }
        };
        if claimed.is_empty() {
            debug!("No entries eligible for dispatch");
            return BatchReport::Idle;
        }

        info!("Dispatching batch of {} URLs", claimed.len());
        let urls: Vec<String> = claimed.iter().map(|entry| entry.url.clone()).collect();
        let mut summary = BatchSummary {
            claimed: claimed.len(),
            ..Default::default()
        };

        match self.publisher.publish_many(&urls).await {
            Ok(outcomes) => {
                let mut by_url: HashMap<&str, &PublishOutcome> = HashMap::new();
                for outcome in &outcomes {
                    by_url.entry(outcome.url.as_str()).or_insert(outcome);
                }
                for entry in &claimed {
                    let resolution = match by_url.get(entry.url.as_str()) {
                        Some(outcome) => self.record_outcome(entry, outcome).await,
                        None => {
                            let missing = PublishOutcome::failure(&entry.url, MISSING_RESULT_MESSAGE);
                            self.record_outcome(entry, &missing).await
                        }
                    };
                    summary.count(resolution);
                }
            }
            Err(e) => {
                error!("Batch publish failed: {}", e);
                let message = e.to_string();
                for entry in &claimed {
                    let failed = PublishOutcome::failure(&entry.url, message.clone());
                    let resolution = self.record_outcome(entry, &failed).await;
                    summary.count(resolution);
                }
            }
        }

        info!(
            "Batch complete: {} claimed, {} succeeded, {} failed, {} unresolved",
            summary.claimed, summary.succeeded, summary.failed, summary.unresolved
        );
        BatchReport::Completed(summary)
    }

    /// Applies a publish outcome to a claimed entry.
    ///
    /// The store write is tried twice. If both attempts fail the entry is
    /// left `InProgress` and reported as [`Resolution::Unresolved`].
    async fn record_outcome(&self, entry: &QueueEntry, outcome: &PublishOutcome) -> Resolution {
        if outcome.success {
            counter!("herald_publish_success_total").increment(1);
            debug!("Published {} (attempt {})", entry.url, entry.attempts);
            return match self.write_outcome(&entry.url, None).await {
                Ok(()) => Resolution::Succeeded,
                Err(e) => {
                    error!("Failed to record success of {}: {}", entry.url, e);
                    Resolution::Unresolved
                }
            };
        }

        counter!("herald_publish_failure_total").increment(1);
        let message = outcome
            .message
            .as_deref()
            .unwrap_or(UNSPECIFIED_FAILURE_MESSAGE);
        if entry.attempts >= self.config.max_attempts() {
            warn!(
                "Publishing {} failed on final attempt {}, giving up: {}",
                entry.url, entry.attempts, message
            );
        } else {
            warn!(
                "Publishing {} failed (attempt {}/{}): {}",
                entry.url,
                entry.attempts,
                self.config.max_attempts(),
                message
            );
        }
        match self.write_outcome(&entry.url, Some(message)).await {
            Ok(()) => Resolution::Failed,
            Err(e) => {
                error!("Failed to record failure of {}: {}", entry.url, e);
                Resolution::Unresolved
            }
        }
    }

    /// Marks `url` succeeded (`failure == None`) or failed, retrying once.
    async fn write_outcome(&self, url: &str, failure: Option<&str>) -> Result<(), StoreError> {
        let mut result = Ok(());
        for attempt in 1..=OUTCOME_WRITE_ATTEMPTS {
            result = match failure {
                None => self.store.mark_success(url).await,
                Some(message) => self.store.mark_failure(url, message).await,
            };
            match &result {
                Ok(()) => break,
                Err(e) if attempt < OUTCOME_WRITE_ATTEMPTS => {
                    warn!("Writing outcome of {} failed, retrying: {}", url, e);
                }
                Err(_) => {}
            }
        }
        result
    }

    /// Current queue metrics.
    pub async fn metrics_snapshot(&self) -> Result<MetricsSnapshot, StoreError> {
        let snapshot = self.store.snapshot(self.config.max_attempts()).await?;
        let metrics = project_metrics(&snapshot, &self.config);
        gauge!("herald_queue_pending").set(metrics.pending_count as f64);
        Ok(metrics)
    }

    /// Current health verdict. An unreadable store is reported as `DOWN`.
    pub async fn health(&self) -> Health {
        match self.store.snapshot(self.config.max_attempts()).await {
            Ok(snapshot) => assess_health(&snapshot, &self.config, self.clock.now()),
            Err(e) => {
                error!("Failed to read queue for health check: {}", e);
                Health::unavailable(self.config.enabled(), e)
            }
        }
    }

    /// Deletes succeeded and dead-lettered entries older than the
    /// configured history retention.
    pub async fn prune_history(&self) -> Result<usize, StoreError> {
        self.prune_older_than(self.config.history_retention()).await
    }

    /// Deletes succeeded and dead-lettered entries older than `age`.
    pub async fn prune_older_than(&self, age: std::time::Duration) -> Result<usize, StoreError> {
        let cutoff = self.cutoff(age);
        let removed = self
            .store
            .prune(cutoff, self.config.max_attempts())
            .await?;
        info!("Pruned {} finished entries older than {}", removed, cutoff);
        Ok(removed)
    }

    /// Fails entries left `InProgress` for longer than `age`, making them
    /// retryable again.
    pub async fn release_stale(&self, age: std::time::Duration) -> Result<usize, StoreError> {
        let released = self.store.release_stale(self.cutoff(age)).await?;
        if released > 0 {
            warn!("Released {} interrupted dispatches", released);
        }
        Ok(released)
    }

    fn cutoff(&self, age: std::time::Duration) -> chrono::DateTime<chrono::Utc> {
        let now = self.clock.now();
        now.checked_sub_signed(to_chrono(age))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC)
    }
}
