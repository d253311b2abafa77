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

//! Queue Entry Model
//!
//! One entry exists per distinct target URL. Entries move through
//! `Pending -> InProgress -> Success | Failed`, with `Failed` entries cycling
//! back through `InProgress` until their attempt budget is spent.
//!
//! The transition helpers on [`QueueEntry`] are the single definition of the
//! claim predicate and outcome bookkeeping; backends either call them under a
//! per-entry lock or mirror them in SQL.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryStatus {
    /// Waiting for its first dispatch.
    Pending,
    /// Claimed by a dispatcher; exactly one dispatch is in flight.
    InProgress,
    /// The indexing API accepted the notification. Terminal.
    Success,
    /// The last dispatch failed; retried while the attempt budget allows.
    Failed,
}

impl EntryStatus {
    /// Returns the storage representation of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "Pending",
            EntryStatus::InProgress => "InProgress",
            EntryStatus::Success => "Success",
            EntryStatus::Failed => "Failed",
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(EntryStatus::Pending),
            "InProgress" => Ok(EntryStatus::InProgress),
            "Success" => Ok(EntryStatus::Success),
            "Failed" => Ok(EntryStatus::Failed),
            other => Err(format!("unknown entry status '{}'", other)),
        }
    }
}

/// A URL waiting to be (or already) announced to the indexing API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Target URL; the identity of the entry
    pub url: String,
    /// Correlation data supplied by the producer (e.g. a product id)
    pub subject_id: String,
    /// Current lifecycle state
    pub status: EntryStatus,
    /// Number of claims consumed by this entry
    pub attempts: u32,
    /// When this lifecycle started
    pub enqueued_at: DateTime<Utc>,
    /// When the entry was last claimed
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the entry last reached `Success`
    pub last_success_at: Option<DateTime<Utc>>,
    /// When the entry last reached `Failed`
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Message recorded by the last failure
    pub last_error: Option<String>,
}

impl QueueEntry {
    /// Creates a fresh `Pending` entry with no attempts.
    pub fn new(url: impl Into<String>, subject_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            url: url.into(),
            subject_id: subject_id.into(),
            status: EntryStatus::Pending,
            attempts: 0,
            enqueued_at: now,
            last_attempt_at: None,
            last_success_at: None,
            last_failure_at: None,
            last_error: None,
        }
    }

    /// Whether the entry failed and has no attempts left.
    pub fn is_dead_lettered(&self, max_attempts: u32) -> bool {
        self.status == EntryStatus::Failed && self.attempts >= max_attempts
    }

    /// Whether a forced re-queue may start a new lifecycle for this entry.
    ///
    /// Only terminal entries qualify; anything queued or in flight is left alone.
    pub fn is_requeueable(&self, max_attempts: u32) -> bool {
        self.status == EntryStatus::Success || self.is_dead_lettered(max_attempts)
    }

    /// The claim predicate.
    ///
    /// `Pending` entries are claimable immediately. `Failed` entries are
    /// claimable once `last_attempt_at + retry_delay` has passed. Both
    /// require `attempts < max_attempts`.
    pub fn is_claimable(&self, request: &ClaimRequest, now: DateTime<Utc>) -> bool {
        if self.attempts >= request.max_attempts {
            return false;
        }
        match self.status {
            EntryStatus::Pending => true,
            EntryStatus::Failed => match self.last_attempt_at {
                Some(last) => last
                    .checked_add_signed(request.retry_delay)
                    .is_some_and(|eligible_at| eligible_at <= now),
                None => true,
            },
            EntryStatus::InProgress | EntryStatus::Success => false,
        }
    }

    /// Transitions the entry to `InProgress`, consuming one attempt.
    pub fn apply_claim(&mut self, now: DateTime<Utc>) {
        self.status = EntryStatus::InProgress;
        self.attempts += 1;
        self.last_attempt_at = Some(now);
    }

    /// Records a successful dispatch. Returns `false` if the entry was already `Success`.
    pub fn apply_success(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == EntryStatus::Success {
            return false;
        }
        self.status = EntryStatus::Success;
        self.last_success_at = Some(now);
        self.last_error = None;
        true
    }

    /// Records a failed dispatch. Returns `false` if the entry was already `Success`.
    pub fn apply_failure(&mut self, message: &str, now: DateTime<Utc>) -> bool {
        if self.status == EntryStatus::Success {
            return false;
        }
        self.status = EntryStatus::Failed;
        self.last_failure_at = Some(now);
        self.last_error = Some(message.to_string());
        true
    }
}

/// How [`QueueStore::upsert`](crate::store::QueueStore::upsert) treats an existing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpsertMode {
    /// Keep any existing entry unchanged.
    #[default]
    KeepExisting,
    /// Start a new lifecycle if the existing entry is terminal
    /// (`Success` or dead-lettered).
    Force,
}

/// Parameters of a claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimRequest {
    /// Maximum number of entries to claim
    pub limit: usize,
    /// Entries with this many attempts are no longer claimable
    pub max_attempts: u32,
    /// Minimum time between two attempts on a `Failed` entry
    pub retry_delay: Duration,
}

/// Aggregate view of the store used by the metrics and health projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    /// Total tracked entries
    pub total: usize,
    /// Entries in `Pending`
    pub pending: usize,
    /// Entries in `InProgress`
    pub in_progress: usize,
    /// Entries in `Success`
    pub succeeded: usize,
    /// Entries in `Failed` that can still be retried
    pub failed_retryable: usize,
    /// Entries in `Failed` with no attempts left
    pub dead_lettered: usize,
    /// Latest `last_success_at` across entries
    pub last_success_at: Option<DateTime<Utc>>,
    /// Latest `last_failure_at` across entries
    pub last_failure_at: Option<DateTime<Utc>>,
    /// Oldest `enqueued_at` among `Pending`/`InProgress` entries
    pub oldest_pending_at: Option<DateTime<Utc>>,
}

impl QueueSnapshot {
    /// Folds one entry into the aggregate.
    pub fn record(&mut self, entry: &QueueEntry, max_attempts: u32) {
        self.total += 1;
        match entry.status {
            EntryStatus::Pending => self.pending += 1,
            EntryStatus::InProgress => self.in_progress += 1,
            EntryStatus::Success => self.succeeded += 1,
            EntryStatus::Failed if entry.attempts >= max_attempts => self.dead_lettered += 1,
            EntryStatus::Failed => self.failed_retryable += 1,
        }
        if matches!(entry.status, EntryStatus::Pending | EntryStatus::InProgress) {
            self.oldest_pending_at = min_time(self.oldest_pending_at, Some(entry.enqueued_at));
        }
        self.last_success_at = max_time(self.last_success_at, entry.last_success_at);
        self.last_failure_at = max_time(self.last_failure_at, entry.last_failure_at);
    }
}

fn max_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_time(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}
