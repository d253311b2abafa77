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

//! Metrics and health projection.
//!
//! Both views are pure functions of a [`QueueSnapshot`], the engine
//! configuration and the current time.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::{json, Value};

use crate::config::{to_chrono, DispatchConfig};
use crate::models::QueueSnapshot;

/// Operator-facing counters of the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub enabled: bool,
    pub total_queued: usize,
    /// `Pending` plus `InProgress` entries
    pub pending_count: usize,
    pub dead_letter_count: usize,
    pub indexed_count: usize,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub batch_size: usize,
    #[serde(serialize_with = "serialize_secs")]
    pub retry_delay: Duration,
    pub max_attempts: u32,
    pub realtime_enabled: bool,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_secs())
}

/// Coarse health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    Up,
    Down,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Up => f.write_str("UP"),
            HealthStatus::Down => f.write_str("DOWN"),
        }
    }
}

/// Health verdict with supporting details.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Health {
    pub status: HealthStatus,
    pub details: BTreeMap<String, Value>,
}

impl Health {
    pub fn is_up(&self) -> bool {
        self.status == HealthStatus::Up
    }

    /// A `DOWN` verdict for when the queue could not be inspected at all.
    pub fn unavailable(enabled: bool, error: impl fmt::Display) -> Self {
        let mut details = BTreeMap::new();
        details.insert("enabled".to_string(), json!(enabled));
        details.insert("error".to_string(), json!(error.to_string()));
        Self {
            status: HealthStatus::Down,
            details,
        }
    }
}

/// Projects the metrics view.
pub fn project_metrics(snapshot: &QueueSnapshot, config: &DispatchConfig) -> MetricsSnapshot {
    MetricsSnapshot {
        enabled: config.enabled(),
        total_queued: snapshot.total,
        pending_count: snapshot.pending + snapshot.in_progress,
        dead_letter_count: snapshot.dead_lettered,
        indexed_count: snapshot.succeeded,
        last_success_at: snapshot.last_success_at,
        last_failure_at: snapshot.last_failure_at,
        batch_size: config.batch_size(),
        retry_delay: config.retry_delay(),
        max_attempts: config.max_attempts(),
        realtime_enabled: config.realtime_enabled(),
    }
}

/// Projects the health view.
///
/// `DOWN` when more than `max_queue_size` entries are pending, or when work
/// is pending and nothing succeeded within `max_success_age`. Without any
/// success on record, the age is measured from the oldest pending entry.
/// A disabled engine is always `UP`.
pub fn assess_health(
    snapshot: &QueueSnapshot,
    config: &DispatchConfig,
    now: DateTime<Utc>,
) -> Health {
    let pending = snapshot.pending + snapshot.in_progress;

    let mut details = BTreeMap::new();
    details.insert("enabled".to_string(), json!(config.enabled()));
    if !config.enabled() {
        return Health {
            status: HealthStatus::Up,
            details,
        };
    }

    details.insert("pending_count".to_string(), json!(pending));
    details.insert("dead_letter_count".to_string(), json!(snapshot.dead_lettered));
    details.insert("max_queue_size".to_string(), json!(config.max_queue_size()));
    details.insert("last_success_at".to_string(), json!(snapshot.last_success_at));

    let reason = if pending > config.max_queue_size() {
        Some(format!(
            "{} pending entries exceed the limit of {}",
            pending,
            config.max_queue_size()
        ))
    } else if pending > 0 {
        let max_age = to_chrono(config.max_success_age());
        match (snapshot.last_success_at, snapshot.oldest_pending_at) {
            (Some(last), _) if now.signed_duration_since(last) > max_age => Some(format!(
                "last success at {} is older than {}s",
                last,
                config.max_success_age().as_secs()
            )),
            (None, Some(oldest)) if now.signed_duration_since(oldest) > max_age => Some(format!(
                "no success since the oldest pending entry at {}",
                oldest
            )),
            _ => None,
        }
    } else {
        None
    };

    let status = match reason {
        Some(reason) => {
            details.insert("reason".to_string(), json!(reason));
            HealthStatus::Down
        }
        None => HealthStatus::Up,
    };
    Health { status, details }
}
