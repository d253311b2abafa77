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

//! End-to-end lifecycle scenarios over the in-memory store.

use chrono::Duration;
use herald::{BatchReport, BatchSummary, Clock, EntryStatus};

use crate::fixtures::{batch_only, Harness};

/// A URL enqueued for batch dispatch succeeds on its first attempt.
#[tokio::test]
async fn test_batch_success_on_first_attempt() {
    let h = Harness::memory(batch_only().build().unwrap());

    h.engine.enqueue("https://x/p/1", "1").await;
    let report = h.engine.dispatch_batch().await;

    assert_eq!(
        report,
        BatchReport::Completed(BatchSummary {
            claimed: 1,
            succeeded: 1,
            failed: 0,
            unresolved: 0
        })
    );
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.last_success_at, Some(h.clock.now()));
    assert_eq!(entry.last_error, None);
}

/// A URL that always fails is dead-lettered after exactly `max_attempts`
/// and never offered to the publisher again.
#[tokio::test]
async fn test_always_failing_url_is_dead_lettered() {
    let h = Harness::memory(
        batch_only()
            .max_attempts(3)
            .retry_delay(std::time::Duration::from_secs(60))
            .build()
            .unwrap(),
    );
    h.publisher.always_fail("https://x/p/2");
    h.engine.enqueue("https://x/p/2", "2").await;

    for attempt in 1..=3 {
        let report = h.engine.dispatch_batch().await;
        assert_eq!(
            report,
            BatchReport::Completed(BatchSummary {
                claimed: 1,
                succeeded: 0,
                failed: 1,
                unresolved: 0
            }),
            "attempt {}",
            attempt
        );
        let entry = h.entry("https://x/p/2").await;
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.attempts, attempt);
        h.advance(Duration::minutes(1));
    }

    // Fourth claim: the entry is no longer eligible.
    h.advance(Duration::days(1));
    assert_eq!(h.engine.dispatch_batch().await, BatchReport::Idle);
    assert_eq!(h.publisher.publish_count("https://x/p/2"), 3);

    let entry = h.entry("https://x/p/2").await;
    assert_eq!(entry.attempts, 3);
    assert_eq!(
        entry.last_error.as_deref(),
        Some("HTTP 403: permission denied")
    );

    let metrics = h.engine.metrics_snapshot().await.unwrap();
    assert_eq!(metrics.dead_letter_count, 1);
    assert_eq!(metrics.pending_count, 0);
}

/// A real-time failure is picked up by a later batch once the retry delay
/// has passed.
#[tokio::test]
async fn test_realtime_failure_then_batch_success() {
    let h = Harness::memory(
        batch_only()
            .realtime_enabled(true)
            .retry_delay(std::time::Duration::from_secs(30 * 60))
            .build()
            .unwrap(),
    );
    h.publisher.fail_times("https://x/p/3", 1);

    h.engine.enqueue("https://x/p/3", "3").await;
    let entry = h.entry("https://x/p/3").await;
    assert_eq!(entry.status, EntryStatus::Failed);
    assert_eq!(entry.attempts, 1);
    assert_eq!(
        entry.last_error.as_deref(),
        Some("HTTP 503: backend unavailable")
    );

    // Still inside the retry delay.
    h.advance(Duration::minutes(29));
    assert_eq!(h.engine.dispatch_batch().await, BatchReport::Idle);

    h.advance(Duration::minutes(1));
    assert!(matches!(
        h.engine.dispatch_batch().await,
        BatchReport::Completed(BatchSummary { succeeded: 1, .. })
    ));
    let entry = h.entry("https://x/p/3").await;
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 2);
    assert_eq!(entry.last_error, None);
}

/// Enqueuing an already known URL changes nothing.
#[tokio::test]
async fn test_enqueue_is_idempotent() {
    let h = Harness::memory(batch_only().build().unwrap());

    h.engine.enqueue("https://x/p/1", "1").await;
    let first = h.entry("https://x/p/1").await;
    h.advance(Duration::minutes(5));
    h.engine.enqueue("https://x/p/1", "1").await;
    h.engine.enqueue("https://x/p/1", "other").await;

    assert_eq!(h.store.size().await.unwrap(), 1);
    assert_eq!(h.entry("https://x/p/1").await, first);
}

/// A succeeded URL is not re-announced unless the re-queue is forced.
#[tokio::test]
async fn test_forced_enqueue_restarts_lifecycle_after_success() {
    let h = Harness::memory(batch_only().build().unwrap());
    h.engine.enqueue("https://x/p/1", "1").await;
    h.engine.dispatch_batch().await;

    h.engine.enqueue("https://x/p/1", "1").await;
    assert_eq!(h.engine.dispatch_batch().await, BatchReport::Idle);

    h.advance(Duration::hours(1));
    h.engine.enqueue_forced("https://x/p/1", "1").await;
    let fresh = h.entry("https://x/p/1").await;
    assert_eq!(fresh.status, EntryStatus::Pending);
    assert_eq!(fresh.attempts, 0);
    assert_eq!(fresh.enqueued_at, h.clock.now());

    h.engine.dispatch_batch().await;
    assert_eq!(h.publisher.publish_count("https://x/p/1"), 2);
}
