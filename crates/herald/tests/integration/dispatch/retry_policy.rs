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

//! Retry delay, attempt budget and housekeeping.

use chrono::Duration;
use herald::store::INTERRUPTED_MESSAGE;
use herald::{BatchReport, ClaimRequest, EntryStatus};

use crate::fixtures::{batch_only, Harness};

#[tokio::test]
async fn test_retry_delay_is_measured_from_last_attempt() {
    let h = Harness::memory(
        batch_only()
            .retry_delay(std::time::Duration::from_secs(30 * 60))
            .build()
            .unwrap(),
    );
    h.publisher.fail_times("https://x/p/1", 2);
    h.engine.enqueue("https://x/p/1", "1").await;

    h.advance(Duration::hours(3));
    h.engine.dispatch_batch().await;
    let first_attempt_at = h.entry("https://x/p/1").await.last_attempt_at.unwrap();

    h.advance(Duration::minutes(30) - Duration::seconds(1));
    assert_eq!(h.engine.dispatch_batch().await, BatchReport::Idle);

    h.advance(Duration::seconds(1));
    h.engine.dispatch_batch().await;
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.attempts, 2);
    assert_eq!(
        entry.last_attempt_at,
        Some(first_attempt_at + Duration::minutes(30))
    );
    assert_eq!(entry.status, EntryStatus::Failed);
}

#[tokio::test]
async fn test_attempts_grow_by_one_per_claim() {
    let h = Harness::memory(
        batch_only()
            .max_attempts(4)
            .retry_delay(std::time::Duration::ZERO)
            .build()
            .unwrap(),
    );
    h.publisher.always_fail("https://x/p/1");
    h.engine.enqueue("https://x/p/1", "1").await;

    let mut seen = Vec::new();
    while let BatchReport::Completed(_) = h.engine.dispatch_batch().await {
        seen.push(h.entry("https://x/p/1").await.attempts);
        h.advance(Duration::seconds(1));
    }

    assert_eq!(seen, vec![1, 2, 3, 4]);
    let entry = h.entry("https://x/p/1").await;
    assert!(entry.is_dead_lettered(4));
}

#[tokio::test]
async fn test_dead_letter_is_visible_but_not_claimable() {
    let h = Harness::memory(batch_only().max_attempts(2).build().unwrap());
    h.publisher.always_fail("https://x/p/1");
    h.engine.enqueue("https://x/p/1", "1").await;

    for _ in 0..2 {
        h.engine.dispatch_batch().await;
        h.advance(Duration::hours(1));
    }

    let request = ClaimRequest {
        limit: 10,
        max_attempts: 2,
        retry_delay: Duration::zero(),
    };
    assert!(h.store.claim_pending(&request).await.unwrap().is_empty());
    assert!(h
        .store
        .claim_url("https://x/p/1", &request)
        .await
        .unwrap()
        .is_none());
    assert_eq!(h.store.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_prune_history_keeps_recent_and_retryable_entries() {
    let h = Harness::memory(
        batch_only()
            .max_attempts(1)
            .history_retention(std::time::Duration::from_secs(7 * 24 * 3600))
            .build()
            .unwrap(),
    );
    h.publisher.always_fail("https://x/dead");
    for url in ["https://x/old", "https://x/dead"] {
        h.engine.enqueue(url, "s").await;
    }
    h.engine.dispatch_batch().await;

    h.advance(Duration::days(6));
    h.engine.enqueue("https://x/recent", "s").await;
    h.engine.dispatch_batch().await;
    h.engine.enqueue("https://x/waiting", "s").await;

    h.advance(Duration::days(2));
    let removed = h.engine.prune_history().await.unwrap();

    assert_eq!(removed, 2);
    assert!(h.store.get("https://x/old").await.unwrap().is_none());
    assert!(h.store.get("https://x/dead").await.unwrap().is_none());
    assert_eq!(h.entry("https://x/recent").await.status, EntryStatus::Success);
    assert_eq!(h.entry("https://x/waiting").await.status, EntryStatus::Pending);
}

#[tokio::test]
async fn test_release_stale_makes_interrupted_entries_retryable() {
    let h = Harness::memory(
        batch_only()
            .retry_delay(std::time::Duration::ZERO)
            .build()
            .unwrap(),
    );
    h.engine.enqueue("https://x/p/1", "1").await;
    // Simulate a dispatcher that died after claiming.
    h.store
        .claim_url("https://x/p/1", &h.engine.config().realtime_claim())
        .await
        .unwrap()
        .unwrap();

    h.advance(Duration::minutes(10));
    assert_eq!(
        h.engine
            .release_stale(std::time::Duration::from_secs(3600))
            .await
            .unwrap(),
        0
    );

    h.advance(Duration::hours(1));
    assert_eq!(
        h.engine
            .release_stale(std::time::Duration::from_secs(3600))
            .await
            .unwrap(),
        1
    );
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.status, EntryStatus::Failed);
    assert_eq!(entry.last_error.as_deref(), Some(INTERRUPTED_MESSAGE));

    h.engine.dispatch_batch().await;
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 2);
}
