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

//! Every claimed entry is resolved by the batch that claimed it.

use std::sync::Arc;
use std::time::Duration;

use herald::dispatcher::MISSING_RESULT_MESSAGE;
use herald::{BatchReport, BatchSummary, EntryStatus, PublishOutcome};

use crate::fixtures::{batch_only, Harness};

const URLS: [&str; 4] = [
    "https://x/p/10",
    "https://x/p/11",
    "https://x/p/12",
    "https://x/p/13",
];

async fn enqueue_all(h: &Harness) {
    for (i, url) in URLS.iter().enumerate() {
        h.engine.enqueue(url, &i.to_string()).await;
        h.advance(chrono::Duration::seconds(1));
    }
}

async fn assert_none_in_progress(h: &Harness) {
    let snapshot = h.store.snapshot(5).await.unwrap();
    assert_eq!(snapshot.in_progress, 0);
    for url in URLS {
        assert_ne!(h.entry(url).await.status, EntryStatus::InProgress, "{}", url);
    }
}

#[tokio::test]
async fn test_partial_response_marks_missing_urls_failed() {
    let h = Harness::memory(batch_only().build().unwrap());
    enqueue_all(&h).await;
    h.publisher.omit("https://x/p/11");
    h.publisher.always_fail("https://x/p/12");

    let report = h.engine.dispatch_batch().await;

    assert_eq!(
        report,
        BatchReport::Completed(BatchSummary {
            claimed: 4,
            succeeded: 2,
            failed: 2,
            unresolved: 0
        })
    );
    assert_none_in_progress(&h).await;
    let missing = h.entry("https://x/p/11").await;
    assert_eq!(missing.status, EntryStatus::Failed);
    assert_eq!(missing.last_error.as_deref(), Some(MISSING_RESULT_MESSAGE));
    assert_eq!(h.entry("https://x/p/13").await.status, EntryStatus::Success);
}

#[tokio::test]
async fn test_transport_error_fails_every_claimed_entry() {
    let h = Harness::memory(batch_only().build().unwrap());
    enqueue_all(&h).await;
    h.publisher.set_transport_down(true);

    let report = h.engine.dispatch_batch().await;

    assert_eq!(
        report,
        BatchReport::Completed(BatchSummary {
            claimed: 4,
            succeeded: 0,
            failed: 4,
            unresolved: 0
        })
    );
    assert_none_in_progress(&h).await;
    for url in URLS {
        let entry = h.entry(url).await;
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.attempts, 1);
        assert!(entry
            .last_error
            .as_deref()
            .unwrap()
            .contains("connection reset by peer"));
    }
}

#[tokio::test]
async fn test_results_for_unclaimed_urls_are_ignored() {
    let h = Harness::memory(batch_only().build().unwrap());
    h.engine.enqueue("https://x/p/1", "1").await;
    h.publisher
        .add_unsolicited(PublishOutcome::success("https://x/not-queued"));
    h.publisher
        .add_unsolicited(PublishOutcome::failure("https://x/p/1", "duplicate"));

    let report = h.engine.dispatch_batch().await;

    assert!(matches!(
        report,
        BatchReport::Completed(BatchSummary { succeeded: 1, failed: 0, .. })
    ));
    assert!(h.store.get("https://x/not-queued").await.unwrap().is_none());
    assert_eq!(h.entry("https://x/p/1").await.status, EntryStatus::Success);
}

#[tokio::test]
async fn test_batch_claims_oldest_first_up_to_batch_size() {
    let h = Harness::memory(batch_only().batch_size(3).build().unwrap());
    enqueue_all(&h).await;

    h.engine.dispatch_batch().await;

    assert_eq!(h.publisher.published(), URLS[..3].to_vec());
    assert_eq!(h.entry("https://x/p/13").await.status, EntryStatus::Pending);
}

#[tokio::test]
async fn test_overlapping_batch_is_skipped() {
    let h = Harness::memory(batch_only().build().unwrap());
    enqueue_all(&h).await;
    h.publisher.set_latency(Duration::from_millis(100));

    let first = {
        let engine = Arc::clone(&h.engine);
        tokio::spawn(async move { engine.dispatch_batch().await })
    };
    // Let the first batch take the run-lock and block in the publisher.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = h.engine.dispatch_batch().await;

    assert_eq!(second, BatchReport::Skipped);
    assert!(matches!(
        first.await.unwrap(),
        BatchReport::Completed(BatchSummary { claimed: 4, .. })
    ));
    assert_eq!(h.publisher.batch_calls(), 1);

    // The lock is free again once the batch is done.
    assert_eq!(h.engine.dispatch_batch().await, BatchReport::Idle);
}
