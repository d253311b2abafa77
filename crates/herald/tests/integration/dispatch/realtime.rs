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

//! Real-time dispatch on enqueue.

use std::sync::Arc;
use std::time::Duration;

use herald::{EntryStatus, UpsertMode};
use tokio::sync::Barrier;

use crate::fixtures::{batch_only, Harness};

fn realtime() -> herald::DispatchConfigBuilder {
    batch_only().realtime_enabled(true)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_for_one_url_publish_once() {
    let h = Harness::memory(realtime().build().unwrap());
    h.publisher.set_latency(Duration::from_millis(50));

    const PRODUCERS: usize = 8;
    let barrier = Arc::new(Barrier::new(PRODUCERS));
    let mut handles = Vec::new();
    for i in 0..PRODUCERS {
        let engine = h.engine.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            engine
                .handle_realtime_event("https://x/p/1", &i.to_string())
                .await;
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.publisher.publish_count("https://x/p/1"), 1);
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 1);
}

#[tokio::test]
async fn test_event_inside_retry_delay_waits_for_batch() {
    let h = Harness::memory(
        realtime()
            .retry_delay(Duration::from_secs(600))
            .build()
            .unwrap(),
    );
    h.publisher.fail_times("https://x/p/1", 1);
    h.engine.enqueue("https://x/p/1", "1").await;

    h.advance(chrono::Duration::minutes(5));
    h.engine.enqueue("https://x/p/1", "1").await;

    assert_eq!(h.publisher.publish_count("https://x/p/1"), 1);
    assert_eq!(h.entry("https://x/p/1").await.attempts, 1);

    h.advance(chrono::Duration::minutes(5));
    h.engine.enqueue("https://x/p/1", "1").await;
    let entry = h.entry("https://x/p/1").await;
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 2);
}

#[tokio::test]
async fn test_event_does_not_disturb_in_flight_entry() {
    let h = Harness::memory(realtime().build().unwrap());
    h.store
        .upsert("https://x/p/1", "1", UpsertMode::KeepExisting, 5)
        .await
        .unwrap();
    let claimed = h
        .store
        .claim_url("https://x/p/1", &h.engine.config().realtime_claim())
        .await
        .unwrap()
        .unwrap();

    h.engine.enqueue("https://x/p/1", "1").await;
    h.engine.enqueue_forced("https://x/p/1", "1").await;

    assert!(h.publisher.published().is_empty());
    assert_eq!(h.entry("https://x/p/1").await, claimed);
}

#[tokio::test]
async fn test_dead_lettered_url_is_not_republished_by_events() {
    let h = Harness::memory(
        realtime()
            .max_attempts(1)
            .retry_delay(Duration::ZERO)
            .build()
            .unwrap(),
    );
    h.publisher.always_fail("https://x/p/9");

    h.engine.enqueue("https://x/p/9", "9").await;
    h.engine.enqueue("https://x/p/9", "9").await;
    assert_eq!(h.publisher.publish_count("https://x/p/9"), 1);

    // Forcing starts a new lifecycle with a fresh attempt budget.
    h.engine.enqueue_forced("https://x/p/9", "9").await;
    assert_eq!(h.publisher.publish_count("https://x/p/9"), 2);
    let entry = h.entry("https://x/p/9").await;
    assert_eq!(entry.attempts, 1);
    assert_eq!(entry.status, EntryStatus::Failed);
}
