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

//! The engine publishing through the HTTP publisher against a mock endpoint.

use std::sync::Arc;
use std::time::Duration;

use herald::{
    BatchReport, BatchSummary, DispatchEngine, EntryStatus, HttpPublisher, HttpPublisherConfig,
    MemoryQueueStore, QueueStore,
};
use mockito::{Matcher, Server};
use serde_json::json;

use crate::fixtures::batch_only;

const PATH: &str = "/v3/urlNotifications:publish";

fn publisher(server: &Server) -> HttpPublisher {
    HttpPublisher::new(HttpPublisherConfig {
        endpoint: format!("{}{}", server.url(), PATH),
        bearer_token: Some("test-token".to_string()),
        request_timeout: Duration::from_secs(5),
        concurrency: 2,
    })
    .unwrap()
}

#[tokio::test]
async fn test_batch_over_http_records_per_url_outcomes() {
    let mut server = Server::new_async().await;
    let rejected = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::PartialJson(json!({"url": "https://x/p/2"})))
        .with_status(403)
        .with_body("Permission denied. Failed to verify the URL ownership.")
        .create_async()
        .await;
    let accepted = server
        .mock("POST", PATH)
        .match_header("authorization", "Bearer test-token")
        .match_body(Matcher::AnyOf(vec![
            Matcher::PartialJson(json!({"url": "https://x/p/1", "type": "URL_UPDATED"})),
            Matcher::PartialJson(json!({"url": "https://x/p/3", "type": "URL_UPDATED"})),
        ]))
        .with_status(200)
        .with_body(r#"{"urlNotificationMetadata":{}}"#)
        .expect(2)
        .create_async()
        .await;

    let store = Arc::new(MemoryQueueStore::new());
    let engine = DispatchEngine::new(
        batch_only().build().unwrap(),
        store.clone(),
        Arc::new(publisher(&server)),
    );
    for i in 1..=3 {
        engine.enqueue(&format!("https://x/p/{}", i), &i.to_string()).await;
    }

    let report = engine.dispatch_batch().await;

    assert_eq!(
        report,
        BatchReport::Completed(BatchSummary {
            claimed: 3,
            succeeded: 2,
            failed: 1,
            unresolved: 0
        })
    );
    rejected.assert_async().await;
    accepted.assert_async().await;

    let failed = store.get("https://x/p/2").await.unwrap().unwrap();
    assert_eq!(failed.status, EntryStatus::Failed);
    assert_eq!(
        failed.last_error.as_deref(),
        Some("HTTP 403: Permission denied. Failed to verify the URL ownership.")
    );
    for url in ["https://x/p/1", "https://x/p/3"] {
        let entry = store.get(url).await.unwrap().unwrap();
        assert_eq!(entry.status, EntryStatus::Success);
    }
}

#[tokio::test]
async fn test_realtime_over_http_publishes_on_enqueue() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", PATH)
        .match_body(Matcher::Json(json!({
            "url": "https://x/p/7",
            "type": "URL_UPDATED"
        })))
        .with_status(200)
        .create_async()
        .await;

    let store = Arc::new(MemoryQueueStore::new());
    let engine = DispatchEngine::new(
        batch_only().realtime_enabled(true).build().unwrap(),
        store.clone(),
        Arc::new(publisher(&server)),
    );

    engine.enqueue("https://x/p/7", "7").await;

    mock.assert_async().await;
    let entry = store.get("https://x/p/7").await.unwrap().unwrap();
    assert_eq!(entry.status, EntryStatus::Success);
    assert_eq!(entry.attempts, 1);
}
