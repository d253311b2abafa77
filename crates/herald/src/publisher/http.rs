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

//! HTTP publisher for the URL notification endpoint.
//!
//! Each URL is sent as its own `POST` carrying
//! `{"url": "...", "type": "URL_UPDATED"}`. Batches fan out with bounded
//! concurrency and report outcomes in input order.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};
use url::Url;

use super::{PublishOutcome, Publisher};
use crate::error::PublishError;

/// Default URL notification endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";

/// Notification type sent for every URL.
pub const URL_UPDATED: &str = "URL_UPDATED";

/// Settings for an [`HttpPublisher`].
#[derive(Debug, Clone)]
pub struct HttpPublisherConfig {
    /// Notification endpoint
    pub endpoint: String,
    /// Sent as `Authorization: Bearer <token>` when present
    pub bearer_token: Option<String>,
    /// Per-request timeout; an expired request is a failed outcome
    pub request_timeout: Duration,
    /// Requests a batch may have in flight
    pub concurrency: usize,
}

impl Default for HttpPublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bearer_token: None,
            request_timeout: Duration::from_secs(30),
            concurrency: 4,
        }
    }
}

#[derive(Serialize)]
struct Notification<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// [`Publisher`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPublisher {
    client: reqwest::Client,
    endpoint: Url,
    bearer_token: Option<String>,
    concurrency: usize,
}

impl HttpPublisher {
    pub fn new(config: HttpPublisherConfig) -> Result<Self, PublishError> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| PublishError::InvalidEndpoint(format!("{}: {}", config.endpoint, e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .pool_idle_timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            bearer_token: config.bearer_token.filter(|token| !token.trim().is_empty()),
            concurrency: config.concurrency.max(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for HttpPublisher {
    async fn publish_one(&self, url: &str) -> PublishOutcome {
        if url.trim().is_empty() {
            return PublishOutcome::failure(url, "blank url");
        }

        let mut request = self.client.post(self.endpoint.clone()).json(&Notification {
            url,
            kind: URL_UPDATED,
        });
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        match request.send().await {
            Ok(response) if response.status().is_success() => {
                debug!(url, status = response.status().as_u16(), "Notification accepted");
                PublishOutcome::success(url)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                warn!(url, status, "Notification rejected");
                PublishOutcome::failure(url, format!("HTTP {}: {}", status, body))
            }
            Err(e) => {
                warn!(url, error = %e, "Notification request failed");
                PublishOutcome::failure(url, e.to_string())
            }
        }
    }

    async fn publish_many(&self, urls: &[String]) -> Result<Vec<PublishOutcome>, PublishError> {
        let futures: Vec<_> = urls.iter().map(|url| self.publish_one(url)).collect();
        let outcomes = stream::iter(futures)
            .buffered(self.concurrency)
            .collect()
            .await;
        Ok(outcomes)
    }
}
