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

//! Outbound publishing to the remote indexing API.
//!
//! A [`Publisher`] reports one [`PublishOutcome`] per URL. A rejected URL is
//! an ordinary outcome with `success == false`; only a failure of the whole
//! call is a [`PublishError`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{HttpPublisher, HttpPublisherConfig};

/// Result of announcing one URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishOutcome {
    pub url: String,
    pub success: bool,
    /// Failure description, or an informational note on success
    pub message: Option<String>,
}

impl PublishOutcome {
    /// An accepted notification.
    pub fn success(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: true,
            message: None,
        }
    }

    /// A rejected or undeliverable notification.
    pub fn failure(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Client of the remote indexing API.
///
/// Implementations are shared between the real-time path and the batch
/// scheduler and must tolerate concurrent calls.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Announces a single URL. Transport problems are reported as a failed outcome.
    async fn publish_one(&self, url: &str) -> PublishOutcome;

    /// Announces a batch of URLs.
    ///
    /// The result may omit URLs or contain URLs that were not requested;
    /// callers match outcomes by URL.
    async fn publish_many(&self, urls: &[String]) -> Result<Vec<PublishOutcome>, PublishError>;
}
