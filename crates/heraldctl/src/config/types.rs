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

use herald::publisher::http::DEFAULT_ENDPOINT;
use herald::{DispatchConfig, HttpPublisherConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::duration::{parse_std_duration, parse_std_duration_allow_zero};
use super::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub dispatch: DispatchSection,
    pub store: StoreSection,
    pub publisher: PublisherSection,
}

/// `[dispatch]`: engine behaviour. Unset keys keep the library defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub enabled: Option<bool>,
    pub realtime_enabled: Option<bool>,
    pub batch_enabled: Option<bool>,
    pub batch_interval: Option<String>,
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub retry_delay: Option<String>,
    pub max_queue_size: Option<usize>,
    pub max_success_age: Option<String>,
    pub history_retention: Option<String>,
    /// In-progress claims older than this are released for retry
    pub stale_after: Option<String>,
    /// Base URL that relative paths given to `enqueue` are resolved against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_base_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Entries live only as long as the process
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    pub backend: StoreBackend,
    pub path: PathBuf,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            path: PathBuf::from("herald.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherSection {
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
    pub request_timeout: String,
    pub concurrency: usize,
}

impl Default for PublisherSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            bearer_token: None,
            request_timeout: "30s".to_string(),
            concurrency: 4,
        }
    }
}

fn duration_field(
    field: &'static str,
    raw: &str,
) -> Result<std::time::Duration, ConfigError> {
    parse_std_duration(raw).map_err(|e| ConfigError::InvalidDuration {
        field,
        reason: e.to_string(),
    })
}

/// For delays where zero means "none".
fn optional_delay_field(
    field: &'static str,
    raw: &str,
) -> Result<std::time::Duration, ConfigError> {
    parse_std_duration_allow_zero(raw).map_err(|e| ConfigError::InvalidDuration {
        field,
        reason: e.to_string(),
    })
}

impl HeraldConfig {
    /// Builds the validated engine configuration.
    pub fn dispatch_config(&self) -> Result<DispatchConfig, ConfigError> {
        let d = &self.dispatch;
        let mut builder = DispatchConfig::builder();

        if let Some(enabled) = d.enabled {
            builder = builder.enabled(enabled);
        }
        if let Some(realtime) = d.realtime_enabled {
            builder = builder.realtime_enabled(realtime);
        }
        if let Some(batch) = d.batch_enabled {
            builder = builder.batch_enabled(batch);
        }
        if let Some(raw) = &d.batch_interval {
            builder = builder.batch_interval(duration_field("dispatch.batch_interval", raw)?);
        }
        if let Some(size) = d.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(attempts) = d.max_attempts {
            builder = builder.max_attempts(attempts);
        }
        if let Some(raw) = &d.retry_delay {
            builder = builder.retry_delay(optional_delay_field("dispatch.retry_delay", raw)?);
        }
        if let Some(size) = d.max_queue_size {
            builder = builder.max_queue_size(size);
        }
        if let Some(raw) = &d.max_success_age {
            builder = builder.max_success_age(duration_field("dispatch.max_success_age", raw)?);
        }
        if let Some(raw) = &d.history_retention {
            builder =
                builder.history_retention(duration_field("dispatch.history_retention", raw)?);
        }
        if let Some(raw) = &d.stale_after {
            builder = builder.stale_after(duration_field("dispatch.stale_after", raw)?);
        }

        Ok(builder.build()?)
    }

    /// Builds the HTTP publisher settings. Blank tokens count as absent.
    pub fn publisher_config(&self) -> Result<HttpPublisherConfig, ConfigError> {
        let p = &self.publisher;
        Ok(HttpPublisherConfig {
            endpoint: p.endpoint.clone(),
            bearer_token: p
                .bearer_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
            request_timeout: duration_field("publisher.request_timeout", &p.request_timeout)?,
            concurrency: p.concurrency,
        })
    }
}
