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

//! # Herald
//!
//! An outbound queue that announces changed page URLs to a search engine's
//! URL notification API.
//!
//! Producers call [`DispatchEngine::enqueue`] whenever a page changes. Each
//! URL is tracked by exactly one [`QueueEntry`]. With real-time dispatch on,
//! the URL is published immediately; otherwise (and for retries) the
//! [`BatchScheduler`] periodically claims the oldest eligible entries and
//! publishes them together. Failed entries are retried after a delay until
//! their attempt budget is spent, after which they stay visible as dead
//! letters.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herald::{BatchScheduler, DispatchConfig, DispatchEngine, HttpPublisher,
//!              HttpPublisherConfig, MemoryQueueStore};
//!
//! let config = DispatchConfig::builder().enabled(true).build()?;
//! let publisher = HttpPublisher::new(HttpPublisherConfig {
//!     bearer_token: Some(token),
//!     ..Default::default()
//! })?;
//! let engine = Arc::new(DispatchEngine::new(
//!     config,
//!     Arc::new(MemoryQueueStore::new()),
//!     Arc::new(publisher),
//! ));
//!
//! let scheduler = BatchScheduler::new(engine.clone());
//! scheduler.start().await;
//!
//! engine.enqueue("https://example.org/p/42", "42").await;
//! ```
//!
//! ## Features
//!
//! - `sqlite` (default): [`SqliteQueueStore`], a persistent store
//! - `http` (default): [`HttpPublisher`], a `reqwest` client for the API

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod health;
pub mod models;
pub mod publisher;
pub mod scheduler;
pub mod store;
pub mod urls;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use dispatcher::{BatchReport, BatchSummary, DispatchEngine};
pub use error::{ConfigError, PublishError, StoreError};
pub use health::{Health, HealthStatus, MetricsSnapshot};
pub use models::{ClaimRequest, EntryStatus, QueueEntry, QueueSnapshot, UpsertMode};
pub use publisher::{PublishOutcome, Publisher};
#[cfg(feature = "http")]
pub use publisher::{HttpPublisher, HttpPublisherConfig};
pub use scheduler::BatchScheduler;
pub use store::{MemoryQueueStore, QueueStore};
#[cfg(feature = "sqlite")]
pub use store::SqliteQueueStore;
pub use urls::resolve_absolute_url;
