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

//! Error types for the dispatch queue.
//!
//! Store and publisher errors never reach producers or the scheduler: the
//! dispatch engine logs and records them. They are surfaced as typed errors
//! at the component boundary so that each backend can report what actually
//! went wrong.

use thiserror::Error;

/// Errors raised by a [`QueueStore`](crate::store::QueueStore) backend.
///
/// A store error means the requested mutation must be assumed NOT applied.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A connection could not be obtained from the pool.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// The blocking interaction with the connection failed (panicked or aborted).
    #[error("Connection interaction failed: {0}")]
    Interaction(String),

    /// The backing database rejected the query.
    #[error("Query failed: {0}")]
    Query(String),

    /// Running schema migrations failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// A stored row could not be mapped back into a queue entry.
    #[error("Corrupt queue row for '{url}': {reason}")]
    CorruptRow { url: String, reason: String },
}

#[cfg(feature = "sqlite")]
impl From<diesel::result::Error> for StoreError {
    fn from(error: diesel::result::Error) -> Self {
        StoreError::Query(error.to_string())
    }
}

/// Errors raised by a [`Publisher`](crate::publisher::Publisher) for a whole call.
///
/// Per-URL failures are not errors; they are reported as unsuccessful
/// [`PublishOutcome`](crate::publisher::PublishOutcome)s.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The remote endpoint could not be reached or the request timed out.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote endpoint answered with something that is not a result set.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The configured endpoint is not a valid URL.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Errors raised when a [`DispatchConfig`](crate::config::DispatchConfig) is invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `batch_size` must allow at least one entry per run.
    #[error("batch_size must be greater than zero")]
    ZeroBatchSize,

    /// `max_attempts` must allow at least one attempt.
    #[error("max_attempts must be greater than zero")]
    ZeroMaxAttempts,

    /// `batch_interval` must be a positive duration.
    #[error("batch_interval must be greater than zero")]
    ZeroBatchInterval,

    /// `max_queue_size` must be a positive ceiling.
    #[error("max_queue_size must be greater than zero")]
    ZeroMaxQueueSize,

    /// `stale_after` must be a positive duration.
    #[error("stale_after must be greater than zero")]
    ZeroStaleAfter,
}
