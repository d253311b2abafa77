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

//! Queue storage abstraction.
//!
//! The store owns entry storage; the dispatch engine owns every state
//! transition and drives them exclusively through this trait. Two backends
//! are provided:
//!
//! - [`MemoryQueueStore`]: a concurrent map of individually locked entries
//! - `SqliteQueueStore`: a diesel-backed SQLite table (feature `sqlite`)
//!
//! Store operations never retry. When one returns an error the caller must
//! assume the mutation did not apply.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StoreError;
use crate::models::{ClaimRequest, QueueEntry, QueueSnapshot, UpsertMode};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::MemoryQueueStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteQueueStore;

/// Storage of queue entries keyed by URL.
///
/// Implementations must be safe under concurrent callers: a given entry can
/// be claimed by at most one caller at a time.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Inserts a `Pending` entry for `url`, or returns the existing one.
    ///
    /// With [`UpsertMode::Force`], a terminal entry (`Success` or
    /// dead-lettered under `max_attempts`) is replaced by a fresh lifecycle.
    async fn upsert(
        &self,
        url: &str,
        subject_id: &str,
        mode: UpsertMode,
        max_attempts: u32,
    ) -> Result<QueueEntry, StoreError>;

    /// Atomically claims up to `request.limit` eligible entries, oldest first.
    ///
    /// Each returned entry is already `InProgress` with its attempt consumed.
    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<QueueEntry>, StoreError>;

    /// Atomically claims the entry for `url` if it is eligible.
    async fn claim_url(
        &self,
        url: &str,
        request: &ClaimRequest,
    ) -> Result<Option<QueueEntry>, StoreError>;

    /// Records a successful dispatch. No-op for unknown or already succeeded entries.
    async fn mark_success(&self, url: &str) -> Result<(), StoreError>;

    /// Records a failed dispatch. No-op for unknown or already succeeded entries.
    async fn mark_failure(&self, url: &str, message: &str) -> Result<(), StoreError>;

    /// Returns the entry for `url`, if any.
    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, StoreError>;

    /// Aggregates entry counts and timestamps.
    async fn snapshot(&self, max_attempts: u32) -> Result<QueueSnapshot, StoreError>;

    /// Total number of tracked entries.
    async fn size(&self) -> Result<usize, StoreError>;

    /// Deletes succeeded entries whose last success, and dead-lettered entries
    /// whose last failure, is older than `cutoff`. Returns the number removed.
    async fn prune(&self, cutoff: DateTime<Utc>, max_attempts: u32) -> Result<usize, StoreError>;

    /// Returns `InProgress` entries claimed before `cutoff` to `Failed`.
    ///
    /// Used after a crash left dispatches unresolved. Returns the number released.
    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError>;
}

/// Message recorded on entries released by [`QueueStore::release_stale`].
pub const INTERRUPTED_MESSAGE: &str = "dispatch interrupted";
