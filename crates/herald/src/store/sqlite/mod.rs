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

//! SQLite-backed queue store.
//!
//! Every claim runs inside an `IMMEDIATE` transaction, which takes the write
//! lock before the candidate `SELECT`. Together with a single pooled
//! connection this serializes claimers, so an entry is claimed at most once
//! even across processes sharing the database file.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_diesel::sqlite::{Manager, Pool, Runtime};
use diesel::dsl::{count_star, max, min};
use diesel::prelude::*;
use diesel::SqliteConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use tracing::{debug, info};

use super::{QueueStore, INTERRUPTED_MESSAGE};
use crate::clock::{Clock, SystemClock};
use crate::error::StoreError;
use crate::models::{ClaimRequest, EntryStatus, QueueEntry, QueueSnapshot, UpsertMode};

mod models;
mod schema;

use models::{decode_optional_time, encode_time, QueueRow};
use schema::index_queue;

/// Embedded schema migrations for the queue table.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/sqlite");

const PENDING: &str = "Pending";
const IN_PROGRESS: &str = "InProgress";
const SUCCESS: &str = "Success";
const FAILED: &str = "Failed";

/// Queue store persisted in a SQLite database file.
#[derive(Clone)]
pub struct SqliteQueueStore {
    pool: Pool,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for SqliteQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteQueueStore").finish_non_exhaustive()
    }
}

impl SqliteQueueStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    ///
    /// `path` may carry a `sqlite://` prefix.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        Self::open_with_clock(path, Arc::new(SystemClock)).await
    }

    /// Like [`open`](Self::open), stamping entries with `clock`.
    pub async fn open_with_clock(path: &str, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let database_url = path.strip_prefix("sqlite://").unwrap_or(path).to_string();
        let manager = Manager::new(database_url, Runtime::Tokio1);
        // One connection: SQLite has a single writer regardless.
        let pool = Pool::builder(manager)
            .max_size(1)
            .build()
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;

        let store = Self { pool, clock };
        store.run_migrations().await?;
        info!("SQLite queue store opened at {}", path);
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        self.interact(|conn| {
            diesel::sql_query("PRAGMA journal_mode=WAL;").execute(conn)?;
            diesel::sql_query("PRAGMA busy_timeout=30000;").execute(conn)?;
            conn.run_pending_migrations(MIGRATIONS)
                .map_err(|e| StoreError::Migration(e.to_string()))?;
            Ok(())
        })
        .await
    }

    /// Runs `f` on the pooled connection's blocking thread.
    async fn interact<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| StoreError::ConnectionPool(e.to_string()))?;
        conn.interact(f)
            .await
            .map_err(|e| StoreError::Interaction(e.to_string()))?
    }
}

fn find_row(conn: &mut SqliteConnection, url: &str) -> Result<Option<QueueRow>, StoreError> {
    Ok(index_queue::table
        .find(url)
        .select(QueueRow::as_select())
        .first(conn)
        .optional()?)
}

fn save_entry(conn: &mut SqliteConnection, entry: &QueueEntry) -> Result<(), StoreError> {
    let row = QueueRow::from(entry);
    diesel::update(index_queue::table.find(&entry.url))
        .set(&row)
        .execute(conn)?;
    Ok(())
}

/// `(status, rows, oldest enqueued_at, last success, last failure)`
type StatusBucket = (String, i64, Option<String>, Option<String>, Option<String>);

fn fold_buckets(buckets: Vec<StatusBucket>, dead_lettered: i64) -> Result<QueueSnapshot, StoreError> {
    let count = |n: i64| usize::try_from(n).unwrap_or(0);
    let mut snapshot = QueueSnapshot::default();

    for (status, rows, oldest, last_success, last_failure) in buckets {
        let label = format!("<status {}>", status);
        let status = status
            .parse::<EntryStatus>()
            .map_err(|reason| StoreError::CorruptRow {
                url: label.clone(),
                reason,
            })?;
        let rows = count(rows);
        snapshot.total += rows;
        match status {
            EntryStatus::Pending => snapshot.pending += rows,
            EntryStatus::InProgress => snapshot.in_progress += rows,
            EntryStatus::Success => snapshot.succeeded += rows,
            EntryStatus::Failed => {
                let dead = count(dead_lettered).min(rows);
                snapshot.dead_lettered += dead;
                snapshot.failed_retryable += rows - dead;
            }
        }
        if matches!(status, EntryStatus::Pending | EntryStatus::InProgress) {
            let oldest = decode_optional_time(&label, oldest.as_deref())?;
            snapshot.oldest_pending_at = match (snapshot.oldest_pending_at, oldest) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }
        // Fixed-width encoding makes the textual maximum the latest instant.
        let last_success = decode_optional_time(&label, last_success.as_deref())?;
        snapshot.last_success_at = snapshot.last_success_at.max(last_success);
        let last_failure = decode_optional_time(&label, last_failure.as_deref())?;
        snapshot.last_failure_at = snapshot.last_failure_at.max(last_failure);
    }

    Ok(snapshot)
}

fn clamp_attempts(max_attempts: u32) -> i32 {
    i32::try_from(max_attempts).unwrap_or(i32::MAX)
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn upsert(
        &self,
        url: &str,
        subject_id: &str,
        mode: UpsertMode,
        max_attempts: u32,
    ) -> Result<QueueEntry, StoreError> {
        let fresh = QueueRow::from(&QueueEntry::new(url, subject_id, self.clock.now()));

        self.interact(move |conn| {
            conn.immediate_transaction(|conn| {
                let Some(existing) = find_row(conn, &fresh.url)? else {
                    diesel::insert_into(index_queue::table)
                        .values(&fresh)
                        .execute(conn)?;
                    debug!("Queued new entry for {}", fresh.url);
                    return QueueEntry::try_from(fresh);
                };

                let existing = QueueEntry::try_from(existing)?;
                if mode == UpsertMode::Force && existing.is_requeueable(max_attempts) {
                    debug!(
                        "Forced re-queue of {} (was {} after {} attempts)",
                        existing.url, existing.status, existing.attempts
                    );
                    diesel::update(index_queue::table.find(&fresh.url))
                        .set(&fresh)
                        .execute(conn)?;
                    return QueueEntry::try_from(fresh);
                }
                Ok(existing)
            })
        })
        .await
    }

    async fn claim_pending(&self, request: &ClaimRequest) -> Result<Vec<QueueEntry>, StoreError> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        let now = self.clock.now();
        let limit = i64::try_from(request.limit).unwrap_or(i64::MAX);
        let max_attempts = clamp_attempts(request.max_attempts);
        // Failed entries whose last attempt is at or before this are due again.
        let retry_threshold = now.checked_sub_signed(request.retry_delay).map(encode_time);

        let claimed = self
            .interact(move |conn| {
                conn.immediate_transaction(|conn| {
                    let mut query = index_queue::table
                        .select(QueueRow::as_select())
                        .filter(index_queue::attempts.lt(max_attempts))
                        .into_boxed();
                    query = match retry_threshold {
                        Some(threshold) => query.filter(
                            index_queue::status.eq(PENDING).or(index_queue::status
                                .eq(FAILED)
                                .and(
                                    index_queue::last_attempt_at.is_null().or(
                                        index_queue::last_attempt_at
                                            .assume_not_null()
                                            .le(threshold),
                                    ),
                                )),
                        ),
                        None => query.filter(index_queue::status.eq(PENDING)),
                    };
                    let rows: Vec<QueueRow> = query
                        .order((index_queue::enqueued_at.asc(), index_queue::url.asc()))
                        .limit(limit)
                        .load(conn)?;

                    let mut claimed = Vec::with_capacity(rows.len());
                    for row in rows {
                        let mut entry = QueueEntry::try_from(row)?;
                        entry.apply_claim(now);
                        save_entry(conn, &entry)?;
                        claimed.push(entry);
                    }
                    Ok(claimed)
                })
            })
            .await?;

        debug!("Claimed {} entries", claimed.len());
        Ok(claimed)
    }

    async fn claim_url(
        &self,
        url: &str,
        request: &ClaimRequest,
    ) -> Result<Option<QueueEntry>, StoreError> {
        let now = self.clock.now();
        let url = url.to_string();
        let request = *request;

        self.interact(move |conn| {
            conn.immediate_transaction(|conn| {
                let Some(row) = find_row(conn, &url)? else {
                    return Ok(None);
                };
                let mut entry = QueueEntry::try_from(row)?;
                if !entry.is_claimable(&request, now) {
                    return Ok(None);
                }
                entry.apply_claim(now);
                save_entry(conn, &entry)?;
                Ok(Some(entry))
            })
        })
        .await
    }

    async fn mark_success(&self, url: &str) -> Result<(), StoreError> {
        let now = encode_time(self.clock.now());
        let url = url.to_string();

        let updated = self
            .interact(move |conn| {
                Ok(diesel::update(
                    index_queue::table
                        .find(&url)
                        .filter(index_queue::status.ne(SUCCESS)),
                )
                .set((
                    index_queue::status.eq(SUCCESS),
                    index_queue::last_success_at.eq(Some(now)),
                    index_queue::last_error.eq(None::<String>),
                ))
                .execute(conn)?)
            })
            .await?;
        debug!("mark_success updated {} row(s)", updated);
        Ok(())
    }

    async fn mark_failure(&self, url: &str, message: &str) -> Result<(), StoreError> {
        let now = encode_time(self.clock.now());
        let url = url.to_string();
        let message = message.to_string();

        let updated = self
            .interact(move |conn| {
                Ok(diesel::update(
                    index_queue::table
                        .find(&url)
                        .filter(index_queue::status.ne(SUCCESS)),
                )
                .set((
                    index_queue::status.eq(FAILED),
                    index_queue::last_failure_at.eq(Some(now)),
                    index_queue::last_error.eq(Some(message)),
                ))
                .execute(conn)?)
            })
            .await?;
        debug!("mark_failure updated {} row(s)", updated);
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<Option<QueueEntry>, StoreError> {
        let url = url.to_string();
        self.interact(move |conn| find_row(conn, &url)?.map(QueueEntry::try_from).transpose())
            .await
    }

    async fn snapshot(&self, max_attempts: u32) -> Result<QueueSnapshot, StoreError> {
        let max_attempts = clamp_attempts(max_attempts);

        self.interact(move |conn| {
            conn.transaction(|conn| {
                let buckets: Vec<StatusBucket> = index_queue::table
                    .group_by(index_queue::status)
                    .select((
                        index_queue::status,
                        count_star(),
                        min(index_queue::enqueued_at),
                        max(index_queue::last_success_at),
                        max(index_queue::last_failure_at),
                    ))
                    .load(conn)?;
                let dead_lettered: i64 = index_queue::table
                    .filter(index_queue::status.eq(FAILED))
                    .filter(index_queue::attempts.ge(max_attempts))
                    .count()
                    .get_result(conn)?;

                fold_buckets(buckets, dead_lettered)
            })
        })
        .await
    }

    async fn size(&self) -> Result<usize, StoreError> {
        let count: i64 = self
            .interact(|conn| Ok(index_queue::table.count().get_result(conn)?))
            .await?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    async fn prune(&self, cutoff: DateTime<Utc>, max_attempts: u32) -> Result<usize, StoreError> {
        let cutoff = encode_time(cutoff);
        let max_attempts = clamp_attempts(max_attempts);

        self.interact(move |conn| {
            let succeeded = index_queue::status
                .eq(SUCCESS)
                .and(index_queue::last_success_at.assume_not_null().lt(cutoff.clone()));
            let dead_lettered = index_queue::status
                .eq(FAILED)
                .and(index_queue::attempts.ge(max_attempts))
                .and(index_queue::last_failure_at.assume_not_null().lt(cutoff));
            Ok(diesel::delete(index_queue::table.filter(succeeded.or(dead_lettered))).execute(conn)?)
        })
        .await
    }

    async fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let now = encode_time(self.clock.now());
        let cutoff = encode_time(cutoff);

        self.interact(move |conn| {
            Ok(diesel::update(
                index_queue::table
                    .filter(index_queue::status.eq(IN_PROGRESS))
                    .filter(index_queue::last_attempt_at.assume_not_null().lt(cutoff)),
            )
            .set((
                index_queue::status.eq(FAILED),
                index_queue::last_failure_at.eq(Some(now)),
                index_queue::last_error.eq(Some(INTERRUPTED_MESSAGE.to_string())),
            ))
            .execute(conn)?)
        })
        .await
    }
}
