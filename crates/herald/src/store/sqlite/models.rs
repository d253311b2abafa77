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

//! Row mapping for the `index_queue` table.

use chrono::{DateTime, SecondsFormat, Utc};
use diesel::prelude::*;

use super::schema::index_queue;
use crate::error::StoreError;
use crate::models::{EntryStatus, QueueEntry};

#[derive(Debug, Clone, Queryable, Selectable, Insertable, AsChangeset)]
#[diesel(table_name = index_queue)]
#[diesel(primary_key(url))]
#[diesel(treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct QueueRow {
    pub url: String,
    pub subject_id: String,
    pub status: String,
    pub attempts: i32,
    pub enqueued_at: String,
    pub last_attempt_at: Option<String>,
    pub last_success_at: Option<String>,
    pub last_failure_at: Option<String>,
    pub last_error: Option<String>,
}

/// Encodes a timestamp in the fixed-width form stored in the table.
pub fn encode_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_time(url: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptRow {
            url: url.to_string(),
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

pub(super) fn decode_optional_time(url: &str, raw: Option<&str>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|raw| decode_time(url, raw)).transpose()
}

impl From<&QueueEntry> for QueueRow {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            url: entry.url.clone(),
            subject_id: entry.subject_id.clone(),
            status: entry.status.as_str().to_string(),
            attempts: i32::try_from(entry.attempts).unwrap_or(i32::MAX),
            enqueued_at: encode_time(entry.enqueued_at),
            last_attempt_at: entry.last_attempt_at.map(encode_time),
            last_success_at: entry.last_success_at.map(encode_time),
            last_failure_at: entry.last_failure_at.map(encode_time),
            last_error: entry.last_error.clone(),
        }
    }
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = StoreError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<EntryStatus>()
            .map_err(|reason| StoreError::CorruptRow {
                url: row.url.clone(),
                reason,
            })?;
        let attempts = u32::try_from(row.attempts).map_err(|_| StoreError::CorruptRow {
            url: row.url.clone(),
            reason: format!("negative attempt count {}", row.attempts),
        })?;

        Ok(QueueEntry {
            enqueued_at: decode_time(&row.url, &row.enqueued_at)?,
            last_attempt_at: decode_optional_time(&row.url, row.last_attempt_at.as_deref())?,
            last_success_at: decode_optional_time(&row.url, row.last_success_at.as_deref())?,
            last_failure_at: decode_optional_time(&row.url, row.last_failure_at.as_deref())?,
            status,
            attempts,
            url: row.url,
            subject_id: row.subject_id,
            last_error: row.last_error,
        })
    }
}
