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

//! Dispatch of queued URLs to the publisher.

mod engine;
mod run_lock;

pub use engine::{DispatchEngine, MISSING_RESULT_MESSAGE};

/// Counts of one completed batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub claimed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Entries whose outcome could not be written to the store. They stay
    /// `InProgress` until a later batch releases them as stale.
    pub unresolved: usize,
}

impl BatchSummary {
    pub(crate) fn count(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Succeeded => self.succeeded += 1,
            Resolution::Failed => self.failed += 1,
            Resolution::Unresolved => self.unresolved += 1,
        }
    }
}

/// How a claimed entry ended up after its outcome was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolution {
    Succeeded,
    Failed,
    /// The outcome could not be written; the entry is still `InProgress`.
    Unresolved,
}

/// What a call to [`DispatchEngine::dispatch_batch`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchReport {
    /// The engine is disabled.
    Disabled,
    /// Another batch held the run-lock.
    Skipped,
    /// The store could not claim entries; nothing changed.
    ClaimFailed,
    /// Nothing was eligible.
    Idle,
    /// Entries were claimed, published and resolved.
    Completed(BatchSummary),
}
