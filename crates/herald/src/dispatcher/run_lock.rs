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

//! Exclusive, non-blocking run-lock for batch dispatch.
//!
//! At most one batch runs per engine. A caller that finds the lock held
//! skips its run instead of waiting.

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Lock guarding "a batch is executing".
#[derive(Debug, Clone)]
pub(crate) struct RunLock {
    semaphore: Arc<Semaphore>,
}

/// Proof of holding the [`RunLock`]. Dropping it releases the lock, including
/// on early return or panic.
#[derive(Debug)]
pub(crate) struct RunGuard {
    _permit: OwnedSemaphorePermit,
}

impl RunLock {
    pub(crate) fn new() -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(1)),
        }
    }

    /// Takes the lock if it is free.
    pub(crate) fn try_acquire(&self) -> Option<RunGuard> {
        self.semaphore
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| RunGuard { _permit: permit })
    }

    #[cfg(test)]
    pub(crate) fn is_held(&self) -> bool {
        self.semaphore.available_permits() == 0
    }
}
