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

//! Implementation of the `dispatch` command: a single batch run.

use anyhow::{bail, Result};
use herald::{BatchReport, DispatchEngine};
use std::sync::Arc;
use tracing::info;

pub async fn run(engine: Arc<DispatchEngine>) -> Result<()> {
    match engine.dispatch_batch().await {
        BatchReport::Disabled => info!("Dispatch is disabled, nothing sent"),
        BatchReport::Skipped => info!("Another batch is already running"),
        BatchReport::Idle => info!("No eligible entries"),
        BatchReport::ClaimFailed => bail!("Could not claim entries from the queue store"),
        BatchReport::Completed(summary) => info!(
            "Batch complete: {} claimed, {} succeeded, {} failed",
            summary.claimed, summary.succeeded, summary.failed
        ),
    }
    Ok(())
}
