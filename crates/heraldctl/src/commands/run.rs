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

//! Implementation of the `run` command.
//!
//! Runs the batch scheduler until interrupted. Claims left behind by an
//! earlier crash are released by the first batch once they are older than
//! `[dispatch] stale_after`.

use anyhow::{Context, Result};
use herald::{BatchScheduler, DispatchEngine};
use std::sync::Arc;
use tracing::{info, warn};

/// Run the scheduler in the foreground.
pub async fn run(engine: Arc<DispatchEngine>) -> Result<()> {
    let scheduler = BatchScheduler::new(engine.clone());
    if !scheduler.start().await {
        warn!("Batch dispatch is not active (disabled in configuration), nothing to run");
        return Ok(());
    }
    info!(
        "Batch scheduler started, interval {:?}, batch size {}, stale claims released after {:?}",
        engine.config().batch_interval(),
        engine.config().batch_size(),
        engine.config().stale_after()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown requested, waiting for the current batch to finish");
    scheduler.shutdown().await;
    info!("Scheduler stopped");

    Ok(())
}
