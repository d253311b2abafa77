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

//! Implementation of the `prune` command.
//!
//! Removes succeeded and dead-lettered entries past the retention window.

use anyhow::{Context, Result};
use herald::DispatchEngine;
use std::sync::Arc;
use tracing::info;

use crate::config::parse_std_duration;

/// Run the prune command.
///
/// # Arguments
///
/// * `engine` - The configured dispatch engine
/// * `older_than` - Overrides `history_retention` (e.g., "30d")
pub async fn run(engine: Arc<DispatchEngine>, older_than: Option<&str>) -> Result<()> {
    let removed = match older_than {
        Some(raw) => {
            let age = parse_std_duration(raw)
                .with_context(|| format!("Invalid duration: '{}'", raw))?;
            info!("Pruning finished entries older than {}", raw);
            engine.prune_older_than(age).await
        }
        None => {
            info!(
                "Pruning finished entries older than {:?}",
                engine.config().history_retention()
            );
            engine.prune_history().await
        }
    }
    .context("Failed to prune queue history")?;

    if removed == 0 {
        info!("Nothing to prune");
    } else {
        info!("Pruned {} entr{}", removed, if removed == 1 { "y" } else { "ies" });
    }
    Ok(())
}
