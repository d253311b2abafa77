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

//! Implementation of the `status` command.

use anyhow::{bail, Context, Result};
use herald::DispatchEngine;
use serde_json::json;
use std::sync::Arc;

/// Prints queue metrics and health as JSON. Fails when health is DOWN so
/// the command can back a liveness check.
pub async fn run(engine: Arc<DispatchEngine>) -> Result<()> {
    let metrics = engine
        .metrics_snapshot()
        .await
        .context("Failed to read queue metrics")?;
    let health = engine.health().await;

    let report = json!({
        "metrics": metrics,
        "health": health,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !health.is_up() {
        bail!("Queue health is {}", health.status);
    }
    Ok(())
}
