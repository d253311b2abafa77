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

//! Implementation of the `enqueue` command.

use anyhow::{anyhow, Context, Result};
use herald::{resolve_absolute_url, DispatchEngine};
use std::sync::Arc;
use tracing::info;

/// Turns a page path or URL into the absolute URL to announce.
pub fn resolve_target(target: &str, site_base_url: Option<&str>) -> Result<String> {
    let target = target.trim();
    if target.is_empty() {
        return Err(anyhow!("URL cannot be blank"));
    }
    if target.starts_with("http://") || target.starts_with("https://") {
        return Ok(target.to_string());
    }
    let base = site_base_url.ok_or_else(|| {
        anyhow!(
            "'{}' is a relative path; set [dispatch] site_base_url to enqueue paths",
            target
        )
    })?;
    resolve_absolute_url(base, target)
        .ok_or_else(|| anyhow!("Cannot resolve '{}' against '{}'", target, base))
}

pub async fn run(
    engine: Arc<DispatchEngine>,
    site_base_url: Option<&str>,
    target: &str,
    subject: Option<&str>,
    force: bool,
) -> Result<()> {
    let url = resolve_target(target, site_base_url)?;
    let subject = subject.unwrap_or(&url);

    if force {
        engine.enqueue_forced(&url, subject).await;
    } else {
        engine.enqueue(&url, subject).await;
    }

    let entry = engine
        .store()
        .get(&url)
        .await
        .context("Failed to read queue entry")?;
    match entry {
        Some(entry) => {
            info!("Queued {} ({})", url, entry.status);
            println!("{}", serde_json::to_string_pretty(&entry)?);
        }
        None => info!("{} was not queued (dispatch disabled)", url),
    }

    Ok(())
}
