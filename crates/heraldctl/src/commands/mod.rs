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

//! Subcommand implementations.

use anyhow::{Context, Result};
use herald::{DispatchEngine, HttpPublisher, MemoryQueueStore, QueueStore};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{HeraldConfig, StoreBackend};

pub mod dispatch;
pub mod enqueue;
pub mod prune;
pub mod run;
pub mod status;

/// Wires the configured store and publisher into an engine.
pub async fn build_engine(config: &HeraldConfig) -> Result<Arc<DispatchEngine>> {
    let dispatch = config
        .dispatch_config()
        .context("Invalid [dispatch] configuration")?;
    if !dispatch.enabled() {
        warn!("Dispatch is disabled; set [dispatch] enabled = true to announce URLs");
    }

    let store = open_store(config).await?;

    let publisher = HttpPublisher::new(
        config
            .publisher_config()
            .context("Invalid [publisher] configuration")?,
    )
    .context("Failed to build publisher")?;
    debug!("Publishing to {}", publisher.endpoint());

    Ok(Arc::new(DispatchEngine::new(
        dispatch,
        store,
        Arc::new(publisher),
    )))
}

async fn open_store(config: &HeraldConfig) -> Result<Arc<dyn QueueStore>> {
    match config.store.backend {
        StoreBackend::Memory => {
            debug!("Using in-memory queue store");
            Ok(Arc::new(MemoryQueueStore::new()))
        }
        StoreBackend::Sqlite => open_sqlite(config).await,
    }
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(config: &HeraldConfig) -> Result<Arc<dyn QueueStore>> {
    let path = config.store.path.to_string_lossy();
    debug!("Opening SQLite queue store at {}", path);
    let store = herald::SqliteQueueStore::open(&path)
        .await
        .with_context(|| format!("Failed to open queue store at {}", path))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_config: &HeraldConfig) -> Result<Arc<dyn QueueStore>> {
    anyhow::bail!("heraldctl was built without SQLite support; use [store] backend = \"memory\"")
}
