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

//! Periodic batch dispatch.
//!
//! The scheduler is a plain timer: every `batch_interval` it calls
//! [`DispatchEngine::dispatch_batch`] on a background task. Overlap with
//! other callers is resolved by the engine's run-lock, not here. Each tick
//! also releases stale claims, since the engine does so at the start of
//! every batch.

use std::sync::Arc;

use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::dispatcher::{BatchReport, DispatchEngine};

/// Runs batch dispatch on a fixed interval until shut down.
pub struct BatchScheduler {
    engine: Arc<DispatchEngine>,
    runtime_handles: RwLock<RuntimeHandles>,
}

/// Handle of the background loop and its shutdown channel.
#[derive(Default)]
struct RuntimeHandles {
    dispatch_handle: Option<JoinHandle<()>>,
    shutdown_sender: Option<broadcast::Sender<()>>,
}

impl BatchScheduler {
    pub fn new(engine: Arc<DispatchEngine>) -> Self {
        Self {
            engine,
            runtime_handles: RwLock::new(RuntimeHandles::default()),
        }
    }

    /// Starts the background loop.
    ///
    /// Returns `false` without starting anything when the engine or batch
    /// dispatch is disabled, or when the loop is already running. The first
    /// batch runs immediately.
    pub async fn start(&self) -> bool {
        let config = self.engine.config();
        if !config.enabled() || !config.batch_enabled() {
            info!("Batch dispatch disabled, scheduler not started");
            return false;
        }

        let mut handles = self.runtime_handles.write().await;
        if handles.dispatch_handle.is_some() {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let engine = self.engine.clone();
        let period = config.batch_interval();

        let dispatch_handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                // A running batch is never interrupted; shutdown is seen between ticks.
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = engine.dispatch_batch().await;
                        debug!("Scheduled batch finished: {:?}", report);
                        if report == BatchReport::Disabled {
                            break;
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Batch scheduler shutdown requested");
                        break;
                    }
                }
            }
        });

        info!("Batch scheduler started (interval {:?})", period);
        handles.dispatch_handle = Some(dispatch_handle);
        handles.shutdown_sender = Some(shutdown_tx);
        true
    }

    /// Signals the loop to stop and waits for it, letting a running batch finish.
    pub async fn shutdown(&self) {
        let mut handles = self.runtime_handles.write().await;

        if let Some(sender) = handles.shutdown_sender.take() {
            let _ = sender.send(());
        }
        if let Some(handle) = handles.dispatch_handle.take() {
            let _ = handle.await;
        }
    }

    pub async fn is_running(&self) -> bool {
        self.runtime_handles
            .read()
            .await
            .dispatch_handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}
