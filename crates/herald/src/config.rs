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

//! Configuration for the dispatch engine.
//!
//! All options are resolved when the engine is constructed; nothing is read
//! lazily at call time.
//!
//! ```rust,ignore
//! let config = DispatchConfig::builder()
//!     .enabled(true)
//!     .batch_size(100)
//!     .retry_delay(Duration::from_secs(600))
//!     .build()?;
//! ```

use std::time::Duration;

use crate::error::ConfigError;
use crate::models::ClaimRequest;

/// Configuration for the [`DispatchEngine`](crate::dispatcher::DispatchEngine).
///
/// Use [`DispatchConfig::builder()`] to create one; `build()` validates it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct DispatchConfig {
    enabled: bool,
    realtime_enabled: bool,
    batch_enabled: bool,
    batch_interval: Duration,
    batch_size: usize,
    max_attempts: u32,
    retry_delay: Duration,
    max_queue_size: usize,
    max_success_age: Duration,
    history_retention: Duration,
    stale_after: Duration,
}

impl DispatchConfig {
    /// Creates a new configuration builder with default values.
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }

    /// Master switch. When off, enqueues are dropped and the scheduler never fires.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether an enqueue immediately attempts a single-URL publish.
    pub fn realtime_enabled(&self) -> bool {
        self.realtime_enabled
    }

    /// Whether scheduled batch dispatch runs.
    pub fn batch_enabled(&self) -> bool {
        self.batch_enabled
    }

    /// Period between two scheduled batch runs.
    pub fn batch_interval(&self) -> Duration {
        self.batch_interval
    }

    /// Maximum number of entries claimed per batch run.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Attempts after which a failing entry is dead-lettered.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Minimum delay before a failed entry is claimed again.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    /// Pending-entry ceiling above which health degrades.
    pub fn max_queue_size(&self) -> usize {
        self.max_queue_size
    }

    /// Maximum age of the last success while work is pending.
    pub fn max_success_age(&self) -> Duration {
        self.max_success_age
    }

    /// How long succeeded and dead-lettered entries are kept by housekeeping.
    pub fn history_retention(&self) -> Duration {
        self.history_retention
    }

    /// Age after which an `InProgress` claim is presumed lost and released
    /// back to `Failed` at the start of the next batch. Must exceed the
    /// publisher's request timeout.
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Claim parameters for a batch run.
    pub fn batch_claim(&self) -> ClaimRequest {
        ClaimRequest {
            limit: self.batch_size,
            max_attempts: self.max_attempts,
            retry_delay: to_chrono(self.retry_delay),
        }
    }

    /// Claim parameters for a single real-time dispatch.
    pub fn realtime_claim(&self) -> ClaimRequest {
        ClaimRequest {
            limit: 1,
            ..self.batch_claim()
        }
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroMaxAttempts);
        }
        if self.batch_interval.is_zero() {
            return Err(ConfigError::ZeroBatchInterval);
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroMaxQueueSize);
        }
        if self.stale_after.is_zero() {
            return Err(ConfigError::ZeroStaleAfter);
        }
        Ok(())
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfigBuilder::default().config
    }
}

/// Converts a std duration into a chrono one, saturating on overflow.
pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Builder for [`DispatchConfig`].
#[derive(Debug, Clone)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl Default for DispatchConfigBuilder {
    fn default() -> Self {
        Self {
            config: DispatchConfig {
                enabled: false,
                realtime_enabled: true,
                batch_enabled: true,
                batch_interval: Duration::from_secs(30 * 60),
                batch_size: 50,
                max_attempts: 5,
                retry_delay: Duration::from_secs(30 * 60),
                max_queue_size: 500,
                max_success_age: Duration::from_secs(7 * 24 * 3600),
                history_retention: Duration::from_secs(7 * 24 * 3600),
                stale_after: Duration::from_secs(3600),
            },
        }
    }
}

impl DispatchConfigBuilder {
    /// Enables or disables the whole engine.
    pub fn enabled(mut self, value: bool) -> Self {
        self.config.enabled = value;
        self
    }

    /// Enables or disables real-time dispatch on enqueue.
    pub fn realtime_enabled(mut self, value: bool) -> Self {
        self.config.realtime_enabled = value;
        self
    }

    /// Enables or disables scheduled batch dispatch.
    pub fn batch_enabled(mut self, value: bool) -> Self {
        self.config.batch_enabled = value;
        self
    }

    /// Sets the batch interval.
    pub fn batch_interval(mut self, value: Duration) -> Self {
        self.config.batch_interval = value;
        self
    }

    /// Sets the batch size.
    pub fn batch_size(mut self, value: usize) -> Self {
        self.config.batch_size = value;
        self
    }

    /// Sets the attempt budget.
    pub fn max_attempts(mut self, value: u32) -> Self {
        self.config.max_attempts = value;
        self
    }

    /// Sets the retry delay.
    pub fn retry_delay(mut self, value: Duration) -> Self {
        self.config.retry_delay = value;
        self
    }

    /// Sets the health ceiling on pending entries.
    pub fn max_queue_size(mut self, value: usize) -> Self {
        self.config.max_queue_size = value;
        self
    }

    /// Sets the health staleness threshold.
    pub fn max_success_age(mut self, value: Duration) -> Self {
        self.config.max_success_age = value;
        self
    }

    /// Sets the housekeeping retention window.
    pub fn history_retention(mut self, value: Duration) -> Self {
        self.config.history_retention = value;
        self
    }

    /// Sets the age after which in-progress claims are released.
    pub fn stale_after(mut self, value: Duration) -> Self {
        self.config.stale_after = value;
        self
    }

    /// Validates and returns the configuration.
    pub fn build(self) -> Result<DispatchConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}
