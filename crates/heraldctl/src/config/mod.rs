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

//! Configuration file handling for `heraldctl`.
//!
//! The file is TOML with three optional sections, `[dispatch]`, `[store]`
//! and `[publisher]`. Values may reference environment variables with
//! `${VAR}`, `${VAR:-default}` or `${VAR:?message}`.

pub mod duration;
pub mod error;
pub mod loader;
pub mod types;

pub use duration::parse_std_duration;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use types::{HeraldConfig, StoreBackend};
