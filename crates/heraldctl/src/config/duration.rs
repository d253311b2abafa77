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

//! Human-friendly duration strings.

use anyhow::{anyhow, Context, Result};
use chrono::Duration;

/// Parse a duration string like "30m", "7d", "1h30m" into a chrono::Duration.
///
/// Supported units:
/// - `d` - days
/// - `h` - hours
/// - `m` - minutes
/// - `s` - seconds
///
/// Examples:
/// - "30m" -> 30 minutes
/// - "7d12h" -> 7 days and 12 hours
pub fn parse_duration(s: &str) -> Result<Duration> {
    let total = parse_duration_allow_zero(s)?;
    if total == Duration::zero() {
        return Err(anyhow!("Duration must be greater than zero"));
    }
    Ok(total)
}

/// Like [`parse_duration`], but accepts `"0s"` and friends.
pub fn parse_duration_allow_zero(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();
    if s.is_empty() {
        return Err(anyhow!("Duration string cannot be empty"));
    }

    let mut total = Duration::zero();
    let mut current_num = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current_num.push(c);
            continue;
        }
        if current_num.is_empty() {
            return Err(anyhow!(
                "Invalid duration format: expected number before '{}'",
                c
            ));
        }

        let num: i64 = current_num
            .parse()
            .with_context(|| format!("Invalid number in duration: {}", current_num))?;
        current_num.clear();

        let part = match c {
            'd' => Duration::try_days(num),
            'h' => Duration::try_hours(num),
            'm' => Duration::try_minutes(num),
            's' => Duration::try_seconds(num),
            _ => return Err(anyhow!("Unknown duration unit: '{}'. Use d, h, m, or s", c)),
        };
        total = part
            .and_then(|part| total.checked_add(&part))
            .ok_or_else(|| anyhow!("Duration '{}' is too large", s))?;
    }

    if !current_num.is_empty() {
        return Err(anyhow!(
            "Duration '{}' is missing a unit. Use d (days), h (hours), m (minutes), or s (seconds)",
            s
        ));
    }

    Ok(total)
}

/// Like [`parse_duration`], returning a std duration.
pub fn parse_std_duration(s: &str) -> Result<std::time::Duration> {
    to_std(s, parse_duration(s)?)
}

/// Like [`parse_duration_allow_zero`], returning a std duration.
pub fn parse_std_duration_allow_zero(s: &str) -> Result<std::time::Duration> {
    to_std(s, parse_duration_allow_zero(s)?)
}

fn to_std(s: &str, duration: Duration) -> Result<std::time::Duration> {
    duration
        .to_std()
        .map_err(|e| anyhow!("Duration '{}' is out of range: {}", s, e))
}
