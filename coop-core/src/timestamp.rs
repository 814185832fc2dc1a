// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Display;
#[cfg(not(any(test, feature = "test_utils")))]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(any(test, feature = "test_utils"))]
use mock_instant::thread_local::{SystemTime, UNIX_EPOCH};
use serde::{Deserialize, Serialize};

/// Microseconds since the UNIX epoch based on system time.
///
/// With the `test_utils` feature enabled the time is read from a thread-local mock clock which
/// starts at the epoch and only moves when a test advances it.
#[derive(
    Copy, Clone, Default, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn now() -> Self {
        // A clock set before the epoch is treated as the epoch.
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|duration| duration.as_micros() as u64)
            .unwrap_or_default();
        Self(micros)
    }

    /// Smallest timestamp which is strictly later than this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<Timestamp> for u64 {
    fn from(value: Timestamp) -> Self {
        value.0
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
