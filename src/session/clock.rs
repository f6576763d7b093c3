//! Wall-clock source for credential timestamps.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in milliseconds.
pub trait WallClock: Send + Sync + fmt::Debug {
    fn now_unix_millis(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now_unix_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX)
            })
    }
}

#[cfg(test)]
pub(crate) use manual::ManualWallClock;
