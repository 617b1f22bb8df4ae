//! Rounding of report durations to whole minutes.
//!
//! Seconds in [0, 29] round down, [30, 59] round up. Any carry out of the
//! minutes column moves into hours.

use crate::parser::RawDuration;

/// Seconds at or above this value round up to the next minute.
const ROUND_UP_AT_SECS: u32 = 30;

/// A duration rounded to whole minutes. `minutes` is always in [0, 59].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundedDuration {
    pub hours: u32,
    pub minutes: u32,
}

impl RoundedDuration {
    /// Build from a total minute count.
    pub fn from_total_minutes(total: u32) -> Self {
        Self {
            hours: total / 60,
            minutes: total % 60,
        }
    }

    pub fn total_minutes(&self) -> u32 {
        self.hours * 60 + self.minutes
    }
}

/// Round a raw report duration to the nearest minute, half up.
pub fn round_duration(raw: &RawDuration) -> RoundedDuration {
    let mut total = raw.hours() * 60 + raw.minutes();
    if raw.seconds() >= ROUND_UP_AT_SECS {
        total += 1;
    }
    RoundedDuration::from_total_minutes(total)
}
