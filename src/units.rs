// Vignette
// Copyright (c) 2026 The Vignette Developers.
//
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `units` module provides definitions for common units.

use std::fmt;

/// A `Timestamp` is an instant in time, in integer milliseconds, since the
/// start of a stream. Demuxer timestamps are converted to milliseconds exactly
/// once, at ingest, using the stream's [`TimeScale`].
pub type Timestamp = u64;

/// The reserved sentinel for a timestamp that has not been assigned.
pub const TIMESTAMP_INVALID: Timestamp = u64::MAX;

/// A `TimeScale` is the conversion factor between a demuxer's internal integer
/// timestamps ("ticks") and milliseconds.
///
/// In other words, a `TimeScale` is the number of ticks that make up one
/// millisecond. Conversion to milliseconds truncates.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeScale {
    ticks_per_ms: u64,
}

impl TimeScale {
    /// Creates a new `TimeScale`. Panics if `ticks_per_ms` is 0.
    pub fn new(ticks_per_ms: u64) -> Self {
        if ticks_per_ms == 0 {
            panic!("TimeScale cannot have 0 ticks per millisecond");
        }

        TimeScale { ticks_per_ms }
    }

    /// The number of ticks in one millisecond.
    pub fn ticks_per_ms(&self) -> u64 {
        self.ticks_per_ms
    }

    /// Convert a tick count into milliseconds. Truncates.
    pub fn ticks_to_ms(&self, ticks: u64) -> Timestamp {
        ticks / self.ticks_per_ms
    }

    /// Convert milliseconds into a tick count. Saturates on overflow.
    pub fn ms_to_ticks(&self, ms: Timestamp) -> u64 {
        ms.saturating_mul(self.ticks_per_ms)
    }
}

/// Formats a millisecond timestamp as `mm:ss.mmm` for log messages.
pub fn fmt_timestamp(ts: Timestamp) -> impl fmt::Display {
    struct Fmt(Timestamp);

    impl fmt::Display for Fmt {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            if self.0 == TIMESTAMP_INVALID {
                return write!(f, "--:--.---");
            }
            let minutes = self.0 / 60_000;
            let seconds = (self.0 % 60_000) / 1_000;
            let millis = self.0 % 1_000;
            write!(f, "{:0>2}:{:0>2}.{:0>3}", minutes, seconds, millis)
        }
    }

    Fmt(ts)
}

#[cfg(test)]
mod tests {
    use super::{fmt_timestamp, TimeScale, TIMESTAMP_INVALID};

    #[test]
    fn verify_time_scale() {
        // A WebM file with the default 1 ms timestamp scale.
        let ts1 = TimeScale::new(1);
        assert_eq!(ts1.ticks_to_ms(0), 0);
        assert_eq!(ts1.ticks_to_ms(12_345), 12_345);
        assert_eq!(ts1.ms_to_ticks(12_345), 12_345);

        // A 90 kHz tick clock (90 ticks per millisecond). Conversion truncates.
        let ts2 = TimeScale::new(90);
        assert_eq!(ts2.ticks_to_ms(89), 0);
        assert_eq!(ts2.ticks_to_ms(90), 1);
        assert_eq!(ts2.ticks_to_ms(179), 1);
        assert_eq!(ts2.ms_to_ticks(2), 180);

        // Overflow saturates rather than wrapping.
        assert_eq!(ts2.ms_to_ticks(u64::MAX), u64::MAX);
    }

    #[test]
    #[should_panic]
    fn verify_zero_time_scale_panics() {
        let _ = TimeScale::new(0);
    }

    #[test]
    fn verify_fmt_timestamp() {
        assert_eq!(format!("{}", fmt_timestamp(0)), "00:00.000");
        assert_eq!(format!("{}", fmt_timestamp(61_005)), "01:01.005");
        assert_eq!(format!("{}", fmt_timestamp(TIMESTAMP_INVALID)), "--:--.---");
    }
}
