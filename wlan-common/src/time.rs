// Copyright 2022 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Monotonic time for MAC state machines.
//!
//! All deadlines handled by the MAC are expressed as a [`Time`] relative to an
//! arbitrary epoch chosen by the scheduler driving the interface. Arithmetic
//! never panics on the ranges a MAC deals in (nanoseconds over the lifetime of
//! an interface).

use {
    std::ops::{Add, AddAssign, Mul, Sub},
    zerocopy::{AsBytes, FromBytes},
};

/// A point on the scheduler's monotonic clock, in nanoseconds since its epoch.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time(i64);

/// A signed span of time, in nanoseconds.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Time {
    pub const ZERO: Self = Time(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Time(nanos)
    }

    pub const fn into_nanos(self) -> i64 {
        self.0
    }
}

impl Duration {
    pub const ZERO: Self = Duration(0);

    pub const fn from_nanos(nanos: i64) -> Self {
        Duration(nanos)
    }

    pub const fn from_micros(micros: i64) -> Self {
        Duration(micros * 1_000)
    }

    pub const fn from_millis(millis: i64) -> Self {
        Duration(millis * 1_000_000)
    }

    pub const fn from_seconds(secs: i64) -> Self {
        Duration(secs * 1_000_000_000)
    }

    pub const fn into_nanos(self) -> i64 {
        self.0
    }

    pub const fn into_micros(self) -> i64 {
        self.0 / 1_000
    }
}

impl Add<Duration> for Time {
    type Output = Time;
    fn add(self, rhs: Duration) -> Time {
        Time(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Time {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<Time> for Time {
    type Output = Duration;
    fn sub(self, rhs: Time) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Add<Duration> for Duration {
    type Output = Duration;
    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Duration {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<Duration> for Duration {
    type Output = Duration;
    fn sub(self, rhs: Duration) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl Mul<i64> for Duration {
    type Output = Duration;
    fn mul(self, rhs: i64) -> Duration {
        Duration(self.0 * rhs)
    }
}

/// Sugar for constructing durations from integer literals: `10.millis()`.
pub trait DurationNum: Sized {
    fn nanos(self) -> Duration;
    fn micros(self) -> Duration;
    fn millis(self) -> Duration;
    fn seconds(self) -> Duration;
}

impl DurationNum for i64 {
    fn nanos(self) -> Duration {
        Duration::from_nanos(self)
    }

    fn micros(self) -> Duration {
        Duration::from_micros(self)
    }

    fn millis(self) -> Duration {
        Duration::from_millis(self)
    }

    fn seconds(self) -> Duration {
        Duration::from_seconds(self)
    }
}

/// IEEE Std 802.11-2016, 9.2.2: a time unit (TU) is 1024 microseconds.
/// Beacon intervals and listen intervals are expressed in TUs on the wire.
#[derive(
    AsBytes, FromBytes, Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[repr(C)]
pub struct TimeUnit(pub u16);

impl TimeUnit {
    pub const MICROS_PER_TIME_UNIT: i64 = 1024;
    pub const DEFAULT_BEACON_INTERVAL: Self = TimeUnit(100);

    pub const fn into_micros(self) -> i64 {
        self.0 as i64 * Self::MICROS_PER_TIME_UNIT
    }
}

impl From<TimeUnit> for Duration {
    fn from(tu: TimeUnit) -> Duration {
        Duration::from_micros(tu.into_micros())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_duration_arithmetic() {
        let t = Time::from_nanos(100) + 50.nanos();
        assert_eq!(t, Time::from_nanos(150));
        assert_eq!(t - Time::from_nanos(30), 120.nanos());
        assert_eq!(2.micros(), 2_000.nanos());
        assert_eq!(3.millis(), 3_000_000.nanos());
        assert_eq!(1.seconds(), 1_000.millis());
        assert_eq!(10.micros() * 3, 30.micros());
    }

    #[test]
    fn time_unit_conversion() {
        assert_eq!(Duration::from(TimeUnit(1)), 1024.micros());
        assert_eq!(
            Duration::from(TimeUnit::DEFAULT_BEACON_INTERVAL),
            (100 * 1024).micros()
        );
    }
}
