use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// Nanosecond-precision duration used as the value type of build metrics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeInterval(u64);

impl TimeInterval {
    pub const ZERO: TimeInterval = TimeInterval(0);

    pub fn ns(nanos: u64) -> Self {
        TimeInterval(nanos)
    }

    pub fn ms(millis: u64) -> Self {
        TimeInterval(millis.saturating_mul(1_000_000))
    }

    pub fn as_ns(&self) -> u64 {
        self.0
    }

    pub fn as_ms(&self) -> u64 {
        self.0 / 1_000_000
    }
}

impl From<Duration> for TimeInterval {
    fn from(d: Duration) -> Self {
        TimeInterval(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
    }
}

impl Add for TimeInterval {
    type Output = TimeInterval;

    fn add(self, rhs: TimeInterval) -> TimeInterval {
        TimeInterval(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for TimeInterval {
    fn add_assign(&mut self, rhs: TimeInterval) {
        *self = *self + rhs;
    }
}

impl Sum for TimeInterval {
    fn sum<I: Iterator<Item = TimeInterval>>(iter: I) -> Self {
        iter.fold(TimeInterval::ZERO, Add::add)
    }
}

impl fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ms", self.as_ms())
    }
}
