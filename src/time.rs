// Defines a trait for time-like objects used to pace the relay experiment
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use core::any::Any;
use core::fmt::Debug;
use core::ops::Add;
use core::time::Duration;

/// A trait for time-like objects that can be used to measure elapsed time.
///
/// The adaptive controller itself is driven by an external scheduler and never looks at the
/// clock. The relay autotuner does: it compares the time elapsed since its last sample to its
/// sample time and ignores calls that arrive early, and it measures the oscillation period
/// between detected peaks.
pub trait InstantLike:
    Sized + Add<Duration, Output = Self> + Clone + Copy + Debug + PartialEq<Self> + Send + Sync + Any
{
    /// Returns the amount of time elapsed from another instant to this one.
    ///
    /// Implementations saturate to zero when `earlier` is actually later than `self`.
    #[must_use]
    fn duration_since(&self, earlier: Self) -> Duration;
}

/// Milliseconds since an arbitrary epoch, e.g. the tick counter of the sampling daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Millis(pub u64);

impl InstantLike for Millis {
    fn duration_since(&self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Millis {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        Millis(self.0.saturating_add(millis))
    }
}

/// Seconds since an arbitrary epoch, as handed out by most scripting-side schedulers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Seconds(pub f64);

impl InstantLike for Seconds {
    fn duration_since(&self, earlier: Self) -> Duration {
        let secs = self.0 - earlier.0;
        // NaN fails this comparison too and saturates with the backwards case
        if secs > 0.0 && secs.is_finite() {
            Duration::from_secs_f64(secs)
        } else {
            Duration::ZERO
        }
    }
}

impl Add<Duration> for Seconds {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Seconds(self.0 + rhs.as_secs_f64())
    }
}

impl Seconds {
    /// Returns the underlying seconds.
    pub fn as_secs_f64(&self) -> f64 {
        self.0
    }
}

#[cfg(feature = "std")]
mod std_instant {

    use super::{Add, Duration, InstantLike};

    /// A convenient wrapper around `std::time::Instant` satisfying the `InstantLike` trait.
    #[derive(Debug, Clone, Copy, PartialEq)]
    pub struct StdInstant(pub std::time::Instant);

    impl StdInstant {
        /// Captures the current instant.
        pub fn now() -> Self {
            StdInstant(std::time::Instant::now())
        }
    }

    impl InstantLike for StdInstant {
        fn duration_since(&self, other: Self) -> Duration {
            self.0.saturating_duration_since(other.0)
        }
    }

    impl Add<Duration> for StdInstant {
        type Output = Self;

        fn add(self, rhs: Duration) -> Self::Output {
            StdInstant(self.0 + rhs)
        }
    }

    #[cfg(test)]
    #[test]
    fn test_std_instant_wrapper() {
        let start = StdInstant::now();
        let end = StdInstant(std::time::Instant::now());
        assert_eq!(end.duration_since(start), end.0.duration_since(start.0));
        // Backwards queries saturate instead of panicking
        assert_eq!(start.duration_since(end + Duration::from_secs(1)), Duration::ZERO);
    }
}

#[cfg(feature = "std")]
pub use std_instant::StdInstant;
