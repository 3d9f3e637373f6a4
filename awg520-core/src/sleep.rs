//! How the driver waits out instrument settle times. Every wait goes
//! through the [`Sleep`] trait, so a handle on an emulated link can run with
//! zero settle times and tests never block on the wall clock.

use core::time::Duration;

pub use spin_sleep::SpinSleeper;

/// Waits out one settle interval.
pub trait Sleep: core::fmt::Debug {
    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

impl Sleep for Box<dyn Sleep> {
    fn sleep(&self, duration: Duration) {
        self.as_ref().sleep(duration);
    }
}

/// Waits with [`std::thread::sleep`]. Accurate enough for the
/// millisecond-scale settle times the instrument needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StdSleeper;

impl Sleep for StdSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// [`spin_sleep`]'s hybrid sleeper, for hosts whose scheduler overshoots
/// the short post-jump settle time.
impl Sleep for SpinSleeper {
    fn sleep(&self, duration: Duration) {
        SpinSleeper::sleep(*self, duration);
    }
}
