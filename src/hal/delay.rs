//! Hold-time strategies for the bit-banged chain lines.

use crate::traits::ShiftDelay;

/// Skips every hold. For tests and for lines slow enough on their own.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NoDelay;

impl ShiftDelay for NoDelay {
    #[inline]
    fn hold_ns(&mut self, _ns: u32) {}
}

/// Busy-waits with [`core::hint::spin_loop`].
///
/// `spins_per_us` is a rough calibration for the target CPU; holds are
/// rounded up to at least one spin.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SpinDelay {
    spins_per_us: u32,
}

impl SpinDelay {
    /// Calibration that comfortably covers a 1 GHz application core.
    pub const DEFAULT_SPINS_PER_US: u32 = 1000;

    /// Create a delay with an explicit calibration.
    pub const fn new(spins_per_us: u32) -> Self {
        Self { spins_per_us }
    }

    /// Number of spins used for a hold of `ns` nanoseconds.
    pub fn spins(&self, ns: u32) -> u64 {
        let spins = (u64::from(ns) * u64::from(self.spins_per_us)).div_ceil(1000);
        spins.max(1)
    }
}

impl Default for SpinDelay {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SPINS_PER_US)
    }
}

impl ShiftDelay for SpinDelay {
    fn hold_ns(&mut self, ns: u32) {
        for _ in 0..self.spins(ns) {
            core::hint::spin_loop();
        }
    }
}
