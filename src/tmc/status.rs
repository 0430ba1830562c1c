//! Decoded TMC26x status word.
//!
//! Every datagram sent to the chip clocks a 20-bit status word back. The
//! meaning of its top ten bits depends on the readout selected in DRVCONF.

use crate::tmc::registers::{drvconf, Field};

const STALL_GUARD: Field = Field::bit(0);
const OT_SHUTDOWN: Field = Field::bit(1);
const OT_WARNING: Field = Field::bit(2);
const SHORT_A: Field = Field::bit(3);
const SHORT_B: Field = Field::bit(4);
const OPEN_LOAD_A: Field = Field::bit(5);
const OPEN_LOAD_B: Field = Field::bit(6);
const STANDSTILL: Field = Field::bit(7);
const READOUT: Field = Field::new(10, 10);

/// What the readout bits of the status word report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReadoutSelect {
    /// Microstep position in the sine table.
    Position,
    /// Stall guard load measurement.
    #[default]
    StallGuard,
    /// Actual current scale and the high stall guard bits.
    CurrentAndStallGuardHigh,
}

impl ReadoutSelect {
    /// RDSEL code.
    pub const fn code(self) -> u32 {
        match self {
            ReadoutSelect::Position => 0,
            ReadoutSelect::StallGuard => 1,
            ReadoutSelect::CurrentAndStallGuardHigh => 2,
        }
    }

    /// Readout selected in a DRVCONF value. The reserved code 3 reads as
    /// [`CurrentAndStallGuardHigh`](Self::CurrentAndStallGuardHigh).
    pub fn from_driver_config(reg: u32) -> Self {
        match drvconf::RDSEL.get(reg) {
            0 => ReadoutSelect::Position,
            1 => ReadoutSelect::StallGuard,
            _ => ReadoutSelect::CurrentAndStallGuardHigh,
        }
    }
}

/// Over-temperature condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverTemperature {
    /// Within limits.
    Normal,
    /// Pre-warning threshold reached.
    Warning,
    /// Bridges shut down.
    Shutdown,
}

/// Readout bits interpreted for the readout that was selected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readout {
    /// Microstep position.
    Position(u16),
    /// Stall guard value; lower means more load.
    StallGuard(u16),
    /// Current scale reading (0..=31) and the upper five stall guard bits.
    Current {
        /// Actual current scale.
        scale: u8,
        /// Stall guard bits 9..5.
        stall_guard_high: u8,
    },
}

/// The last status word received from the chip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DriverStatus(u32);

impl DriverStatus {
    /// Status from the 24 bits clocked back during a transfer.
    pub fn from_response(frame: [u8; 3]) -> Self {
        let raw = (u32::from(frame[0]) << 16) | (u32::from(frame[1]) << 8) | u32::from(frame[2]);
        Self(raw >> 4)
    }

    /// Status from an already aligned 20-bit word.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw & 0xF_FFFF)
    }

    /// The 20 status bits.
    #[inline]
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Stall guard threshold reached.
    #[inline]
    pub fn stall_guard_reached(&self) -> bool {
        STALL_GUARD.is_set(self.0)
    }

    /// Over-temperature shutdown active.
    #[inline]
    pub fn over_temperature_shutdown(&self) -> bool {
        OT_SHUTDOWN.is_set(self.0)
    }

    /// Over-temperature pre-warning active.
    #[inline]
    pub fn over_temperature_warning(&self) -> bool {
        OT_WARNING.is_set(self.0)
    }

    /// Most severe over-temperature condition reported.
    pub fn over_temperature(&self) -> OverTemperature {
        if self.over_temperature_shutdown() {
            OverTemperature::Shutdown
        } else if self.over_temperature_warning() {
            OverTemperature::Warning
        } else {
            OverTemperature::Normal
        }
    }

    /// Coil A shorted to ground.
    #[inline]
    pub fn short_to_ground_a(&self) -> bool {
        SHORT_A.is_set(self.0)
    }

    /// Coil B shorted to ground.
    #[inline]
    pub fn short_to_ground_b(&self) -> bool {
        SHORT_B.is_set(self.0)
    }

    /// Coil A open.
    #[inline]
    pub fn open_load_a(&self) -> bool {
        OPEN_LOAD_A.is_set(self.0)
    }

    /// Coil B open.
    #[inline]
    pub fn open_load_b(&self) -> bool {
        OPEN_LOAD_B.is_set(self.0)
    }

    /// No step pulse for 2^20 clocks.
    #[inline]
    pub fn standstill(&self) -> bool {
        STANDSTILL.is_set(self.0)
    }

    /// The raw ten readout bits.
    #[inline]
    pub fn readout_value(&self) -> u16 {
        READOUT.get(self.0) as u16
    }

    /// Current scale reading (low five readout bits).
    #[inline]
    pub fn current_scale(&self) -> u8 {
        (self.readout_value() & 0x1F) as u8
    }

    /// Readout interpreted for `select`.
    pub fn readout(&self, select: ReadoutSelect) -> Readout {
        let value = self.readout_value();
        match select {
            ReadoutSelect::Position => Readout::Position(value),
            ReadoutSelect::StallGuard => Readout::StallGuard(value),
            ReadoutSelect::CurrentAndStallGuardHigh => Readout::Current {
                scale: (value & 0x1F) as u8,
                stall_guard_high: ((value >> 5) & 0x1F) as u8,
            },
        }
    }
}
