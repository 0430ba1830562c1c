//! Board and driver configuration.
//!
//! Plain data in a builder style, so a deployment can describe its boards
//! in code or (with the `serde` feature) load them from a file.
//!
//! # Example
//!
//! ```rust
//! use stepchain::config::{ChopperConfig, Config, TmcConfig};
//!
//! // One board, defaults everywhere
//! let config = Config::default();
//! assert_eq!(config.chain.boards, 1);
//!
//! // Two boards, a quiet motor in slot 3 of board 2
//! let config = Config::default()
//!     .with_boards(2)
//!     .with_motor(
//!         TmcConfig::new(2, 3)
//!             .with_current_ma(700)
//!             .with_microsteps(64)
//!             .with_chopper(ChopperConfig::spread_cycle())
//!             .with_random_off_time(true),
//!     );
//! assert!(config.validate().is_ok());
//! ```

use alloc::vec::Vec;

use crate::addressing::SlotAddress;
use crate::error::{ChainError, Error};
use crate::hal::SpinDelay;
use crate::tmc::CoolStepLimit;

// ============================================================================
// Main Config
// ============================================================================

/// Complete configuration of one chain and the chips on it.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Output chain configuration
    pub chain: ChainConfig,
    /// Motor drivers, one per occupied slot
    pub motors: Vec<TmcConfig>,
    /// Thermocouple readers, one per occupied slot
    pub thermocouples: Vec<SlotConfig>,
}

impl Config {
    /// Set the chain configuration
    pub fn with_chain(mut self, chain: ChainConfig) -> Self {
        self.chain = chain;
        self
    }

    /// Set the number of boards on the chain
    pub fn with_boards(mut self, boards: usize) -> Self {
        self.chain.boards = boards;
        self
    }

    /// Add a motor driver
    pub fn with_motor(mut self, motor: TmcConfig) -> Self {
        self.motors.push(motor);
        self
    }

    /// Add a thermocouple reader
    pub fn with_thermocouple(mut self, slot: SlotConfig) -> Self {
        self.thermocouples.push(slot);
        self
    }

    /// Check that every chip sits on a valid slot of a board on the chain
    /// and that no slot is used twice.
    pub fn validate(&self) -> Result<(), ChainError> {
        if self.chain.boards < 1 {
            return Err(Error::InvalidParameter);
        }
        let slots: Vec<SlotAddress> = self
            .motors
            .iter()
            .map(TmcConfig::address)
            .chain(self.thermocouples.iter().map(SlotConfig::address))
            .collect::<Result<_, _>>()?;

        for (i, slot) in slots.iter().enumerate() {
            if usize::from(slot.board()) > self.chain.boards || slots[..i].contains(slot) {
                return Err(Error::InvalidParameter);
            }
        }
        Ok(())
    }
}

// ============================================================================
// Chain Config
// ============================================================================

/// Output chain configuration
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChainConfig {
    /// Number of daisy-chained boards
    pub boards: usize,
    /// Busy-wait calibration for [`SpinDelay`]
    pub spins_per_us: u32,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            boards: 1,
            spins_per_us: SpinDelay::DEFAULT_SPINS_PER_US,
        }
    }
}

impl ChainConfig {
    /// Set the number of boards
    pub fn with_boards(mut self, boards: usize) -> Self {
        self.boards = boards;
        self
    }

    /// Set the busy-wait calibration
    pub fn with_spins_per_us(mut self, spins: u32) -> Self {
        self.spins_per_us = spins;
        self
    }

    /// Hold-time strategy for this calibration
    pub fn delay(&self) -> SpinDelay {
        SpinDelay::new(self.spins_per_us)
    }
}

// ============================================================================
// Slot Config
// ============================================================================

/// Location of a single-slot chip
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotConfig {
    /// Board number, from 1
    pub board: u8,
    /// Slot number, 1..=4
    pub slot: u8,
}

impl SlotConfig {
    /// Chip on `slot` of `board`
    pub fn new(board: u8, slot: u8) -> Self {
        Self { board, slot }
    }

    /// Validated address
    pub fn address(&self) -> Result<SlotAddress, ChainError> {
        SlotAddress::new(self.board, self.slot)
    }
}

// ============================================================================
// Motor Driver Config
// ============================================================================

/// Default sense resistor on the slot boards, in milliohms.
pub const DEFAULT_SENSE_RESISTOR_MOHM: u32 = 91;

/// Default peak motor current in milliamps.
pub const DEFAULT_CURRENT_MA: u32 = 1000;

/// Default microstep resolution.
pub const DEFAULT_MICROSTEPS: u16 = 32;

/// Settings a TMC26x driver is brought up with.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TmcConfig {
    /// Board number, from 1
    pub board: u8,
    /// Slot number, 1..=4
    pub slot: u8,
    /// Sense resistor in milliohms
    pub sense_resistor_mohm: u32,
    /// Peak motor current in milliamps
    pub current_ma: u32,
    /// Microsteps per full step
    pub microsteps: u16,
    /// Chopper mode and timing
    pub chopper: ChopperConfig,
    /// Stall detection tuning (chip defaults if `None`)
    pub stall_guard: Option<StallGuardConfig>,
    /// Adaptive current control (off if `None`)
    pub cool_step: Option<CoolStepConfig>,
    /// Randomize the chopper off time
    pub random_off_time: bool,
}

impl Default for TmcConfig {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl TmcConfig {
    /// Driver on `slot` of `board` with default settings
    pub fn new(board: u8, slot: u8) -> Self {
        Self {
            board,
            slot,
            sense_resistor_mohm: DEFAULT_SENSE_RESISTOR_MOHM,
            current_ma: DEFAULT_CURRENT_MA,
            microsteps: DEFAULT_MICROSTEPS,
            chopper: ChopperConfig::default(),
            stall_guard: None,
            cool_step: None,
            random_off_time: false,
        }
    }

    /// Validated slot address
    pub fn address(&self) -> Result<SlotAddress, ChainError> {
        SlotAddress::new(self.board, self.slot)
    }

    /// Set the sense resistor value
    pub fn with_sense_resistor_mohm(mut self, mohm: u32) -> Self {
        self.sense_resistor_mohm = mohm;
        self
    }

    /// Set the peak current
    pub fn with_current_ma(mut self, ma: u32) -> Self {
        self.current_ma = ma;
        self
    }

    /// Set the microstep resolution
    pub fn with_microsteps(mut self, microsteps: u16) -> Self {
        self.microsteps = microsteps;
        self
    }

    /// Set the chopper configuration
    pub fn with_chopper(mut self, chopper: ChopperConfig) -> Self {
        self.chopper = chopper;
        self
    }

    /// Set the stall detection tuning
    pub fn with_stall_guard(mut self, stall_guard: StallGuardConfig) -> Self {
        self.stall_guard = Some(stall_guard);
        self
    }

    /// Set the adaptive current control
    pub fn with_cool_step(mut self, cool_step: CoolStepConfig) -> Self {
        self.cool_step = Some(cool_step);
        self
    }

    /// Enable or disable random off time
    pub fn with_random_off_time(mut self, random: bool) -> Self {
        self.random_off_time = random;
        self
    }
}

/// Chopper mode and timing.
///
/// Values are given in chip units and are clamped when applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case", tag = "mode"))]
pub enum ChopperConfig {
    /// Constant off-time with fast decay.
    ConstantOffTime {
        /// Off time, 2..=15
        off_time: u8,
        /// Blank time in clocks (16, 24, 36 or 54)
        blank_time: u8,
        /// Fast decay time, 0..=15
        fast_decay: u8,
        /// Sine wave offset, -3..=12
        sine_offset: i8,
        /// Terminate fast decay on the current comparator
        use_comparator: bool,
    },
    /// Spread-cycle hysteresis chopper.
    SpreadCycle {
        /// Off time, 2..=15
        off_time: u8,
        /// Blank time in clocks (16, 24, 36 or 54)
        blank_time: u8,
        /// Hysteresis start, 1..=8
        hysteresis_start: u8,
        /// Hysteresis end, -3..=12
        hysteresis_end: i8,
        /// Hysteresis decrement interval, 0..=3
        hysteresis_decrement: u8,
    },
}

impl Default for ChopperConfig {
    fn default() -> Self {
        ChopperConfig::ConstantOffTime {
            off_time: 7,
            blank_time: 54,
            fast_decay: 13,
            sine_offset: 12,
            use_comparator: true,
        }
    }
}

impl ChopperConfig {
    /// A moderate spread-cycle setting
    pub fn spread_cycle() -> Self {
        ChopperConfig::SpreadCycle {
            off_time: 4,
            blank_time: 36,
            hysteresis_start: 4,
            hysteresis_end: 0,
            hysteresis_decrement: 0,
        }
    }

    /// Off time carried by either mode
    pub fn off_time(&self) -> u8 {
        match *self {
            ChopperConfig::ConstantOffTime { off_time, .. }
            | ChopperConfig::SpreadCycle { off_time, .. } => off_time,
        }
    }
}

/// Stall detection tuning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StallGuardConfig {
    /// Threshold, -64..=63; higher is less sensitive
    pub threshold: i8,
    /// Filter over four full steps
    pub filter: bool,
}

/// Adaptive current control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CoolStepConfig {
    /// Lower stall guard threshold, 0..=480
    pub lower_threshold: u16,
    /// Hysteresis above the lower threshold, 0..=480
    pub hysteresis: u16,
    /// Current decrement speed, 0..=3
    pub decrement_speed: u8,
    /// Current increment size, 0..=3
    pub increment_size: u8,
    /// Floor for the reduced current
    pub lower_current_limit: CoolStepLimit,
    /// Switch CoolStep on after configuring it
    pub enabled: bool,
}

impl Default for CoolStepConfig {
    fn default() -> Self {
        Self {
            lower_threshold: 480,
            hysteresis: 224,
            decrement_speed: 0,
            increment_size: 1,
            lower_current_limit: CoolStepLimit::Half,
            enabled: true,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.chain.boards, 1);
        assert!(config.motors.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn tmc_defaults_match_board() {
        let tmc = TmcConfig::default();
        assert_eq!(tmc.sense_resistor_mohm, 91);
        assert_eq!(tmc.current_ma, 1000);
        assert_eq!(tmc.microsteps, 32);
        assert_eq!(tmc.chopper.off_time(), 7);
        assert!(tmc.stall_guard.is_none());
        assert!(!tmc.random_off_time);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::default()
            .with_chain(ChainConfig::default().with_boards(3).with_spins_per_us(10))
            .with_motor(TmcConfig::new(3, 4).with_current_ma(500))
            .with_thermocouple(SlotConfig::new(1, 2));

        assert_eq!(config.chain.boards, 3);
        assert_eq!(config.chain.delay(), SpinDelay::new(10));
        assert_eq!(config.motors[0].current_ma, 500);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_board() {
        let config = Config::default().with_motor(TmcConfig::new(2, 1));
        assert_eq!(config.validate(), Err(Error::InvalidParameter));
    }

    #[test]
    fn validate_rejects_bad_slot() {
        let config = Config::default().with_motor(TmcConfig::new(1, 5));
        assert_eq!(config.validate(), Err(Error::InvalidParameter));
    }

    #[test]
    fn validate_rejects_shared_slot() {
        let config = Config::default()
            .with_motor(TmcConfig::new(1, 2))
            .with_thermocouple(SlotConfig::new(1, 2));
        assert_eq!(config.validate(), Err(Error::InvalidParameter));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn config_from_json() {
        let json = r#"{
            "chain": { "boards": 2, "spins_per_us": 500 },
            "motors": [{
                "board": 2, "slot": 1,
                "sense_resistor_mohm": 150, "current_ma": 1200, "microsteps": 16,
                "chopper": {
                    "mode": "spread_cycle", "off_time": 5, "blank_time": 36,
                    "hysteresis_start": 3, "hysteresis_end": 2, "hysteresis_decrement": 1
                },
                "stall_guard": { "threshold": -4, "filter": true },
                "cool_step": null,
                "random_off_time": false
            }],
            "thermocouples": [{ "board": 1, "slot": 4 }]
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chain.boards, 2);
        assert_eq!(config.motors[0].sense_resistor_mohm, 150);
        assert_eq!(config.motors[0].chopper.off_time(), 5);
        assert_eq!(config.motors[0].stall_guard.unwrap().threshold, -4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_boards() {
        let config = Config::default().with_boards(0);
        assert_eq!(config.validate(), Err(Error::InvalidParameter));
    }
}
