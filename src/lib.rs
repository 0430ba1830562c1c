//! # stepchain
//!
//! Drivers for DICE slot boards: a daisy-chained shift-register output bus
//! and the TMC26x stepper drivers and thermocouple readers selected
//! through it.
//!
//! ## Features
//!
//! - **Buffered output chain**: set and clear any output in memory, then
//!   latch them all at once
//! - **TMC26x register model**: shadow registers, current and chopper
//!   encoding, CoolStep, stall guard and status readback
//! - **Thermocouple reader**: three converters per slot, multiplexed
//!   through the slot lines
//! - **Hardware abstraction**: small traits with recording mocks for
//!   desktop testing and `embedded-hal` adapters for real targets
//!
//! ## Architecture
//!
//! - `traits` - Output line, byte transfer and delay abstractions
//! - `chain` - The shift-register output chain
//! - `addressing` - Board/slot to chain output mapping
//! - `bus` - The shared chain + SPI handle chips talk through
//! - `tmc` - TMC26x driver
//! - `thermocouple` - Thermocouple slot reader
//! - `config` - Board and driver configuration
//! - `hal` - Mocks, delays and `embedded-hal` adapters
//!
//! ## Example
//!
//! ```rust
//! use stepchain::{Bus, Direction, IoChain, Tmc26x, ReadoutSelect};
//! use stepchain::config::TmcConfig;
//! use stepchain::hal::{LineLog, NoDelay};
//!
//! // One board on the chain
//! let log = LineLog::new();
//! let mut chain = IoChain::new(log.chain_lines(), NoDelay);
//! chain.init(1).unwrap();
//! let mut bus = Bus::new(chain, log.spi());
//!
//! // A motor driver in slot 1
//! let mut motor = Tmc26x::new(&mut bus, TmcConfig::new(1, 1).with_current_ma(800)).unwrap();
//! motor.start(&mut bus).unwrap();
//! motor.set_direction(&mut bus, Direction::Forward).unwrap();
//! motor.step(&mut bus).unwrap();
//!
//! let status = motor.read_status(&mut bus, ReadoutSelect::StallGuard).unwrap();
//! assert!(!status.over_temperature_shutdown());
//! ```

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]

extern crate alloc;

/// Board/slot addressing on the output chain.
pub mod addressing;
/// Shared chain + SPI resource handle.
pub mod bus;
/// Shift-register output chain.
pub mod chain;
/// Board and driver configuration.
pub mod config;
/// Error types.
pub mod error;
/// Hardware abstraction layer with mock implementations for testing.
pub mod hal;
/// Thermocouple slot reader.
pub mod thermocouple;
/// TMC26x stepper driver register model.
pub mod tmc;
/// Core traits for hardware abstraction.
pub mod traits;

// Re-exports for convenience
pub use addressing::{Signal, SlotAddress};
pub use bus::{Bus, ChipBus};
pub use chain::{ChainLines, IoChain, BITS_PER_BOARD};
pub use config::{ChainConfig, ChopperConfig, Config, CoolStepConfig, StallGuardConfig, TmcConfig};
pub use error::{ChainError, Error};
pub use thermocouple::{Thermocouple, ThermocoupleFrame};
pub use tmc::{
    CoolStepLimit, DriverStatus, OverTemperature, Readout, ReadoutSelect, Tmc26x,
};
pub use traits::{ByteTransfer, Direction, OutputLine, ShiftDelay};
