//! Trait definitions for hardware abstraction.
//!
//! This module defines the seams that let stepchain:
//! - Run on different hardware (Raspberry Pi GPIO, embedded-hal targets)
//! - Be tested on a desktop with recording mocks
//!
//! # Submodules
//!
//! - `hardware`: Output lines, byte transfers, hold delays
//!
//! # Hardware Abstraction
//!
//! The key hardware traits are:
//!
//! - [`OutputLine`]: The enable, data, clock and strobe lines of the output chain
//! - [`ByteTransfer`]: The SPI bus shared by every chip on the boards
//! - [`ShiftDelay`]: Hold times while bit-banging the chain

pub mod hardware;

pub use hardware::*;
