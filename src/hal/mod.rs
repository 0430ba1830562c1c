//! Hardware Abstraction Layer implementations.
//!
//! This module contains concrete implementations of the traits
//! defined in [`crate::traits`].
//!
//! # Available Implementations
//!
//! - `mock`: Recording test doubles for desktop development
//! - `delay`: [`NoDelay`] and [`SpinDelay`] hold strategies
//! - `embedded`: Adapters for `embedded-hal` 1.0 pins, buses and delays (requires `hal` feature)

pub mod delay;
pub mod mock;

#[cfg(feature = "hal")]
pub mod embedded;

pub use delay::*;
pub use mock::*;

#[cfg(feature = "hal")]
pub use embedded::*;
