//! Adapters from `embedded-hal` 1.0 to the crate's hardware traits.
//!
//! Requires the `hal` feature.
//!
//! | Adapter | Wraps | Implements |
//! |---------|-------|------------|
//! | [`HalLine`] | `digital::OutputPin` | [`OutputLine`] |
//! | [`HalSpi`] | `spi::SpiBus<u8>` | [`ByteTransfer`] |
//! | [`HalDelay`] | `delay::DelayNs` | [`ShiftDelay`] |
//!
//! Chip selection on the slot boards goes through the output chain, so the
//! SPI side wraps a bare `SpiBus` rather than an `SpiDevice` with its own
//! chip-select pin.
//!
//! ```rust,ignore
//! use stepchain::{ChainLines, IoChain};
//! use stepchain::hal::{HalDelay, HalLine};
//!
//! let lines = ChainLines {
//!     enable: HalLine::new(pins.gpio17),
//!     data: HalLine::new(pins.gpio27),
//!     clock: HalLine::new(pins.gpio22),
//!     strobe: HalLine::new(pins.gpio23),
//! };
//! let mut chain = IoChain::new(lines, HalDelay::new(delay));
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::traits::{ByteTransfer, OutputLine, ShiftDelay};

/// [`OutputLine`] over an `embedded-hal` output pin.
#[derive(Debug)]
pub struct HalLine<P>(P);

impl<P: OutputPin> HalLine<P> {
    /// Wrap a pin.
    pub fn new(pin: P) -> Self {
        Self(pin)
    }

    /// Unwrap the pin.
    pub fn into_inner(self) -> P {
        self.0
    }
}

impl<P: OutputPin> OutputLine for HalLine<P> {
    type Error = P::Error;

    fn set_high(&mut self) -> Result<(), P::Error> {
        self.0.set_high()
    }

    fn set_low(&mut self) -> Result<(), P::Error> {
        self.0.set_low()
    }
}

/// [`ByteTransfer`] over an `embedded-hal` SPI bus.
///
/// Flushes after every transfer so the chip is deselected only once the
/// last bit has left the controller.
#[derive(Debug)]
pub struct HalSpi<S>(S);

impl<S: SpiBus<u8>> HalSpi<S> {
    /// Wrap a bus.
    pub fn new(spi: S) -> Self {
        Self(spi)
    }

    /// Unwrap the bus.
    pub fn into_inner(self) -> S {
        self.0
    }
}

impl<S: SpiBus<u8>> ByteTransfer for HalSpi<S> {
    type Error = S::Error;

    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), S::Error> {
        self.0.transfer_in_place(buf)?;
        self.0.flush()
    }
}

/// [`ShiftDelay`] over an `embedded-hal` delay provider.
#[derive(Debug)]
pub struct HalDelay<D>(D);

impl<D: DelayNs> HalDelay<D> {
    /// Wrap a delay provider.
    pub fn new(delay: D) -> Self {
        Self(delay)
    }
}

impl<D: DelayNs> ShiftDelay for HalDelay<D> {
    fn hold_ns(&mut self, ns: u32) {
        self.0.delay_ns(ns);
    }
}
