//! Hardware abstraction traits for output lines, byte transfers and hold delays.
//!
//! These are the only points where the crate touches hardware. Everything
//! above them (chain shifting, chip selection, register encoding) is plain
//! logic that runs the same on a Raspberry Pi, a microcontroller or a
//! desktop test.
//!
//! # Key Traits
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`OutputLine`] | One digital output (chain enable, data, clock, strobe) |
//! | [`ByteTransfer`] | Blocking full-duplex byte exchange (SPI) |
//! | [`ShiftDelay`] | Hold time between chain line transitions |
//!
//! # Implementation
//!
//! For testing and desktop development, use the mock implementations
//! from [`crate::hal::mock`]. For real pins and buses, wrap
//! `embedded-hal` 1.0 types with the adapters in `hal::embedded`
//! (requires the `hal` feature).
//!
//! # Example
//!
//! ```rust
//! use stepchain::traits::{ByteTransfer, OutputLine};
//! use stepchain::hal::{LineLog, MockSpi};
//!
//! let log = LineLog::new();
//! let mut clock = log.line(stepchain::hal::LineId::Clock);
//! clock.set_high().unwrap();
//! clock.set_low().unwrap();
//! assert_eq!(log.pulses(stepchain::hal::LineId::Clock), 1);
//!
//! let mut spi = MockSpi::new();
//! let mut frame = [0x0A, 0x00, 0x03];
//! spi.transfer_in_place(&mut frame).unwrap();
//! assert_eq!(spi.sent[0], vec![0x0A, 0x00, 0x03]);
//! ```

/// Rotation direction of a stepper motor.
///
/// Maps onto the level of the slot's direction line: [`Forward`](Self::Forward)
/// drives it high, [`Reverse`](Self::Reverse) drives it low.
///
/// # Default
///
/// Defaults to [`Reverse`](Self::Reverse), the level the line has after
/// the chain is initialized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Direction {
    /// Direction line high.
    Forward,
    /// Direction line low.
    #[default]
    Reverse,
}

impl Direction {
    /// Level of the direction line for this direction.
    #[inline]
    pub const fn level(&self) -> bool {
        matches!(self, Direction::Forward)
    }

    /// The opposite direction.
    #[inline]
    pub const fn reversed(&self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// A single digital output line.
///
/// Used for the four dedicated lines of the output chain. The chain only
/// ever drives levels; it never reads them back.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use stepchain::traits::OutputLine;
///
/// struct GpioLine { /* register handle */ }
///
/// impl OutputLine for GpioLine {
///     type Error = ();
///
///     fn set_high(&mut self) -> Result<(), ()> {
///         // write the set register...
///         Ok(())
///     }
///
///     fn set_low(&mut self) -> Result<(), ()> {
///         // write the clear register...
///         Ok(())
///     }
/// }
/// ```
pub trait OutputLine {
    /// Error type for level changes.
    type Error: core::fmt::Debug;

    /// Drive the line high.
    fn set_high(&mut self) -> Result<(), Self::Error>;

    /// Drive the line low.
    fn set_low(&mut self) -> Result<(), Self::Error>;

    /// Drive the line to `high`.
    fn set_level(&mut self, high: bool) -> Result<(), Self::Error> {
        if high {
            self.set_high()
        } else {
            self.set_low()
        }
    }
}

/// Blocking full-duplex byte transfer.
///
/// Sends every byte of the buffer and overwrites it with the bytes clocked
/// in at the same time. There are no partial transfers: the call either
/// exchanges the whole buffer or fails.
///
/// Chip selection is not part of this trait. Chips on the DICE boards are
/// selected through the output chain, see [`ChipBus`](crate::ChipBus).
pub trait ByteTransfer {
    /// Error type for transfers.
    type Error;

    /// Exchange `buf` with the device, most significant byte first.
    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

/// Hold time strategy for the bit-banged chain lines.
///
/// The chain only needs the ordering of its line transitions to be
/// respected; the exact durations are not critical. Production code uses
/// a short busy wait ([`SpinDelay`](crate::hal::SpinDelay)), tests use
/// [`NoDelay`](crate::hal::NoDelay).
pub trait ShiftDelay {
    /// Block for roughly `ns` nanoseconds.
    fn hold_ns(&mut self, ns: u32);
}

impl<T: OutputLine + ?Sized> OutputLine for &mut T {
    type Error = T::Error;

    fn set_high(&mut self) -> Result<(), Self::Error> {
        (**self).set_high()
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        (**self).set_low()
    }
}

impl<T: ByteTransfer + ?Sized> ByteTransfer for &mut T {
    type Error = T::Error;

    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).transfer_in_place(buf)
    }
}
