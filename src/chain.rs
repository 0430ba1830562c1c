//! Shift-register output chain.
//!
//! Every DICE board carries four 8-bit serial-in/parallel-out shift
//! registers, one per slot. Boards are daisy-chained, so the whole system
//! looks like one long shift register of `32 × boards` open-drain outputs
//! driven by four dedicated lines:
//!
//! | Line | Role |
//! |------|------|
//! | enable | Output enable of every register in the chain (active high) |
//! | data | Serial data into the first register |
//! | clock | Shifts the data line into the chain on its rising edge |
//! | strobe | Latches every register's serial content to its outputs |
//!
//! [`IoChain`] keeps an in-memory copy of all outputs. [`set_bit`] and
//! [`clear_bit`] only touch that copy; [`commit`] shifts the complete copy
//! out and then pulses the strobe once, so the physical outputs jump from
//! the old state to the new one in a single step and never show a
//! half-shifted pattern.
//!
//! # Example
//!
//! ```rust
//! use stepchain::{IoChain, hal::{LineLog, LineId, NoDelay}};
//!
//! let log = LineLog::new();
//! let mut chain = IoChain::new(log.chain_lines(), NoDelay);
//!
//! chain.init(1).unwrap();
//! chain.set_bit(6).unwrap();
//! chain.commit().unwrap();
//!
//! assert_eq!(log.pulses(LineId::Clock), 32);
//! assert_eq!(log.pulses(LineId::Strobe), 1);
//! assert!(log.latched().unwrap()[6]);
//! ```
//!
//! [`set_bit`]: IoChain::set_bit
//! [`clear_bit`]: IoChain::clear_bit
//! [`commit`]: IoChain::commit

use alloc::vec;
use alloc::vec::Vec;

use tracing::{trace, warn};

use crate::error::{ChainError, Error};
use crate::traits::{OutputLine, ShiftDelay};

/// Number of outputs on one board (4 slots × 8 lines).
pub const BITS_PER_BOARD: usize = 32;

/// Data line setup time before the clock edge.
const DATA_SETUP_NS: u32 = 50;
/// Clock high time.
const CLOCK_HIGH_NS: u32 = 50;
/// Idle time after the data line is released.
const DATA_RELEASE_NS: u32 = 40;
/// Strobe high time.
const STROBE_HIGH_NS: u32 = 100;

/// The four dedicated lines that drive the chain.
#[derive(Debug)]
pub struct ChainLines<L> {
    /// Output enable of every register.
    pub enable: L,
    /// Serial data.
    pub data: L,
    /// Shift clock.
    pub clock: L,
    /// Latch strobe.
    pub strobe: L,
}

/// Buffered view of every output on the shift-register chain.
///
/// Starts uninitialized; [`init`](Self::init) allocates the buffer and
/// [`teardown`](Self::teardown) releases it again. All bit operations and
/// [`commit`](Self::commit) return [`Error::NotInitialized`] while no
/// buffer exists.
///
/// The chain is a single exclusive resource: one `&mut IoChain` means one
/// shift sequence in flight.
pub struct IoChain<L, D> {
    lines: ChainLines<L>,
    delay: D,
    buffer: Option<Vec<u8>>,
}

impl<L, D> IoChain<L, D>
where
    L: OutputLine,
    D: ShiftDelay,
{
    /// Create an uninitialized chain driving the given lines.
    pub fn new(lines: ChainLines<L>, delay: D) -> Self {
        Self {
            lines,
            delay,
            buffer: None,
        }
    }

    /// Allocate a cleared buffer for `boards` boards and enable the chain outputs.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidParameter`] if `boards` is zero or too large to address
    /// - [`Error::AlreadyInitialized`] if a buffer already exists
    /// - [`Error::Line`] if a chain line refuses its initial level; the chain
    ///   stays uninitialized and `init` may be retried
    ///
    /// Failing to allocate the buffer aborts the process.
    pub fn init(&mut self, boards: usize) -> Result<(), ChainError> {
        if boards < 1 {
            return Err(Error::InvalidParameter);
        }
        if self.buffer.is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let bytes = boards
            .checked_mul(BITS_PER_BOARD / 8)
            .ok_or(Error::InvalidParameter)?;

        drive(&mut self.lines.data, false)?;
        drive(&mut self.lines.clock, false)?;
        drive(&mut self.lines.strobe, false)?;
        drive(&mut self.lines.enable, true)?;

        self.buffer = Some(vec![0u8; bytes]);

        trace!("output chain initialized with {} boards", boards);
        Ok(())
    }

    /// Release the buffer. Does nothing if the chain is not initialized.
    pub fn teardown(&mut self) {
        if self.buffer.take().is_some() {
            trace!("output chain released");
        }
    }

    /// Returns true while the chain owns a buffer.
    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    /// Number of addressable outputs (0 when uninitialized).
    pub fn len(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.len() * 8)
    }

    /// Returns true if there are no addressable outputs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of boards the buffer was sized for.
    pub fn boards(&self) -> usize {
        self.len() / BITS_PER_BOARD
    }

    /// Set output `index` in the buffer.
    pub fn set_bit(&mut self, index: usize) -> Result<(), ChainError> {
        self.write_bit(index, true)
    }

    /// Clear output `index` in the buffer.
    pub fn clear_bit(&mut self, index: usize) -> Result<(), ChainError> {
        self.write_bit(index, false)
    }

    /// Write output `index` in the buffer. Nothing reaches the hardware
    /// until the next [`commit`](Self::commit).
    pub fn write_bit(&mut self, index: usize, high: bool) -> Result<(), ChainError> {
        let buffer = self.buffer.as_mut().ok_or(Error::NotInitialized)?;
        let byte = buffer.get_mut(index / 8).ok_or(Error::InvalidParameter)?;
        let mask = 1u8 << (index % 8);
        if high {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        Ok(())
    }

    /// Read output `index` from the buffer.
    pub fn bit(&self, index: usize) -> Result<bool, ChainError> {
        let buffer = self.buffer.as_ref().ok_or(Error::NotInitialized)?;
        let byte = buffer.get(index / 8).ok_or(Error::InvalidParameter)?;
        Ok(byte & (1 << (index % 8)) != 0)
    }

    /// Shift the whole buffer into the chain and latch it.
    ///
    /// Bits go out from the highest index down to index 0, so index 0
    /// ends up in the stage nearest to the controller. The strobe is
    /// pulsed exactly once, after the last clock pulse.
    pub fn commit(&mut self) -> Result<(), ChainError> {
        let buffer = self.buffer.as_ref().ok_or(Error::NotInitialized)?;
        let lines = &mut self.lines;
        let delay = &mut self.delay;

        for index in (0..buffer.len() * 8).rev() {
            let high = buffer[index / 8] & (1 << (index % 8)) != 0;

            drive(&mut lines.data, high)?;
            delay.hold_ns(DATA_SETUP_NS);
            drive(&mut lines.clock, true)?;
            delay.hold_ns(CLOCK_HIGH_NS);
            drive(&mut lines.clock, false)?;

            drive(&mut lines.data, false)?;
            delay.hold_ns(DATA_RELEASE_NS);
        }

        drive(&mut lines.strobe, true)?;
        delay.hold_ns(STROBE_HIGH_NS);
        drive(&mut lines.strobe, false)?;

        trace!("output chain committed ({} bits)", buffer.len() * 8);
        Ok(())
    }

    /// Consume the chain and return its lines and delay.
    pub fn release(self) -> (ChainLines<L>, D) {
        (self.lines, self.delay)
    }
}

fn drive<L: OutputLine>(line: &mut L, high: bool) -> Result<(), ChainError> {
    line.set_level(high).map_err(|e| {
        warn!("chain line refused level {}: {:?}", high, e);
        Error::Line
    })
}
