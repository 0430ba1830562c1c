//! Board/slot addressing on the output chain.
//!
//! Each board exposes four slots; each slot owns eight consecutive outputs
//! of the chain:
//!
//! | Offset | Signal |
//! |--------|--------|
//! | 0 | enable (chip select, active low) |
//! | 1 | ms3 |
//! | 2 | reset |
//! | 3 | direction |
//! | 4 | ms1 |
//! | 5 | ms2 |
//! | 6 | step |
//! | 7 | sleep |
//!
//! The global index of a signal is `(board - 1) * 32 + (slot - 1) * 8 + offset`.

use crate::chain::BITS_PER_BOARD;
use crate::error::{ChainError, Error};

/// Slots per board.
pub const SLOTS_PER_BOARD: u8 = 4;

/// Outputs per slot.
pub const LINES_PER_SLOT: usize = 8;

/// One of the eight per-slot lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Signal {
    /// Chip enable / select.
    Enable,
    /// Microstep or address select bit 2.
    Ms3,
    /// Reset.
    Reset,
    /// Direction.
    Direction,
    /// Microstep or address select bit 0.
    Ms1,
    /// Microstep or address select bit 1.
    Ms2,
    /// Step.
    Step,
    /// Sleep.
    Sleep,
}

impl Signal {
    /// Offset of the signal inside its slot.
    pub const fn offset(self) -> usize {
        match self {
            Signal::Enable => 0,
            Signal::Ms3 => 1,
            Signal::Reset => 2,
            Signal::Direction => 3,
            Signal::Ms1 => 4,
            Signal::Ms2 => 5,
            Signal::Step => 6,
            Signal::Sleep => 7,
        }
    }
}

/// A validated board/slot pair (both 1-based).
///
/// # Example
///
/// ```rust
/// use stepchain::{SlotAddress, Signal};
///
/// let slot = SlotAddress::new(2, 3).unwrap();
/// assert_eq!(slot.line(Signal::Enable), 48);
/// assert_eq!(slot.line(Signal::Step), 54);
/// assert!(SlotAddress::new(1, 5).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotAddress {
    board: u8,
    slot: u8,
}

impl SlotAddress {
    /// Validate a board (≥ 1) and slot (1..=4).
    pub fn new(board: u8, slot: u8) -> Result<Self, ChainError> {
        if board < 1 || !(1..=SLOTS_PER_BOARD).contains(&slot) {
            return Err(Error::InvalidParameter);
        }
        Ok(Self { board, slot })
    }

    /// Board number.
    pub fn board(&self) -> u8 {
        self.board
    }

    /// Slot number on the board.
    pub fn slot(&self) -> u8 {
        self.slot
    }

    /// Global chain index of the slot's first output.
    pub fn base(&self) -> usize {
        (usize::from(self.board) - 1) * BITS_PER_BOARD
            + (usize::from(self.slot) - 1) * LINES_PER_SLOT
    }

    /// Global chain index of `signal` on this slot.
    pub fn line(&self, signal: Signal) -> usize {
        self.base() + signal.offset()
    }

    /// Levels of the three address lines that select device `number`
    /// (1..=8) on a multi-device slot.
    ///
    /// Bits 0, 1 and 2 of `number - 1` drive ms1, ms2 and ms3.
    pub fn device_index_lines(&self, number: u8) -> Result<[(usize, bool); 3], ChainError> {
        if !(1..=8).contains(&number) {
            return Err(Error::InvalidParameter);
        }
        let code = number - 1;
        Ok([
            (self.line(Signal::Ms1), code & 0b001 != 0),
            (self.line(Signal::Ms2), code & 0b010 != 0),
            (self.line(Signal::Ms3), code & 0b100 != 0),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(SlotAddress::new(0, 1), Err(Error::InvalidParameter));
        assert_eq!(SlotAddress::new(1, 0), Err(Error::InvalidParameter));
        assert_eq!(SlotAddress::new(1, 5), Err(Error::InvalidParameter));
        assert!(SlotAddress::new(255, 4).is_ok());
    }

    #[test]
    fn index_formula() {
        for board in 1..=3u8 {
            for slot in 1..=4u8 {
                let addr = SlotAddress::new(board, slot).unwrap();
                let base = (board as usize - 1) * 32 + (slot as usize - 1) * 8;
                assert_eq!(addr.line(Signal::Enable), base);
                assert_eq!(addr.line(Signal::Ms3), base + 1);
                assert_eq!(addr.line(Signal::Reset), base + 2);
                assert_eq!(addr.line(Signal::Direction), base + 3);
                assert_eq!(addr.line(Signal::Ms1), base + 4);
                assert_eq!(addr.line(Signal::Ms2), base + 5);
                assert_eq!(addr.line(Signal::Step), base + 6);
                assert_eq!(addr.line(Signal::Sleep), base + 7);
            }
        }
    }

    #[test]
    fn device_lines_are_independent_bits() {
        let addr = SlotAddress::new(1, 1).unwrap();
        assert_eq!(
            addr.device_index_lines(1).unwrap(),
            [(4, false), (5, false), (1, false)]
        );
        assert_eq!(
            addr.device_index_lines(6).unwrap(),
            [(4, true), (5, false), (1, true)]
        );
        assert_eq!(
            addr.device_index_lines(8).unwrap(),
            [(4, true), (5, true), (1, true)]
        );
    }

    #[test]
    fn device_number_range() {
        let addr = SlotAddress::new(1, 2).unwrap();
        assert_eq!(addr.device_index_lines(0), Err(Error::InvalidParameter));
        assert_eq!(addr.device_index_lines(9), Err(Error::InvalidParameter));
    }
}
