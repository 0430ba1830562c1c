//! The shared resource handle every chip driver talks through.
//!
//! All chips on the slot boards share one SPI bus and are selected by
//! their slot's enable output on the chain. [`Bus`] owns both resources;
//! chip drivers hold only their own addressing and shadow state and take
//! `&mut impl ChipBus` for each operation.
//!
//! ```rust
//! use stepchain::{Bus, ChipBus, IoChain};
//! use stepchain::hal::{LineLog, NoDelay};
//!
//! let log = LineLog::new();
//! let mut chain = IoChain::new(log.chain_lines(), NoDelay);
//! chain.init(1).unwrap();
//! let mut bus = Bus::new(chain, log.spi());
//!
//! bus.release(0).unwrap();
//! bus.update_lines(&[(3, true), (6, true)]).unwrap();
//! assert!(bus.chain.bit(3).unwrap());
//! ```

use tracing::{debug, warn};

use crate::chain::IoChain;
use crate::error::{ChainError, Error};
use crate::traits::{ByteTransfer, OutputLine, ShiftDelay};

/// Access to the chain outputs and the chip-select framed byte transfer.
///
/// Implemented by [`Bus`]; tests and alternative buses may provide their
/// own.
pub trait ChipBus {
    /// Error type of the byte-transfer primitive.
    type Error: core::fmt::Debug;

    /// Buffer every `(index, level)` pair, then commit once.
    fn update_lines(&mut self, lines: &[(usize, bool)]) -> Result<(), Error<Self::Error>>;

    /// Select the chip at chain output `select`, exchange `frame` in place,
    /// then deselect it again.
    ///
    /// The chip is deselected even when the transfer fails; the transfer
    /// error is reported afterwards.
    fn transmit(&mut self, select: usize, frame: &mut [u8]) -> Result<(), Error<Self::Error>>;

    /// Deselect the chip at chain output `select`.
    fn release(&mut self, select: usize) -> Result<(), Error<Self::Error>> {
        self.update_lines(&[(select, true)])
    }

    /// Drive output `index` high for one commit, then low again.
    fn pulse(&mut self, index: usize) -> Result<(), Error<Self::Error>> {
        self.update_lines(&[(index, true)])?;
        self.update_lines(&[(index, false)])
    }
}

/// Owner of the output chain and the SPI bus.
pub struct Bus<L, D, S> {
    /// The shift-register output chain.
    pub chain: IoChain<L, D>,
    /// The shared byte-transfer bus.
    pub spi: S,
}

impl<L, D, S> Bus<L, D, S> {
    /// Bundle an (already initialized) chain with a byte-transfer bus.
    pub fn new(chain: IoChain<L, D>, spi: S) -> Self {
        Self { chain, spi }
    }

    /// Split the bus back into its parts.
    pub fn into_parts(self) -> (IoChain<L, D>, S) {
        (self.chain, self.spi)
    }
}

impl<L, D, S> ChipBus for Bus<L, D, S>
where
    L: OutputLine,
    D: ShiftDelay,
    S: ByteTransfer,
    S::Error: core::fmt::Debug,
{
    type Error = S::Error;

    fn update_lines(&mut self, lines: &[(usize, bool)]) -> Result<(), Error<S::Error>> {
        for &(index, high) in lines {
            self.chain.write_bit(index, high).map_err(ChainError::widen)?;
        }
        self.chain.commit().map_err(ChainError::widen)
    }

    fn transmit(&mut self, select: usize, frame: &mut [u8]) -> Result<(), Error<S::Error>> {
        self.update_lines(&[(select, false)])?;

        let transfer = self.spi.transfer_in_place(frame);
        if let Err(e) = &transfer {
            warn!("transfer on select line {} failed: {:?}", select, e);
        }

        self.update_lines(&[(select, true)])?;
        transfer.map_err(Error::Transfer)?;

        debug!("select {}: exchanged {} bytes", select, frame.len());
        Ok(())
    }
}
