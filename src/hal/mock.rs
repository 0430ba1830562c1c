//! Mock implementations for testing without hardware.
//!
//! This module provides test doubles for the hardware traits, enabling
//! development and testing on a desktop without a board attached.
//!
//! # Available Mocks
//!
//! | Mock | Trait | Purpose |
//! |------|-------|---------|
//! | [`MockLine`] | [`OutputLine`] | Records every level change into a shared [`LineLog`] |
//! | [`MockSpi`] | [`ByteTransfer`] | Records sent frames, replays queued responses |
//!
//! [`LineLog`] also replays the recorded events against a model of the
//! shift-register chain, so tests can ask what the physical outputs showed
//! after each strobe, or at the moment of each SPI transfer.
//!
//! # Example
//!
//! ```rust
//! use stepchain::{Bus, ChipBus, IoChain};
//! use stepchain::hal::{LineLog, NoDelay};
//!
//! let log = LineLog::new();
//! let mut chain = IoChain::new(log.chain_lines(), NoDelay);
//! chain.init(1).unwrap();
//!
//! let mut bus = Bus::new(chain, log.spi());
//! let mut frame = [0x12, 0x34, 0x56];
//! bus.transmit(0, &mut frame).unwrap();
//!
//! // the chip on output 0 was selected (low) during the transfer
//! let during = log.latched_during_transfers();
//! assert!(!during[0][0]);
//! assert_eq!(bus.spi.sent[0], vec![0x12, 0x34, 0x56]);
//! ```
//!
//! [`OutputLine`]: crate::traits::OutputLine
//! [`ByteTransfer`]: crate::traits::ByteTransfer

use alloc::collections::VecDeque;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::chain::ChainLines;
use crate::traits::{ByteTransfer, OutputLine};

// ============================================================================
// Line Mocks
// ============================================================================

/// Identifies one of the four chain lines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineId {
    /// Output enable.
    Enable,
    /// Serial data.
    Data,
    /// Shift clock.
    Clock,
    /// Latch strobe.
    Strobe,
}

/// One recorded hardware event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// A line was driven to a level.
    Level {
        /// Which line.
        line: LineId,
        /// The new level.
        high: bool,
    },
    /// A linked [`MockSpi`] exchanged `len` bytes.
    Transfer {
        /// Number of bytes exchanged.
        len: usize,
    },
}

/// Error returned by a [`MockLine`] that was told to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockLineError(pub LineId);

#[derive(Debug, Default)]
struct LogState {
    events: Vec<LineEvent>,
    failing: Option<LineId>,
}

/// Shared, ordered record of every line change and linked SPI transfer.
///
/// Cloning a `LineLog` yields another handle to the same record.
///
/// # Example
///
/// ```rust
/// use stepchain::hal::{LineId, LineLog};
/// use stepchain::traits::OutputLine;
///
/// let log = LineLog::new();
/// let mut strobe = log.line(LineId::Strobe);
///
/// strobe.set_high().unwrap();
/// strobe.set_low().unwrap();
/// assert_eq!(log.pulses(LineId::Strobe), 1);
/// assert_eq!(log.level(LineId::Strobe), Some(false));
/// ```
#[derive(Clone, Debug, Default)]
pub struct LineLog {
    state: Rc<RefCell<LogState>>,
}

impl LineLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// A mock line that records into this log.
    pub fn line(&self, id: LineId) -> MockLine {
        MockLine {
            id,
            log: self.clone(),
        }
    }

    /// The four chain lines, all recording into this log.
    pub fn chain_lines(&self) -> ChainLines<MockLine> {
        ChainLines {
            enable: self.line(LineId::Enable),
            data: self.line(LineId::Data),
            clock: self.line(LineId::Clock),
            strobe: self.line(LineId::Strobe),
        }
    }

    /// A mock SPI bus whose transfers are recorded into this log.
    pub fn spi(&self) -> MockSpi {
        MockSpi {
            log: Some(self.clone()),
            ..MockSpi::default()
        }
    }

    /// Make every further level change on `line` fail.
    pub fn fail(&self, line: LineId) {
        self.state.borrow_mut().failing = Some(line);
    }

    /// Let every line accept levels again.
    pub fn restore(&self) {
        self.state.borrow_mut().failing = None;
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<LineEvent> {
        self.state.borrow().events.clone()
    }

    /// Forget all recorded events.
    pub fn clear(&self) {
        self.state.borrow_mut().events.clear();
    }

    /// Last level driven on `line`, if any.
    pub fn level(&self, line: LineId) -> Option<bool> {
        self.levels(line).last()
    }

    /// Number of high-to-low transitions on `line`.
    pub fn pulses(&self, line: LineId) -> usize {
        self.transitions(line, true)
    }

    /// Number of low-to-high transitions on `line`.
    pub fn rises(&self, line: LineId) -> usize {
        self.transitions(line, false)
    }

    /// Number of linked SPI transfers.
    pub fn transfers(&self) -> usize {
        self.state
            .borrow()
            .events
            .iter()
            .filter(|e| matches!(e, LineEvent::Transfer { .. }))
            .count()
    }

    /// True if the last strobe rise comes after the last clock event.
    pub fn strobe_after_last_clock(&self) -> bool {
        let state = self.state.borrow();
        let position = |target: LineId, rise_only: bool| {
            state.events.iter().rposition(|e| {
                matches!(e, LineEvent::Level { line, high } if *line == target && (*high || !rise_only))
            })
        };
        match (position(LineId::Clock, false), position(LineId::Strobe, true)) {
            (Some(clock), Some(strobe)) => strobe > clock,
            _ => false,
        }
    }

    /// Data level sampled at every clock rising edge, in shift order.
    pub fn shifted_bits(&self) -> Vec<bool> {
        self.replay().shifted
    }

    /// Outputs shown by the chain after the last strobe, indexed like
    /// [`IoChain`](crate::IoChain) bits. `None` before the first strobe.
    pub fn latched(&self) -> Option<Vec<bool>> {
        self.replay().latched
    }

    /// Outputs shown by the chain at the moment of each linked SPI transfer.
    pub fn latched_during_transfers(&self) -> Vec<Vec<bool>> {
        self.replay().during_transfers
    }

    fn levels(&self, target: LineId) -> impl Iterator<Item = bool> {
        let events = self.events();
        events.into_iter().filter_map(move |e| match e {
            LineEvent::Level { line, high } if line == target => Some(high),
            _ => None,
        })
    }

    fn transitions(&self, line: LineId, falling: bool) -> usize {
        let mut previous: Option<bool> = None;
        let mut count = 0;
        for level in self.levels(line) {
            if previous == Some(falling) && level != falling {
                count += 1;
            }
            previous = Some(level);
        }
        count
    }

    fn replay(&self) -> Replay {
        let state = self.state.borrow();
        let mut replay = Replay::default();
        let mut data = false;
        let mut clock = false;
        let mut strobe = false;

        for event in &state.events {
            match *event {
                LineEvent::Level {
                    line: LineId::Data,
                    high,
                } => data = high,
                LineEvent::Level {
                    line: LineId::Clock,
                    high,
                } => {
                    if high && !clock {
                        replay.shifted.push(data);
                    }
                    clock = high;
                }
                LineEvent::Level {
                    line: LineId::Strobe,
                    high,
                } => {
                    if high && !strobe {
                        // most recently shifted bit sits in the nearest stage
                        replay.latched = Some(replay.shifted.iter().rev().copied().collect());
                    }
                    strobe = high;
                }
                LineEvent::Level { .. } => {}
                LineEvent::Transfer { .. } => replay
                    .during_transfers
                    .push(replay.latched.clone().unwrap_or_default()),
            }
        }
        replay
    }

    fn record(&self, event: LineEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

#[derive(Default)]
struct Replay {
    shifted: Vec<bool>,
    latched: Option<Vec<bool>>,
    during_transfers: Vec<Vec<bool>>,
}

/// Mock output line.
///
/// Created through [`LineLog::line`] or [`LineLog::chain_lines`].
#[derive(Clone, Debug)]
pub struct MockLine {
    id: LineId,
    log: LineLog,
}

impl MockLine {
    /// Which line this mock stands for.
    pub fn id(&self) -> LineId {
        self.id
    }
}

impl OutputLine for MockLine {
    type Error = MockLineError;

    fn set_high(&mut self) -> Result<(), MockLineError> {
        self.set_level(true)
    }

    fn set_low(&mut self) -> Result<(), MockLineError> {
        self.set_level(false)
    }

    fn set_level(&mut self, high: bool) -> Result<(), MockLineError> {
        if self.log.state.borrow().failing == Some(self.id) {
            return Err(MockLineError(self.id));
        }
        self.log.record(LineEvent::Level {
            line: self.id,
            high,
        });
        Ok(())
    }
}

// ============================================================================
// SPI Mock
// ============================================================================

/// Error returned by [`MockSpi`] when a failure was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MockSpiError;

/// Mock byte-transfer bus for testing.
///
/// Records every outgoing frame. Incoming bytes come from the response
/// queue (first in, first out); without a queued response the device
/// answers with zeros.
///
/// # Example
///
/// ```rust
/// use stepchain::hal::MockSpi;
/// use stepchain::traits::ByteTransfer;
///
/// let mut spi = MockSpi::new();
/// spi.queue_response(&[0xAB, 0xCD, 0xE0]);
///
/// let mut frame = [0x0A, 0x00, 0x03];
/// spi.transfer_in_place(&mut frame).unwrap();
/// assert_eq!(frame, [0xAB, 0xCD, 0xE0]);
/// assert_eq!(spi.sent.len(), 1);
/// assert_eq!(spi.last_sent(), Some(&[0x0A, 0x00, 0x03][..]));
///
/// spi.fail_next();
/// assert!(spi.transfer_in_place(&mut frame).is_err());
/// ```
#[derive(Debug, Default)]
pub struct MockSpi {
    /// Every frame sent, in order.
    pub sent: Vec<Vec<u8>>,
    responses: VecDeque<Vec<u8>>,
    fail_next: bool,
    log: Option<LineLog>,
}

impl MockSpi {
    /// Creates a mock bus that answers with zeros.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes the device answers with on a future transfer.
    pub fn queue_response(&mut self, bytes: &[u8]) {
        self.responses.push_back(bytes.to_vec());
    }

    /// Make the next transfer fail.
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }

    /// The most recently sent frame.
    pub fn last_sent(&self) -> Option<&[u8]> {
        self.sent.last().map(Vec::as_slice)
    }

    /// Sent frames decoded as 24-bit big-endian words.
    pub fn sent_words(&self) -> Vec<u32> {
        self.sent
            .iter()
            .map(|f| f.iter().fold(0u32, |acc, b| (acc << 8) | u32::from(*b)))
            .collect()
    }
}

impl ByteTransfer for MockSpi {
    type Error = MockSpiError;

    fn transfer_in_place(&mut self, buf: &mut [u8]) -> Result<(), MockSpiError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(MockSpiError);
        }
        self.sent.push(buf.to_vec());
        if let Some(log) = &self.log {
            log.record(LineEvent::Transfer { len: buf.len() });
        }

        let response = self.responses.pop_front().unwrap_or_default();
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = response.get(i).copied().unwrap_or(0);
        }
        Ok(())
    }
}
