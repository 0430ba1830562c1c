//! Three-channel thermocouple slot.
//!
//! The thermocouple board carries three MAX31855-style converters behind a
//! single chip select. The slot's step and direction lines pick which
//! converter answers:
//!
//! | Sub-chip | step | direction |
//! |----------|------|-----------|
//! | 1 | low | low |
//! | 2 | high | low |
//! | 3 | low | high |
//!
//! Each converter answers a read with one 32-bit frame.

use tracing::{debug, warn};

use crate::addressing::{Signal, SlotAddress};
use crate::bus::ChipBus;
use crate::error::{ChainError, Error};

/// Number of converters on one slot.
pub const SUB_CHIPS: u8 = 3;

const FAULT_FLAG: u32 = 1 << 16;
const OPEN_CIRCUIT: u32 = 1 << 0;
const SHORT_TO_GROUND: u32 = 1 << 1;
const SHORT_TO_VCC: u32 = 1 << 2;
const FAULT_CODE: u32 = OPEN_CIRCUIT | SHORT_TO_GROUND | SHORT_TO_VCC;

/// One 32-bit converter frame.
///
/// ```rust
/// use stepchain::ThermocoupleFrame;
///
/// let frame = ThermocoupleFrame::from_raw(0x0640_1900);
/// assert_eq!(frame.celsius(), Some(100.0));
/// assert_eq!(frame.internal_celsius(), 25.0);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ThermocoupleFrame(u32);

impl ThermocoupleFrame {
    /// Frame from its raw bits.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw 32 bits.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// True if the converter flagged any fault.
    pub fn fault(&self) -> bool {
        self.0 & (FAULT_FLAG | FAULT_CODE) != 0
    }

    /// The three fault bits.
    pub fn fault_code(&self) -> u8 {
        (self.0 & FAULT_CODE) as u8
    }

    /// Thermocouple not connected.
    pub fn open_circuit(&self) -> bool {
        self.0 & OPEN_CIRCUIT != 0
    }

    /// Thermocouple shorted to ground.
    pub fn short_to_ground(&self) -> bool {
        self.0 & SHORT_TO_GROUND != 0
    }

    /// Thermocouple shorted to supply.
    pub fn short_to_vcc(&self) -> bool {
        self.0 & SHORT_TO_VCC != 0
    }

    /// Hot-junction temperature in °C, `None` on a fault.
    pub fn celsius(&self) -> Option<f32> {
        if self.fault() {
            return None;
        }
        Some(((self.0 as i32) >> 18) as f32 * 0.25)
    }

    /// Hot-junction temperature in °F, `None` on a fault.
    pub fn fahrenheit(&self) -> Option<f32> {
        self.celsius().map(|c| c * 9.0 / 5.0 + 32.0)
    }

    /// Cold-junction (converter die) temperature in °C.
    pub fn internal_celsius(&self) -> f32 {
        (((self.0 as i32) << 16) >> 20) as f32 * 0.0625
    }
}

/// Reader for a thermocouple slot.
#[derive(Clone, Copy, Debug)]
pub struct Thermocouple {
    address: SlotAddress,
}

impl Thermocouple {
    /// Bind to a slot and deselect it.
    pub fn new<B: ChipBus>(bus: &mut B, address: SlotAddress) -> Result<Self, Error<B::Error>> {
        bus.release(address.line(Signal::Enable))?;
        Ok(Self { address })
    }

    /// Bind to `slot` of `board`.
    pub fn on_slot<B: ChipBus>(bus: &mut B, board: u8, slot: u8) -> Result<Self, Error<B::Error>> {
        let address = SlotAddress::new(board, slot).map_err(ChainError::widen)?;
        Self::new(bus, address)
    }

    /// Slot the board sits on.
    pub fn address(&self) -> SlotAddress {
        self.address
    }

    /// Read one frame from converter `sub_chip` (1..=3).
    ///
    /// An unknown sub-chip is logged and answered with an empty frame
    /// without touching the bus.
    pub fn read_frame<B: ChipBus>(
        &mut self,
        bus: &mut B,
        sub_chip: u8,
    ) -> Result<ThermocoupleFrame, Error<B::Error>> {
        if !(1..=SUB_CHIPS).contains(&sub_chip) {
            warn!("no thermocouple sub-chip {} on slot {:?}", sub_chip, self.address);
            return Ok(ThermocoupleFrame::default());
        }

        bus.update_lines(&[
            (self.address.line(Signal::Step), sub_chip == 2),
            (self.address.line(Signal::Direction), sub_chip == 3),
        ])?;

        let mut frame = [0u8; 4];
        bus.transmit(self.address.line(Signal::Enable), &mut frame)?;

        let frame = ThermocoupleFrame::from_raw(u32::from_be_bytes(frame));
        if frame.fault() {
            warn!("thermocouple {} fault: {:#x}", sub_chip, frame.fault_code());
        }
        debug!("thermocouple {} frame {:08x}", sub_chip, frame.raw());
        Ok(frame)
    }

    /// Hot-junction temperature of `sub_chip` in °C, `None` on a fault.
    pub fn read_celsius<B: ChipBus>(
        &mut self,
        bus: &mut B,
        sub_chip: u8,
    ) -> Result<Option<f32>, Error<B::Error>> {
        Ok(self.read_frame(bus, sub_chip)?.celsius())
    }

    /// Hot-junction temperature of `sub_chip` in °F, `None` on a fault.
    pub fn read_fahrenheit<B: ChipBus>(
        &mut self,
        bus: &mut B,
        sub_chip: u8,
    ) -> Result<Option<f32>, Error<B::Error>> {
        Ok(self.read_frame(bus, sub_chip)?.fahrenheit())
    }

    /// Die temperature of `sub_chip` in °C.
    pub fn read_internal<B: ChipBus>(
        &mut self,
        bus: &mut B,
        sub_chip: u8,
    ) -> Result<f32, Error<B::Error>> {
        Ok(self.read_frame(bus, sub_chip)?.internal_celsius())
    }
}
