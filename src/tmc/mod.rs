//! TMC26x stepper driver register model.
//!
//! The TMC260/261/262 chips are configured over SPI with five write-only
//! registers and answer every datagram with a status word. Since nothing
//! can be read back, [`Tmc26x`] keeps a shadow copy of each register and
//! applies every change to the shadow before transmitting the whole
//! register.
//!
//! Physical settings (milliamps, microsteps, chopper timing) are encoded
//! into register fields here. Out-of-range values are clamped, never
//! rejected.
//!
//! # Example
//!
//! ```rust
//! use stepchain::{Bus, IoChain, Tmc26x};
//! use stepchain::config::TmcConfig;
//! use stepchain::hal::{LineLog, NoDelay};
//!
//! let log = LineLog::new();
//! let mut chain = IoChain::new(log.chain_lines(), NoDelay);
//! chain.init(1).unwrap();
//! let mut bus = Bus::new(chain, log.spi());
//!
//! let mut motor = Tmc26x::new(&mut bus, TmcConfig::new(1, 2)).unwrap();
//! motor.start(&mut bus).unwrap();
//!
//! assert_eq!(motor.current(), 1019);
//! assert!(motor.is_current_scaling_halved());
//! assert_eq!(motor.microsteps(), 32);
//! assert!(motor.is_enabled());
//! ```

pub mod registers;
pub mod status;

use tracing::debug;

use crate::addressing::{Signal, SlotAddress};
use crate::bus::ChipBus;
use crate::config::{ChopperConfig, TmcConfig};
use crate::error::{ChainError, Error};
use crate::traits::Direction;

use registers::{chopconf, drvconf, drvctrl, sgcsconf, smarten, Register, Registers};
pub use status::{DriverStatus, OverTemperature, Readout, ReadoutSelect};

/// Full-scale sense voltage in millivolts.
const VSENSE_FULL_MV: u32 = 310;
/// Full-scale sense voltage with VSENSE set, in millivolts.
const VSENSE_HALF_MV: u32 = 165;

/// Largest current scale.
const MAX_CURRENT_SCALE: i64 = 31;
/// Below this scale the halved sense voltage gives better resolution.
const HALF_SCALE_THRESHOLD: i64 = 16;

/// Floor CoolStep may reduce the current to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum CoolStepLimit {
    /// Half of the configured current scale.
    #[default]
    Half,
    /// A quarter of the configured current scale.
    Quarter,
}

/// Driver for one TMC26x on a slot board.
///
/// Holds the shadow registers, the last status word and the values that
/// disabling a feature destroys in the registers (off time and CoolStep
/// lower threshold). All hardware access goes through the [`ChipBus`]
/// passed to each call.
#[derive(Clone, Debug)]
pub struct Tmc26x {
    address: SlotAddress,
    config: TmcConfig,
    registers: Registers,
    status: DriverStatus,
    off_time: u8,
    cool_step_lower: u8,
    cool_step_enabled: bool,
    programmed_readout: Option<ReadoutSelect>,
}

impl Tmc26x {
    /// Set up the shadow registers for the driver described by `config`
    /// and deselect the chip. Nothing is sent until [`start`](Self::start).
    pub fn new<B: ChipBus>(bus: &mut B, config: TmcConfig) -> Result<Self, Error<B::Error>> {
        let address = config.address().map_err(ChainError::widen)?;
        bus.release(address.line(Signal::Enable))?;

        Ok(Self {
            address,
            config,
            registers: Registers::default(),
            status: DriverStatus::default(),
            off_time: 0,
            cool_step_lower: 0,
            cool_step_enabled: false,
            programmed_readout: None,
        })
    }

    /// Slot the chip sits on.
    pub fn address(&self) -> SlotAddress {
        self.address
    }

    /// Configuration the driver was created with.
    pub fn config(&self) -> &TmcConfig {
        &self.config
    }

    /// Snapshot of the shadow registers.
    pub fn registers(&self) -> Registers {
        self.registers
    }

    /// Status word from the most recent transfer.
    pub fn status(&self) -> DriverStatus {
        self.status
    }

    /// Send every shadow register, then apply the configured current,
    /// chopper, microstepping and optional tuning.
    pub fn start<B: ChipBus>(&mut self, bus: &mut B) -> Result<(), Error<B::Error>> {
        for reg in Register::ALL {
            self.send(bus, reg)?;
        }

        let config = self.config.clone();
        self.set_current(bus, config.current_ma)?;
        self.set_chopper(bus, &config.chopper)?;
        self.set_microsteps(bus, config.microsteps)?;

        if let Some(sg) = config.stall_guard {
            self.set_stall_guard_threshold(bus, sg.threshold, sg.filter)?;
        }
        if let Some(cs) = config.cool_step {
            self.set_cool_step_configuration(
                bus,
                cs.lower_threshold,
                cs.hysteresis,
                cs.decrement_speed,
                cs.increment_size,
                cs.lower_current_limit,
            )?;
            self.set_cool_step_enabled(bus, cs.enabled)?;
        }
        if config.random_off_time {
            self.set_random_off_time(bus, true)?;
        }

        debug!(
            "tmc26x on board {} slot {} started",
            self.address.board(),
            self.address.slot()
        );
        Ok(())
    }

    // =========================================================================
    // Step / direction
    // =========================================================================

    /// Pulse the slot's step line once.
    pub fn step<B: ChipBus>(&mut self, bus: &mut B) -> Result<(), Error<B::Error>> {
        bus.pulse(self.address.line(Signal::Step))
    }

    /// Drive the slot's direction line.
    pub fn set_direction<B: ChipBus>(
        &mut self,
        bus: &mut B,
        direction: Direction,
    ) -> Result<(), Error<B::Error>> {
        bus.update_lines(&[(self.address.line(Signal::Direction), direction.level())])
    }

    // =========================================================================
    // Current
    // =========================================================================

    /// Set the peak motor current in milliamps.
    ///
    /// Picks the full or halved sense voltage, whichever gives the finer
    /// current scale, and saturates the scale at 31.
    pub fn set_current<B: ChipBus>(&mut self, bus: &mut B, ma: u32) -> Result<(), Error<B::Error>> {
        let sense = self.config.sense_resistor_mohm;

        let mut scale = current_scale(sense, ma, VSENSE_FULL_MV);
        let halved = scale < HALF_SCALE_THRESHOLD;
        if halved {
            scale = current_scale(sense, ma, VSENSE_HALF_MV);
        }
        let scale = scale.clamp(0, MAX_CURRENT_SCALE) as u32;

        drvconf::VSENSE.set_flag(&mut self.registers.driver_config, halved);
        sgcsconf::CS.set(&mut self.registers.stall_guard_current, scale);

        debug!("current {} mA -> scale {} (vsense {})", ma, scale, halved);
        self.send(bus, Register::DriverConfig)?;
        self.send(bus, Register::StallGuardCurrent)
    }

    /// Peak current in milliamps, as programmed.
    pub fn current(&self) -> u32 {
        let scale = sgcsconf::CS.get(self.registers.stall_guard_current);
        self.scale_to_ma(scale)
    }

    /// True if the halved sense voltage is in use.
    pub fn is_current_scaling_halved(&self) -> bool {
        drvconf::VSENSE.is_set(self.registers.driver_config)
    }

    /// Current in milliamps from the current scale in the last status word.
    ///
    /// Only meaningful after a
    /// [`ReadoutSelect::CurrentAndStallGuardHigh`] readout.
    pub fn actual_current(&self) -> u32 {
        self.scale_to_ma(u32::from(self.status.current_scale()))
    }

    fn scale_to_ma(&self, scale: u32) -> u32 {
        let vref = if self.is_current_scaling_halved() {
            VSENSE_HALF_MV
        } else {
            VSENSE_FULL_MV
        };
        let numerator = u64::from(scale + 1) * u64::from(vref) * 1000;
        let denominator = 32 * u64::from(self.config.sense_resistor_mohm);
        numerator
            .checked_div(denominator)
            .map_or(0, |ma| ma.min(u64::from(u32::MAX)) as u32)
    }

    // =========================================================================
    // Microstepping
    // =========================================================================

    /// Set the microstep resolution. Values between powers of two round
    /// down; 0 and 1 select full steps.
    pub fn set_microsteps<B: ChipBus>(
        &mut self,
        bus: &mut B,
        microsteps: u16,
    ) -> Result<(), Error<B::Error>> {
        let index = (0..=8u32)
            .find(|i| (256u32 >> i) <= u32::from(microsteps))
            .unwrap_or(8);
        drvctrl::MRES.set(&mut self.registers.driver_control, index);
        self.send(bus, Register::DriverControl)
    }

    /// Microsteps per full step.
    pub fn microsteps(&self) -> u16 {
        256 >> drvctrl::MRES.get(self.registers.driver_control).min(8)
    }

    // =========================================================================
    // Chopper
    // =========================================================================

    /// Apply either chopper mode.
    pub fn set_chopper<B: ChipBus>(
        &mut self,
        bus: &mut B,
        chopper: &ChopperConfig,
    ) -> Result<(), Error<B::Error>> {
        match *chopper {
            ChopperConfig::ConstantOffTime {
                off_time,
                blank_time,
                fast_decay,
                sine_offset,
                use_comparator,
            } => self.set_constant_off_time_chopper(
                bus,
                off_time,
                blank_time,
                fast_decay,
                sine_offset,
                use_comparator,
            ),
            ChopperConfig::SpreadCycle {
                off_time,
                blank_time,
                hysteresis_start,
                hysteresis_end,
                hysteresis_decrement,
            } => self.set_spread_cycle_chopper(
                bus,
                off_time,
                blank_time,
                hysteresis_start,
                hysteresis_end,
                hysteresis_decrement,
            ),
        }
    }

    /// Constant off-time chopper with fast decay.
    ///
    /// | Argument | Range | Field |
    /// |----------|-------|-------|
    /// | `off_time` | 2..=15 | TOFF |
    /// | `blank_time` | clocks, coded 16/24/36/54 | TBL |
    /// | `fast_decay` | 0..=15 | bit 3 in HDEC0, bits 0..2 in HSTRT |
    /// | `sine_offset` | -3..=12 | HEND, biased by 3 |
    /// | `use_comparator` | | HDEC1 set when off |
    pub fn set_constant_off_time_chopper<B: ChipBus>(
        &mut self,
        bus: &mut B,
        off_time: u8,
        blank_time: u8,
        fast_decay: u8,
        sine_offset: i8,
        use_comparator: bool,
    ) -> Result<(), Error<B::Error>> {
        let off_time = off_time.clamp(2, 15);
        let fast_decay = u32::from(fast_decay.min(15));
        let sine_offset = (sine_offset.clamp(-3, 12) + 3) as u32;

        let reg = &mut self.registers.chopper_config;
        *reg &= !(chopconf::TBL.mask()
            | chopconf::HDEC.mask()
            | chopconf::HEND.mask()
            | chopconf::HSTRT.mask()
            | chopconf::TOFF.mask());
        chopconf::CHM.set_flag(reg, true);
        chopconf::TBL.set(reg, blank_code(blank_time));
        chopconf::TOFF.set(reg, u32::from(off_time));
        chopconf::HDEC0.set(reg, fast_decay >> 3);
        chopconf::HSTRT.set(reg, fast_decay & 0x7);
        chopconf::HEND.set(reg, sine_offset);
        chopconf::HDEC1.set_flag(reg, !use_comparator);

        self.off_time = off_time;
        self.send(bus, Register::ChopperConfig)
    }

    /// Spread-cycle chopper.
    ///
    /// `hysteresis_start` is 1..=8, `hysteresis_end` -3..=12 and
    /// `hysteresis_decrement` 0..=3; off and blank time as for
    /// [`set_constant_off_time_chopper`](Self::set_constant_off_time_chopper).
    pub fn set_spread_cycle_chopper<B: ChipBus>(
        &mut self,
        bus: &mut B,
        off_time: u8,
        blank_time: u8,
        hysteresis_start: u8,
        hysteresis_end: i8,
        hysteresis_decrement: u8,
    ) -> Result<(), Error<B::Error>> {
        let off_time = off_time.clamp(2, 15);
        let start = u32::from(hysteresis_start.clamp(1, 8) - 1);
        let end = (hysteresis_end.clamp(-3, 12) + 3) as u32;
        let decrement = u32::from(hysteresis_decrement.min(3));

        let reg = &mut self.registers.chopper_config;
        *reg &= !(chopconf::CHM.mask()
            | chopconf::TBL.mask()
            | chopconf::HDEC.mask()
            | chopconf::HEND.mask()
            | chopconf::HSTRT.mask()
            | chopconf::TOFF.mask());
        chopconf::TBL.set(reg, blank_code(blank_time));
        chopconf::TOFF.set(reg, u32::from(off_time));
        chopconf::HSTRT.set(reg, start);
        chopconf::HEND.set(reg, end);
        chopconf::HDEC.set(reg, decrement);

        self.off_time = off_time;
        self.send(bus, Register::ChopperConfig)
    }

    /// Randomize the chopper off time to spread its noise spectrum.
    pub fn set_random_off_time<B: ChipBus>(
        &mut self,
        bus: &mut B,
        random: bool,
    ) -> Result<(), Error<B::Error>> {
        chopconf::RNDTF.set_flag(&mut self.registers.chopper_config, random);
        self.send(bus, Register::ChopperConfig)
    }

    /// True if the chopper off time is randomized.
    pub fn random_off_time(&self) -> bool {
        chopconf::RNDTF.is_set(self.registers.chopper_config)
    }

    /// Switch the bridges on or off.
    ///
    /// Disabling zeroes only the off time, letting the motor free-wheel;
    /// enabling restores the off time of the last chopper setting.
    pub fn set_enabled<B: ChipBus>(&mut self, bus: &mut B, enabled: bool) -> Result<(), Error<B::Error>> {
        let off_time = if enabled { u32::from(self.off_time) } else { 0 };
        chopconf::TOFF.set(&mut self.registers.chopper_config, off_time);
        self.send(bus, Register::ChopperConfig)
    }

    /// True if the bridges are switched on.
    pub fn is_enabled(&self) -> bool {
        chopconf::TOFF.is_set(self.registers.chopper_config)
    }

    // =========================================================================
    // Stall guard
    // =========================================================================

    /// Set the stall guard threshold (-64..=63) and filter.
    pub fn set_stall_guard_threshold<B: ChipBus>(
        &mut self,
        bus: &mut B,
        threshold: i8,
        filter: bool,
    ) -> Result<(), Error<B::Error>> {
        let threshold = threshold.clamp(-64, 63);
        let reg = &mut self.registers.stall_guard_current;
        sgcsconf::SGT.set(reg, u32::from(threshold as u8));
        sgcsconf::SFILT.set_flag(reg, filter);
        self.send(bus, Register::StallGuardCurrent)
    }

    /// Programmed stall guard threshold.
    pub fn stall_guard_threshold(&self) -> i8 {
        let raw = sgcsconf::SGT.get(self.registers.stall_guard_current) as u8;
        ((raw << 1) as i8) >> 1
    }

    /// True if the stall guard filter is on.
    pub fn stall_guard_filter(&self) -> bool {
        sgcsconf::SFILT.is_set(self.registers.stall_guard_current)
    }

    // =========================================================================
    // CoolStep
    // =========================================================================

    /// Configure adaptive current control.
    ///
    /// Thresholds are in stall guard units (0..=480) and stored in steps
    /// of 32. This also enables CoolStep; the lower threshold is cached so
    /// [`set_cool_step_enabled`](Self::set_cool_step_enabled) can restore it.
    pub fn set_cool_step_configuration<B: ChipBus>(
        &mut self,
        bus: &mut B,
        lower_threshold: u16,
        hysteresis: u16,
        decrement_speed: u8,
        increment_size: u8,
        lower_current_limit: CoolStepLimit,
    ) -> Result<(), Error<B::Error>> {
        let lower = (lower_threshold.min(480) >> 5) as u8;
        let hysteresis = u32::from(hysteresis.min(480) >> 5);
        self.cool_step_lower = lower;
        self.cool_step_enabled = true;

        let reg = &mut self.registers.cool_step;
        smarten::SEMIN.set(reg, u32::from(lower));
        smarten::SEMAX.set(reg, hysteresis);
        smarten::SEUP.set(reg, u32::from(increment_size.min(3)));
        smarten::SEDN.set(reg, u32::from(decrement_speed.min(3)));
        smarten::SEIMIN.set_flag(reg, lower_current_limit == CoolStepLimit::Quarter);

        self.send(bus, Register::CoolStep)
    }

    /// Switch CoolStep on (restoring the configured lower threshold) or off.
    pub fn set_cool_step_enabled<B: ChipBus>(
        &mut self,
        bus: &mut B,
        enabled: bool,
    ) -> Result<(), Error<B::Error>> {
        self.cool_step_enabled = enabled;
        let semin = if enabled { u32::from(self.cool_step_lower) } else { 0 };
        smarten::SEMIN.set(&mut self.registers.cool_step, semin);
        self.send(bus, Register::CoolStep)
    }

    /// True if CoolStep is switched on.
    pub fn is_cool_step_enabled(&self) -> bool {
        self.cool_step_enabled
    }

    /// Configured lower threshold (kept while CoolStep is off).
    pub fn cool_step_lower_threshold(&self) -> u16 {
        u16::from(self.cool_step_lower) << 5
    }

    /// Configured hysteresis.
    pub fn cool_step_hysteresis(&self) -> u16 {
        (smarten::SEMAX.get(self.registers.cool_step) as u16) << 5
    }

    /// Stall guard value above which the current is reduced.
    pub fn cool_step_upper_threshold(&self) -> u16 {
        let semax = smarten::SEMAX.get(self.registers.cool_step) as u16;
        (u16::from(self.cool_step_lower) + semax + 1) << 5
    }

    /// Current increment size code.
    pub fn cool_step_increment_size(&self) -> u8 {
        smarten::SEUP.get(self.registers.cool_step) as u8
    }

    /// Current decrement speed code.
    pub fn cool_step_decrement_speed(&self) -> u8 {
        smarten::SEDN.get(self.registers.cool_step) as u8
    }

    /// Floor for the reduced current.
    pub fn cool_step_lower_current_limit(&self) -> CoolStepLimit {
        if smarten::SEIMIN.is_set(self.registers.cool_step) {
            CoolStepLimit::Quarter
        } else {
            CoolStepLimit::Half
        }
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Select `readout` and fetch a fresh status word.
    ///
    /// The chip answers a datagram with the status latched before it, so
    /// changing the readout takes a second transfer to see the new value.
    pub fn read_status<B: ChipBus>(
        &mut self,
        bus: &mut B,
        readout: ReadoutSelect,
    ) -> Result<DriverStatus, Error<B::Error>> {
        let changed = self.programmed_readout != Some(readout);
        drvconf::RDSEL.set(&mut self.registers.driver_config, readout.code());

        self.send(bus, Register::DriverConfig)?;
        if changed {
            self.send(bus, Register::DriverConfig)?;
        }
        Ok(self.status)
    }

    /// Readout selected in the shadow DRVCONF.
    pub fn readout_select(&self) -> ReadoutSelect {
        ReadoutSelect::from_driver_config(self.registers.driver_config)
    }

    /// Fetch the microstep position.
    pub fn read_motor_position<B: ChipBus>(&mut self, bus: &mut B) -> Result<u16, Error<B::Error>> {
        Ok(self.read_status(bus, ReadoutSelect::Position)?.readout_value())
    }

    /// Fetch the stall guard value; lower means more load.
    pub fn read_stall_guard<B: ChipBus>(&mut self, bus: &mut B) -> Result<u16, Error<B::Error>> {
        Ok(self.read_status(bus, ReadoutSelect::StallGuard)?.readout_value())
    }

    /// Fetch the current scale CoolStep is running at (0..=31).
    pub fn read_current_scaling<B: ChipBus>(&mut self, bus: &mut B) -> Result<u8, Error<B::Error>> {
        let status = self.read_status(bus, ReadoutSelect::CurrentAndStallGuardHigh)?;
        Ok(status.current_scale())
    }

    fn send<B: ChipBus>(&mut self, bus: &mut B, reg: Register) -> Result<(), Error<B::Error>> {
        let mut frame = self.registers.datagram(reg);
        bus.transmit(self.address.line(Signal::Enable), &mut frame)?;
        self.status = DriverStatus::from_response(frame);
        if reg == Register::DriverConfig {
            self.programmed_readout = Some(self.readout_select());
        }
        debug!(
            "tmc26x {:?} <- {:05x}, status {:05x}",
            reg,
            self.registers.get(reg),
            self.status.raw()
        );
        Ok(())
    }
}

/// `floor(R * I * 32 / V - 0.5)` in integers, with R in milliohms, I in
/// milliamps and V in millivolts.
fn current_scale(sense_mohm: u32, ma: u32, vref_mv: u32) -> i64 {
    let a = 32 * i128::from(sense_mohm) * i128::from(ma);
    let b = i128::from(vref_mv) * 1000;
    (2 * a - b).div_euclid(2 * b).min(i128::from(i64::MAX)) as i64
}

/// TBL code for a blank time in clocks.
fn blank_code(blank_time: u8) -> u32 {
    match blank_time {
        54.. => 3,
        36..=53 => 2,
        24..=35 => 1,
        _ => 0,
    }
}
