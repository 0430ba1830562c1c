//! TMC26x register layout and shadow copies.
//!
//! The chip has five write-only 20-bit registers, told apart by their top
//! address bits. Each is sent as one 24-bit datagram (upper four bits
//! zero), most significant byte first.
//!
//! | Register | Prefix | Default |
//! |----------|--------|---------|
//! | DRVCTRL | `0x00000` | `0x00003` |
//! | CHOPCONF | `0x80000` | `0x80000` |
//! | SMARTEN | `0xA0000` | `0xA0000` |
//! | SGCSCONF | `0xC0000` | `0xC0000` |
//! | DRVCONF | `0xE0000` | `0xE0010` |

/// Mask of the 20 datagram bits.
pub const REGISTER_MASK: u32 = 0xF_FFFF;

/// A contiguous bit range inside a register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    shift: u8,
    width: u8,
}

impl Field {
    /// Field of `width` bits starting at bit `shift`.
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// Single-bit field.
    pub const fn bit(shift: u8) -> Self {
        Self::new(shift, 1)
    }

    /// The field's bits in register position.
    pub const fn mask(self) -> u32 {
        ((1u32 << self.width) - 1) << self.shift
    }

    /// Field value extracted from `reg`.
    pub const fn get(self, reg: u32) -> u32 {
        (reg & self.mask()) >> self.shift
    }

    /// Replace the field in `reg` with `value` (excess bits are dropped).
    pub fn set(self, reg: &mut u32, value: u32) {
        *reg = (*reg & !self.mask()) | ((value << self.shift) & self.mask());
    }

    /// Set or clear a single-bit field.
    pub fn set_flag(self, reg: &mut u32, on: bool) {
        self.set(reg, u32::from(on));
    }

    /// True if any bit of the field is set in `reg`.
    pub const fn is_set(self, reg: u32) -> bool {
        reg & self.mask() != 0
    }
}

/// DRVCTRL fields (step/direction mode).
pub mod drvctrl {
    use super::Field;

    /// Register prefix.
    pub const PREFIX: u32 = 0x0_0000;
    /// Microstep resolution index (256 >> MRES).
    pub const MRES: Field = Field::new(0, 4);
    /// Step on both edges.
    pub const DEDGE: Field = Field::bit(8);
    /// Step interpolation.
    pub const INTPOL: Field = Field::bit(9);
}

/// CHOPCONF fields.
pub mod chopconf {
    use super::Field;

    /// Register prefix.
    pub const PREFIX: u32 = 0x8_0000;
    /// Off time; zero disables the bridges.
    pub const TOFF: Field = Field::new(0, 4);
    /// Hysteresis start, or fast decay time bits 0..2 in constant off-time mode.
    pub const HSTRT: Field = Field::new(4, 3);
    /// Hysteresis end, or sine wave offset in constant off-time mode.
    pub const HEND: Field = Field::new(7, 4);
    /// Hysteresis decrement interval.
    pub const HDEC: Field = Field::new(11, 2);
    /// Fast decay time bit 3 in constant off-time mode.
    pub const HDEC0: Field = Field::bit(11);
    /// Comparator disabled in constant off-time mode.
    pub const HDEC1: Field = Field::bit(12);
    /// Random off time.
    pub const RNDTF: Field = Field::bit(13);
    /// Chopper mode; set selects constant off time.
    pub const CHM: Field = Field::bit(14);
    /// Blanking time code.
    pub const TBL: Field = Field::new(15, 2);
}

/// SMARTEN fields (CoolStep).
pub mod smarten {
    use super::Field;

    /// Register prefix.
    pub const PREFIX: u32 = 0xA_0000;
    /// Lower stall guard threshold / 32; zero disables CoolStep.
    pub const SEMIN: Field = Field::new(0, 4);
    /// Current increment size.
    pub const SEUP: Field = Field::new(5, 2);
    /// Upper threshold hysteresis / 32.
    pub const SEMAX: Field = Field::new(8, 4);
    /// Current decrement speed.
    pub const SEDN: Field = Field::new(13, 2);
    /// Minimum current; set selects a quarter of the scale.
    pub const SEIMIN: Field = Field::bit(15);
}

/// SGCSCONF fields (stall guard and current scale).
pub mod sgcsconf {
    use super::Field;

    /// Register prefix.
    pub const PREFIX: u32 = 0xC_0000;
    /// Current scale (0..=31).
    pub const CS: Field = Field::new(0, 5);
    /// Stall guard threshold, 7-bit two's complement.
    pub const SGT: Field = Field::new(8, 7);
    /// Stall guard filter.
    pub const SFILT: Field = Field::bit(16);
}

/// DRVCONF fields.
pub mod drvconf {
    use super::Field;

    /// Register prefix.
    pub const PREFIX: u32 = 0xE_0000;
    /// Readout select.
    pub const RDSEL: Field = Field::new(4, 2);
    /// Halved sense resistor full-scale voltage.
    pub const VSENSE: Field = Field::bit(6);
}

/// Identifies one of the five configuration registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Register {
    /// Driver control.
    DriverControl,
    /// Chopper configuration.
    ChopperConfig,
    /// CoolStep control.
    CoolStep,
    /// Stall guard and current scale.
    StallGuardCurrent,
    /// Driver configuration.
    DriverConfig,
}

impl Register {
    /// All registers in the order they are sent at start-up.
    pub const ALL: [Register; 5] = [
        Register::DriverControl,
        Register::ChopperConfig,
        Register::CoolStep,
        Register::StallGuardCurrent,
        Register::DriverConfig,
    ];

    /// Address prefix.
    pub const fn prefix(self) -> u32 {
        match self {
            Register::DriverControl => drvctrl::PREFIX,
            Register::ChopperConfig => chopconf::PREFIX,
            Register::CoolStep => smarten::PREFIX,
            Register::StallGuardCurrent => sgcsconf::PREFIX,
            Register::DriverConfig => drvconf::PREFIX,
        }
    }
}

/// Shadow copies of the five write-only registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    /// DRVCTRL.
    pub driver_control: u32,
    /// CHOPCONF.
    pub chopper_config: u32,
    /// SMARTEN.
    pub cool_step: u32,
    /// SGCSCONF.
    pub stall_guard_current: u32,
    /// DRVCONF.
    pub driver_config: u32,
}

impl Default for Registers {
    fn default() -> Self {
        Self {
            driver_control: 0x0_0003,
            chopper_config: chopconf::PREFIX,
            cool_step: smarten::PREFIX,
            stall_guard_current: sgcsconf::PREFIX,
            driver_config: 0xE_0010,
        }
    }
}

impl Registers {
    /// Shadow value of `reg`.
    pub fn get(&self, reg: Register) -> u32 {
        match reg {
            Register::DriverControl => self.driver_control,
            Register::ChopperConfig => self.chopper_config,
            Register::CoolStep => self.cool_step,
            Register::StallGuardCurrent => self.stall_guard_current,
            Register::DriverConfig => self.driver_config,
        }
    }

    /// The 3-byte datagram for `reg`, most significant byte first.
    pub fn datagram(&self, reg: Register) -> [u8; 3] {
        let value = self.get(reg) & REGISTER_MASK;
        [(value >> 16) as u8, (value >> 8) as u8, value as u8]
    }
}
