//! Slot board walkthrough on mock hardware.
//!
//! Brings up one board with a TMC26x in slot 1 and a thermocouple reader
//! in slot 2, all on recording mocks, and logs what each step does.
//!
//! # Usage
//!
//! ```sh
//! RUST_LOG=debug cargo run --example slot_board
//! ```
//!
//! # Configuration
//!
//! Edit the `Config::default()` chain in `main()` to try other slots,
//! currents or chopper settings.

use anyhow::Context;
use stepchain::config::{ChopperConfig, CoolStepConfig, SlotConfig, TmcConfig};
use stepchain::hal::{LineLog, NoDelay};
use stepchain::{Bus, Config, Direction, IoChain, ReadoutSelect, Thermocouple, Tmc26x};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::default()
        .with_motor(
            TmcConfig::new(1, 1)
                .with_current_ma(800)
                .with_chopper(ChopperConfig::spread_cycle())
                .with_cool_step(CoolStepConfig::default()),
        )
        .with_thermocouple(SlotConfig::new(1, 2));
    config.validate().context("invalid board configuration")?;

    let log = LineLog::new();
    let mut chain = IoChain::new(log.chain_lines(), NoDelay);
    chain.init(config.chain.boards)?;
    let mut bus = Bus::new(chain, log.spi());

    // Motor
    let mut motor = Tmc26x::new(&mut bus, config.motors[0].clone())?;
    motor.start(&mut bus)?;
    info!(
        "motor started: {} mA (halved reference: {}), {} microsteps",
        motor.current(),
        motor.is_current_scaling_halved(),
        motor.microsteps()
    );

    motor.set_direction(&mut bus, Direction::Forward)?;
    for _ in 0..8 {
        motor.step(&mut bus)?;
    }

    bus.spi.queue_response(&[0x00, 0x00, 0x00]);
    bus.spi.queue_response(&[0x1C, 0x40, 0x00]);
    let scale = motor.read_current_scaling(&mut bus)?;
    info!("CoolStep running at scale {} ({} mA)", scale, motor.actual_current());

    let status = motor.read_status(&mut bus, ReadoutSelect::StallGuard)?;
    info!(
        "status: over-temperature {:?}, standstill {}",
        status.over_temperature(),
        status.standstill()
    );

    // Thermocouples
    let slot = config.thermocouples[0].address()?;
    let mut thermocouple = Thermocouple::new(&mut bus, slot)?;
    for sub_chip in 1..=3 {
        bus.spi.queue_response(&[0x01, 0x90, 0x19, 0x00]);
        match thermocouple.read_celsius(&mut bus, sub_chip)? {
            Some(c) => info!("thermocouple {}: {:.2} °C", sub_chip, c),
            None => info!("thermocouple {}: fault", sub_chip),
        }
    }

    info!(
        "{} frames exchanged, {} strobes",
        bus.spi.sent.len(),
        log.pulses(stepchain::hal::LineId::Strobe)
    );
    Ok(())
}
