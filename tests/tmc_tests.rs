//! Integration tests for the TMC26x register model

use stepchain::{
    config::{ChopperConfig, CoolStepConfig, StallGuardConfig, TmcConfig},
    hal::{LineId, LineLog, MockLine, MockSpi, MockSpiError, NoDelay},
    Bus, CoolStepLimit, Direction, Error, IoChain, OverTemperature, ReadoutSelect, Tmc26x,
};

type TestBus = Bus<MockLine, NoDelay, MockSpi>;

fn bus(log: &LineLog) -> TestBus {
    let mut chain = IoChain::new(log.chain_lines(), NoDelay);
    chain.init(1).unwrap();
    Bus::new(chain, log.spi())
}

fn started(config: TmcConfig) -> (LineLog, TestBus, Tmc26x) {
    let log = LineLog::new();
    let mut bus = bus(&log);
    let mut tmc = Tmc26x::new(&mut bus, config).unwrap();
    tmc.start(&mut bus).unwrap();
    bus.spi.sent.clear();
    (log, bus, tmc)
}

fn last_word(bus: &TestBus) -> u32 {
    *bus.spi.sent_words().last().unwrap()
}

// ============================================================================
// Start-up
// ============================================================================

#[test]
fn start_sends_defaults_then_configuration() {
    let log = LineLog::new();
    let mut bus = bus(&log);
    let mut tmc = Tmc26x::new(&mut bus, TmcConfig::new(1, 1)).unwrap();
    tmc.start(&mut bus).unwrap();

    assert_eq!(
        bus.spi.sent_words(),
        vec![
            0x0_0003, 0x8_0000, 0xA_0000, 0xC_0000, 0xE_0010, // shadows
            0xE_0050, 0xC_0011, // 1000 mA
            0x9_CFD7, // constant off-time chopper
            0x0_0003, // 32 microsteps
        ]
    );
}

#[test]
fn start_applies_optional_tuning() {
    let config = TmcConfig::new(1, 1)
        .with_chopper(ChopperConfig::spread_cycle())
        .with_stall_guard(StallGuardConfig {
            threshold: 5,
            filter: true,
        })
        .with_cool_step(CoolStepConfig::default())
        .with_random_off_time(true);
    let (_log, _bus, tmc) = started(config);

    assert_eq!(tmc.stall_guard_threshold(), 5);
    assert!(tmc.stall_guard_filter());
    assert!(tmc.is_cool_step_enabled());
    assert_eq!(tmc.cool_step_lower_threshold(), 480);
    assert!(tmc.random_off_time());
    assert_eq!(tmc.registers().chopper_config, 0x9_21B4);
}

// ============================================================================
// Wire protocol
// ============================================================================

#[test]
fn chip_is_selected_only_during_transfer() {
    let log = LineLog::new();
    let mut bus = bus(&log);
    let mut tmc = Tmc26x::new(&mut bus, TmcConfig::new(1, 3)).unwrap();
    tmc.start(&mut bus).unwrap();

    let during = log.latched_during_transfers();
    assert_eq!(during.len(), 9);
    assert!(during.iter().all(|outputs| !outputs[16]));
    assert!(log.latched().unwrap()[16]);
    assert!(bus.chain.bit(16).unwrap());
}

#[test]
fn frames_are_three_bytes_msb_first() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_microsteps(&mut bus, 256).unwrap();
    assert_eq!(bus.spi.sent, vec![vec![0x00, 0x00, 0x00]]);

    tmc.set_current(&mut bus, 1000).unwrap();
    assert_eq!(bus.spi.sent[1], vec![0x0E, 0x00, 0x50]);
    assert_eq!(bus.spi.sent[2], vec![0x0C, 0x00, 0x11]);
    assert_eq!(bus.spi.last_sent(), Some(&[0x0C, 0x00, 0x11][..]));
}

#[test]
fn transfer_failure_propagates_and_deselects() {
    let (log, mut bus, mut tmc) = started(TmcConfig::default());
    bus.spi.fail_next();

    assert_eq!(
        tmc.set_microsteps(&mut bus, 16),
        Err(Error::Transfer(MockSpiError))
    );
    assert!(log.latched().unwrap()[0]);
}

// ============================================================================
// Current
// ============================================================================

#[test]
fn current_1000ma_uses_halved_reference() {
    let (_log, _bus, tmc) = started(TmcConfig::default());
    assert_eq!(tmc.registers().stall_guard_current & 0x1F, 17);
    assert!(tmc.is_current_scaling_halved());
    assert_eq!(tmc.current(), 1019);
}

#[test]
fn current_round_trip_within_one_step() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());

    for ma in (100..=2000).step_by(50) {
        tmc.set_current(&mut bus, ma).unwrap();
        let vref = if tmc.is_current_scaling_halved() { 165 } else { 310 };
        let step = vref * 1000 / (32 * 91);
        let got = tmc.current();
        assert!(got.abs_diff(ma) <= step, "{} mA read back as {}", ma, got);
    }
}

#[test]
fn high_current_saturates() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_current(&mut bus, 5000).unwrap();

    assert_eq!(tmc.registers().stall_guard_current & 0x1F, 31);
    assert!(!tmc.is_current_scaling_halved());
    assert_eq!(tmc.current(), 3406);
}

#[test]
fn zero_current_clamps_to_lowest_scale() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_current(&mut bus, 0).unwrap();

    assert_eq!(tmc.registers().stall_guard_current & 0x1F, 0);
    assert!(tmc.is_current_scaling_halved());
    // driver config first, then the scale
    assert_eq!(bus.spi.sent_words(), vec![0xE_0050, 0xC_0000]);
}

// ============================================================================
// Microstepping
// ============================================================================

#[test]
fn microstep_index() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    for (n, index) in [(256, 0), (128, 1), (32, 3), (31, 4), (2, 7), (1, 8), (0, 8)] {
        tmc.set_microsteps(&mut bus, n).unwrap();
        assert_eq!(last_word(&bus), index, "{} microsteps", n);
    }
}

#[test]
fn microsteps_keep_other_control_bits() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_microsteps(&mut bus, 4).unwrap();
    assert_eq!(tmc.registers().driver_control, 0x0_0006);
    assert_eq!(tmc.microsteps(), 4);
}

// ============================================================================
// Chopper
// ============================================================================

#[test]
fn constant_off_time_chopper_layout() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());

    tmc.set_constant_off_time_chopper(&mut bus, 7, 54, 13, 12, true)
        .unwrap();
    assert_eq!(last_word(&bus), 0x9_CFD7);

    // off clamps to 2, fast decay bit 3 lands in bit 11, comparator off sets bit 12
    tmc.set_constant_off_time_chopper(&mut bus, 1, 0, 8, -3, false)
        .unwrap();
    assert_eq!(last_word(&bus), 0x8_5802);

    // everything saturates
    tmc.set_constant_off_time_chopper(&mut bus, 200, 255, 99, 100, true)
        .unwrap();
    assert_eq!(last_word(&bus), 0x9_CFFF);
}

#[test]
fn spread_cycle_chopper_layout() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());

    tmc.set_spread_cycle_chopper(&mut bus, 4, 36, 4, 0, 0).unwrap();
    assert_eq!(last_word(&bus), 0x9_01B4);

    tmc.set_spread_cycle_chopper(&mut bus, 15, 54, 8, 12, 3).unwrap();
    assert_eq!(last_word(&bus), 0x9_9FFF);

    tmc.set_spread_cycle_chopper(&mut bus, 0, 24, 0, -100, 9).unwrap();
    assert_eq!(last_word(&bus), 0x8_9802);
}

#[test]
fn chopper_keeps_random_off_time() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_random_off_time(&mut bus, true).unwrap();
    assert_eq!(last_word(&bus), 0x9_EFD7);

    tmc.set_spread_cycle_chopper(&mut bus, 4, 36, 4, 0, 0).unwrap();
    assert_eq!(last_word(&bus), 0x9_21B4);

    tmc.set_random_off_time(&mut bus, false).unwrap();
    assert_eq!(last_word(&bus), 0x9_01B4);
    assert!(!tmc.random_off_time());
}

#[test]
fn disable_then_enable_restores_off_time() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    let before = tmc.registers().chopper_config;

    tmc.set_enabled(&mut bus, false).unwrap();
    assert!(!tmc.is_enabled());
    assert_eq!(last_word(&bus), before & !0xF);

    tmc.set_enabled(&mut bus, true).unwrap();
    assert!(tmc.is_enabled());
    assert_eq!(tmc.registers().chopper_config, before);
}

#[test]
fn enable_restores_latest_chopper_off_time() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_enabled(&mut bus, false).unwrap();
    tmc.set_spread_cycle_chopper(&mut bus, 9, 36, 4, 0, 0).unwrap();
    tmc.set_enabled(&mut bus, false).unwrap();
    tmc.set_enabled(&mut bus, true).unwrap();
    assert_eq!(tmc.registers().chopper_config & 0xF, 9);
}

// ============================================================================
// Stall guard
// ============================================================================

#[test]
fn stall_guard_threshold_layout() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());

    tmc.set_stall_guard_threshold(&mut bus, -1, true).unwrap();
    assert_eq!(last_word(&bus), 0xD_7F11);

    tmc.set_stall_guard_threshold(&mut bus, 5, false).unwrap();
    assert_eq!(last_word(&bus), 0xC_0511);

    tmc.set_stall_guard_threshold(&mut bus, 100, false).unwrap();
    assert_eq!(tmc.stall_guard_threshold(), 63);
    assert_eq!(last_word(&bus), 0xC_3F11);

    tmc.set_stall_guard_threshold(&mut bus, -64, false).unwrap();
    assert_eq!(last_word(&bus), 0xC_4011);
}

#[test]
fn current_keeps_stall_guard_bits() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_stall_guard_threshold(&mut bus, -1, true).unwrap();
    tmc.set_current(&mut bus, 5000).unwrap();
    assert_eq!(tmc.registers().stall_guard_current, 0xD_7F1F);
}

// ============================================================================
// CoolStep
// ============================================================================

#[test]
fn cool_step_configuration_enables_cool_step() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    assert!(!tmc.is_cool_step_enabled());
    tmc.set_cool_step_configuration(&mut bus, 480, 224, 2, 1, CoolStepLimit::Quarter)
        .unwrap();

    assert_eq!(last_word(&bus), 0xA_C72F);
    assert_eq!(last_word(&bus) & 0xF, 15);
    assert!(tmc.is_cool_step_enabled());
    assert_eq!(tmc.cool_step_lower_threshold(), 480);
    assert_eq!(tmc.cool_step_hysteresis(), 224);
    assert_eq!(tmc.cool_step_upper_threshold(), 736);
    assert_eq!(tmc.cool_step_increment_size(), 1);
    assert_eq!(tmc.cool_step_decrement_speed(), 2);
    assert_eq!(tmc.cool_step_lower_current_limit(), CoolStepLimit::Quarter);
}

#[test]
fn cool_step_enable_restores_cached_threshold() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_cool_step_configuration(&mut bus, 480, 224, 2, 1, CoolStepLimit::Quarter)
        .unwrap();

    tmc.set_cool_step_enabled(&mut bus, false).unwrap();
    assert_eq!(last_word(&bus), 0xA_C720);
    assert!(!tmc.is_cool_step_enabled());
    assert_eq!(tmc.cool_step_lower_threshold(), 480);

    tmc.set_cool_step_enabled(&mut bus, true).unwrap();
    assert_eq!(last_word(&bus), 0xA_C72F);
}

#[test]
fn cool_step_reconfiguration_after_disable_reenables() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    tmc.set_cool_step_enabled(&mut bus, false).unwrap();
    tmc.set_cool_step_configuration(&mut bus, 100, 1000, 9, 9, CoolStepLimit::Half)
        .unwrap();

    // 100 / 32 = 3, hysteresis saturates at 480 / 32 = 15
    assert_eq!(last_word(&bus), 0xA_6F63);
    assert!(tmc.is_cool_step_enabled());
    assert_eq!(tmc.cool_step_lower_threshold(), 96);
    assert_eq!(tmc.cool_step_lower_current_limit(), CoolStepLimit::Half);
}

// ============================================================================
// Status readback
// ============================================================================

#[test]
fn same_readout_transmits_once() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    assert_eq!(tmc.readout_select(), ReadoutSelect::StallGuard);

    tmc.read_status(&mut bus, ReadoutSelect::StallGuard).unwrap();
    assert_eq!(bus.spi.sent.len(), 1);
    tmc.read_status(&mut bus, ReadoutSelect::StallGuard).unwrap();
    assert_eq!(bus.spi.sent.len(), 2);
}

#[test]
fn changed_readout_transmits_twice() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());

    tmc.read_status(&mut bus, ReadoutSelect::Position).unwrap();
    assert_eq!(bus.spi.sent_words(), vec![0xE_0040, 0xE_0040]);

    tmc.read_status(&mut bus, ReadoutSelect::Position).unwrap();
    assert_eq!(bus.spi.sent.len(), 3);

    tmc.read_status(&mut bus, ReadoutSelect::CurrentAndStallGuardHigh)
        .unwrap();
    assert_eq!(bus.spi.sent.len(), 5);
    assert_eq!(last_word(&bus), 0xE_0060);
}

#[test]
fn readout_change_is_resent_after_failed_transfer() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    bus.spi.fail_next();
    assert!(tmc.read_status(&mut bus, ReadoutSelect::Position).is_err());
    assert!(bus.spi.sent.is_empty());

    tmc.read_status(&mut bus, ReadoutSelect::Position).unwrap();
    assert_eq!(bus.spi.sent_words(), vec![0xE_0040, 0xE_0040]);

    tmc.read_status(&mut bus, ReadoutSelect::Position).unwrap();
    assert_eq!(bus.spi.sent.len(), 3);
}

#[test]
fn status_comes_from_second_transfer() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    bus.spi.queue_response(&[0xFF, 0xFF, 0xF0]);
    bus.spi.queue_response(&[0x55, 0x48, 0x00]);

    assert_eq!(tmc.read_motor_position(&mut bus).unwrap(), 0x155);
    let status = tmc.status();
    assert!(status.standstill());
    assert!(!status.stall_guard_reached());
    assert_eq!(status.over_temperature(), OverTemperature::Normal);
}

#[test]
fn status_accessors_do_not_transmit() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    bus.spi.queue_response(&[0x00, 0x00, 0x70]);
    tmc.read_status(&mut bus, ReadoutSelect::StallGuard).unwrap();
    let sent = bus.spi.sent.len();

    let status = tmc.status();
    assert!(status.stall_guard_reached());
    assert!(status.over_temperature_shutdown());
    assert!(status.over_temperature_warning());
    assert_eq!(status.over_temperature(), OverTemperature::Shutdown);
    assert!(!status.short_to_ground_a());
    let _ = tmc.actual_current();
    assert_eq!(bus.spi.sent.len(), sent);
}

#[test]
fn current_scaling_readout() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    bus.spi.queue_response(&[0x00, 0x00, 0x00]);
    bus.spi.queue_response(&[0x1C, 0x40, 0x00]);

    assert_eq!(tmc.read_current_scaling(&mut bus).unwrap(), 17);
    assert_eq!(tmc.actual_current(), 1019);
}

#[test]
fn stall_guard_readout() {
    let (_log, mut bus, mut tmc) = started(TmcConfig::default());
    // readout 0x3FF, no flags
    bus.spi.queue_response(&[0xFF, 0xC0, 0x00]);
    assert_eq!(tmc.read_stall_guard(&mut bus).unwrap(), 0x3FF);
    assert_eq!(bus.spi.sent.len(), 1);
}

// ============================================================================
// Step / direction
// ============================================================================

#[test]
fn step_pulses_slot_line() {
    let (log, mut bus, mut tmc) = started(TmcConfig::new(1, 2));
    log.clear();

    tmc.step(&mut bus).unwrap();
    assert_eq!(log.pulses(LineId::Strobe), 2);
    assert_eq!(log.transfers(), 0);

    // step line of slot 2 is output 14: high in the first commit, low in the second
    let shifted = log.shifted_bits();
    assert!(shifted[31 - 14]);
    assert!(!shifted[32 + 31 - 14]);
    assert!(!log.latched().unwrap()[14]);
}

#[test]
fn direction_drives_slot_line() {
    let (log, mut bus, mut tmc) = started(TmcConfig::new(1, 2));

    tmc.set_direction(&mut bus, Direction::Forward).unwrap();
    assert!(log.latched().unwrap()[11]);

    tmc.set_direction(&mut bus, Direction::Forward.reversed()).unwrap();
    assert!(!log.latched().unwrap()[11]);
}
