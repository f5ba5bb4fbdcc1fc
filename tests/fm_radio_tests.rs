//! FM Radio Tests
//!
//! Tests for the RDA5820 transceiver and the QN8025 receiver against a
//! fake I2C register file
//! Run with: cargo test --test fm_radio_tests

mod common;

use common::{FakeDelay, FakeI2c};
use embassy_futures::block_on;
use instrument_firmware::drivers::qn8025::{self, Qn8025, SeekStep, SignalCheck};
use instrument_firmware::drivers::rda5820::{bits, reg, Band, Rda5820, Spacing, WorkMode};
use instrument_firmware::drivers::Error;

// =============================================================================
// RDA5820
// =============================================================================

fn rda() -> (Rda5820<FakeI2c, FakeDelay>, FakeI2c) {
    let i2c = FakeI2c::word_registers(0x11);
    i2c.set(reg::CHIP_ID, 0x5820);
    let probe = i2c.clone();
    (Rda5820::new(i2c, FakeDelay::new()), probe)
}

fn rda_ready() -> (Rda5820<FakeI2c, FakeDelay>, FakeI2c) {
    let (mut radio, probe) = rda();
    block_on(radio.init()).unwrap();
    (radio, probe)
}

#[test]
fn test_rda_init_checks_id_and_powers_up() {
    let (mut radio, probe) = rda();
    assert_eq!(block_on(radio.init()).unwrap(), 0x5820);
    assert_eq!(
        probe.writes_to(reg::R02),
        vec![bits::SOFT_RESET, bits::DHIZ | bits::DMUTE | bits::ENABLE]
    );
    // shadow copy loaded from the chip
    assert_eq!(radio.cached(reg::R02), 0xC001);
}

#[test]
fn test_rda_unknown_chip() {
    let (mut radio, probe) = rda();
    probe.set(reg::CHIP_ID, 0x1234);
    assert_eq!(block_on(radio.init()), Err(Error::UnknownChip(0x1234)));
    assert!(probe.writes().is_empty());
}

#[test]
fn test_rda_bus_error() {
    let (mut radio, probe) = rda();
    probe.fail(true);
    assert!(matches!(block_on(radio.init()), Err(Error::Bus(_))));
}

#[test]
fn test_rda_set_frequency() {
    let (mut radio, probe) = rda_ready();
    probe.set(reg::R0B, bits::FM_READY);

    block_on(radio.set_frequency(100_000)).unwrap();
    // (100000 - 87000) / 100 = channel 130
    assert_eq!(probe.writes_to(reg::R03), vec![(130 << 6) | bits::TUNE]);
    assert_eq!(radio.cached(reg::R03), 130 << 6);
}

#[test]
fn test_rda_set_frequency_keeps_band_and_spacing() {
    let (mut radio, probe) = rda_ready();
    probe.set(reg::R0B, bits::FM_READY);

    block_on(radio.set_spacing(Spacing::Khz200)).unwrap();
    block_on(radio.set_frequency(100_000)).unwrap();
    assert_eq!(radio.spacing(), Spacing::Khz200);
    assert_eq!(probe.get(reg::R03), (65 << 6) | bits::TUNE | 0x1);
}

#[test]
fn test_rda_set_frequency_times_out() {
    let (mut radio, _probe) = rda_ready();
    assert_eq!(block_on(radio.set_frequency(100_000)), Err(Error::Timeout));
}

#[test]
fn test_rda_below_band_rejected() {
    let (mut radio, probe) = rda_ready();
    assert_eq!(block_on(radio.set_frequency(80_000)), Err(Error::OutOfRange));
    assert!(probe.writes_to(reg::R03).is_empty());
}

#[test]
fn test_rda_band_bottoms() {
    assert_eq!(Band::Standard.bottom_khz(), Some(87_000));
    assert_eq!(Band::Japan.bottom_khz(), Some(76_000));
    assert_eq!(Band::World.bottom_khz(), Some(76_000));
    assert_eq!(Band::Custom.bottom_khz(), None);
    assert_eq!(Spacing::Khz25.khz(), 25);
}

#[test]
fn test_rda_custom_band_reads_bottom() {
    let (mut radio, probe) = rda_ready();
    block_on(radio.set_band(Band::Custom)).unwrap();
    assert_eq!(radio.band(), Band::Custom);
    assert_eq!(probe.get(reg::R03), 0x000C);

    probe.set(reg::R53, 650);
    probe.set(reg::R0A, 16);
    assert_eq!(block_on(radio.frequency()).unwrap(), 66_600);
}

#[test]
fn test_rda_seek_found() {
    let (mut radio, probe) = rda_ready();
    probe.script(reg::R0A, &[0x0000, bits::STC | 50]);

    assert_eq!(block_on(radio.seek(true)).unwrap(), Some(92_000));
    let r02 = probe.writes_to(reg::R02);
    assert_eq!(&r02[r02.len() - 2..], &[0xC301, 0xC201]);
}

#[test]
fn test_rda_seek_failed() {
    let (mut radio, probe) = rda_ready();
    probe.set(reg::R0A, bits::STC | bits::SF);
    assert_eq!(block_on(radio.seek(false)).unwrap(), None);
    // seek bit cleared again
    assert_eq!(radio.cached(reg::R02) & bits::SEEK, 0);
}

#[test]
fn test_rda_seek_times_out() {
    let (mut radio, _probe) = rda_ready();
    assert_eq!(block_on(radio.seek(true)), Err(Error::Timeout));
    assert_eq!(radio.cached(reg::R02) & bits::SEEK, 0);
}

#[test]
fn test_rda_volume_and_mute() {
    let (mut radio, _probe) = rda_ready();
    block_on(radio.set_volume(20)).unwrap();
    assert_eq!(radio.cached(reg::R05) & 0x000F, 15);

    block_on(radio.set_mute(true)).unwrap();
    assert_eq!(radio.cached(reg::R02), 0x8001);
    block_on(radio.set_mute(false)).unwrap();
    assert_eq!(radio.cached(reg::R02), 0xC001);
}

#[test]
fn test_rda_work_mode_and_tx_gain() {
    let (mut radio, _probe) = rda_ready();
    block_on(radio.set_work_mode(WorkMode::Transmit)).unwrap();
    assert_eq!(radio.cached(reg::R40) & 0x000F, 1);
    block_on(radio.set_rx_mode()).unwrap();
    assert_eq!(radio.cached(reg::R40) & 0x000F, 0);

    block_on(radio.set_tx_pa_gain(0xFF)).unwrap();
    block_on(radio.set_tx_pga_gain(5)).unwrap();
    assert_eq!(radio.cached(reg::R42), 0x053F);
}

#[test]
fn test_rda_status_readouts() {
    let (mut radio, probe) = rda_ready();
    probe.set(reg::R0B, 0x7F << 9);
    probe.set(reg::R0A, bits::STEREO);
    assert_eq!(block_on(radio.rssi()).unwrap(), 0x7F);
    assert!(block_on(radio.is_stereo()).unwrap());
}

// =============================================================================
// QN8025
// =============================================================================

use qn8025::reg as qreg;

fn qn() -> (Qn8025<FakeI2c, FakeDelay>, FakeI2c) {
    let i2c = FakeI2c::byte_registers(0x10);
    let probe = i2c.clone();
    (Qn8025::new(i2c, FakeDelay::new()), probe)
}

/// Scan bit clears as soon as it is written, so seeks finish at once
fn qn_seeking() -> (Qn8025<FakeI2c, FakeDelay>, FakeI2c) {
    let (radio, probe) = qn();
    probe.self_clearing(qreg::SYSTEM1, 0x02);
    (radio, probe)
}

#[test]
fn test_qn_channel_index() {
    assert_eq!(qn8025::channel_index(61_750), Some(0));
    assert_eq!(qn8025::channel_index(100_000), Some(765));
    assert_eq!(qn8025::channel_index(108_000), Some(925));
    assert_eq!(qn8025::channel_index(61_700), None);
    assert_eq!(qn8025::channel_index(108_050), None);
    assert_eq!(qn8025::index_khz(765), 100_000);
}

#[test]
fn test_qn_begin_reads_id() {
    let (mut radio, probe) = qn();
    probe.set(qreg::CID1, 0x0D);
    probe.set(qreg::CID2, 0x84);
    let id = block_on(radio.begin()).unwrap();
    assert_eq!((id.cid1, id.cid2), (0x0D, 0x84));
}

#[test]
fn test_qn_begin_not_connected() {
    let (mut radio, probe) = qn();
    probe.fail(true);
    assert_eq!(block_on(radio.begin()), Err(Error::NotConnected));
}

#[test]
fn test_qn_set_frequency() {
    let (mut radio, probe) = qn();
    probe.set(qreg::CH_STEP, 0x40);

    block_on(radio.set_frequency(100_000)).unwrap();
    assert_eq!(
        probe.writes(),
        vec![(qreg::CH, 0xFD), (qreg::CH_STEP, 0x42), (qreg::SYSTEM1, 0x11)]
    );
    assert_eq!(radio.frequency(), Some(100_000));
}

#[test]
fn test_qn_set_frequency_out_of_range() {
    let (mut radio, probe) = qn();
    assert_eq!(block_on(radio.set_frequency(50_000)), Err(Error::OutOfRange));
    assert!(probe.writes().is_empty());
    assert_eq!(radio.frequency(), None);
}

#[test]
fn test_qn_auto_seek_found() {
    let (mut radio, probe) = qn_seeking();
    probe.script(qreg::CH, &[0xFD]);
    probe.script(qreg::CH_STEP, &[0x76]);

    let found = block_on(radio.auto_seek(87_000, 108_000, SeekStep::Khz100)).unwrap();
    assert_eq!(found, Some(100_000));
    assert_eq!(radio.frequency(), Some(100_000));

    // start 505, stop 925
    assert_eq!(
        probe.writes(),
        vec![
            (qreg::CH_START, 0xF9),
            (qreg::CH_STOP, 0x9D),
            (qreg::CH_STEP, 0x74),
            (qreg::CCA, 0x10),
            (qreg::SYSTEM1, 0x12),
        ]
    );
}

#[test]
fn test_qn_auto_seek_nothing_found() {
    let (mut radio, probe) = qn_seeking();
    probe.set(qreg::STATUS1, 0x08);
    let found = block_on(radio.auto_seek(87_000, 108_000, SeekStep::Khz200)).unwrap();
    assert_eq!(found, None);
    assert_eq!(radio.frequency(), None);
}

#[test]
fn test_qn_auto_seek_times_out() {
    let (mut radio, _probe) = qn();
    let result = block_on(radio.auto_seek(87_000, 108_000, SeekStep::Khz50));
    assert_eq!(result, Err(Error::Timeout));
}

#[test]
fn test_qn_auto_seek_rejects_range() {
    let (mut radio, _probe) = qn_seeking();
    let result = block_on(radio.auto_seek(50_000, 108_000, SeekStep::Khz100));
    assert_eq!(result, Err(Error::OutOfRange));
}

#[test]
fn test_qn_scan_locks_strongest() {
    let (mut radio, probe) = qn_seeking();
    // 95.0 MHz = index 0x299, 101.0 MHz = index 0x311, then nothing
    probe.script(qreg::STATUS1, &[0x00, 0x00, 0x08]);
    probe.script(qreg::CH, &[0x99, 0x11]);
    probe.script(qreg::CH_STEP, &[0x02, 0x03]);
    probe.script(qreg::RSSISIG, &[30, 50]);

    let best = block_on(radio.scan_and_lock_best(87_000, 108_000)).unwrap();
    assert_eq!(best, Some(101_000));
    assert_eq!(radio.frequency(), Some(101_000));
    assert_eq!(probe.writes_to(qreg::SYSTEM1).last(), Some(&0x11));
    assert_eq!(probe.writes_to(qreg::CH).last(), Some(&0x11));
}

#[test]
fn test_qn_scan_empty_band() {
    let (mut radio, probe) = qn_seeking();
    probe.set(qreg::STATUS1, 0x08);
    assert_eq!(block_on(radio.scan_and_lock_best(87_000, 108_000)).unwrap(), None);
    assert!(probe.writes_to(qreg::CH).is_empty());
}

#[test]
fn test_qn_poll_signal() {
    let (mut radio, probe) = qn_seeking();

    assert_eq!(block_on(radio.poll_signal(0)).unwrap(), SignalCheck::NoStation);
    assert_eq!(block_on(radio.poll_signal(500)).unwrap(), SignalCheck::Skipped);

    block_on(radio.set_frequency(100_000)).unwrap();
    probe.set(qreg::RSSISIG, 60);
    assert_eq!(block_on(radio.poll_signal(1_000)).unwrap(), SignalCheck::Good(60));

    radio.set_monitor(70, 1_000);
    probe.set(qreg::STATUS1, 0x08);
    assert_eq!(
        block_on(radio.poll_signal(2_000)).unwrap(),
        SignalCheck::Rescanned(None)
    );
}
