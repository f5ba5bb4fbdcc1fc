//! AD9959 Tests
//!
//! Tests for the four-channel DDS: register framing, single-tone setup,
//! profile modulation and linear sweeps
//! Run with: cargo test --test ad9959_tests

mod common;

use common::{to_bytes, FakeDelay, FakePin, Wire};
use instrument_firmware::drivers::ad9959::{
    Ad9959, Ad9959Pins, ChannelMask, Levels, ModulationKind, Sweep,
};
use instrument_firmware::drivers::Error;

const SCLK: u8 = 0;
const CS: u8 = 1;
const IO_UPDATE: u8 = 2;
const SDIO0: u8 = 3;
const P0: u8 = 4;
const SDIO1: u8 = 8;
const PWR_DWN: u8 = 11;
const RESET: u8 = 12;

fn dds(wire: &Wire) -> Ad9959<FakePin, FakeDelay> {
    let pins = Ad9959Pins {
        sclk: wire.pin(SCLK),
        cs: wire.pin(CS),
        io_update: wire.pin(IO_UPDATE),
        sdio0: wire.pin(SDIO0),
        profile: [wire.pin(P0), wire.pin(P0 + 1), wire.pin(P0 + 2), wire.pin(P0 + 3)],
        sdio_unused: [wire.pin(SDIO1), wire.pin(SDIO1 + 1), wire.pin(SDIO1 + 2)],
        pwr_dwn: wire.pin(PWR_DWN),
        reset: wire.pin(RESET),
    };
    Ad9959::new(pins, FakeDelay::new()).unwrap()
}

/// Bytes of every CS frame
fn frames(wire: &Wire) -> Vec<Vec<u8>> {
    wire.frames(SCLK, SDIO0, false, Some((CS, true)))
        .iter()
        .map(|bits| to_bytes(bits))
        .collect()
}

fn word(dds: &Ad9959<FakePin, FakeDelay>, hz: f64) -> [u8; 4] {
    dds.frequency_word(hz).to_be_bytes()
}

fn frame(address: u8, data: &[u8]) -> Vec<u8> {
    let mut out = vec![address];
    out.extend_from_slice(data);
    out
}

// =============================================================================
// Setup Tests
// =============================================================================

#[test]
fn test_init_parks_and_resets() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.init().unwrap();

    assert_eq!(wire.level(CS), Some(true));
    assert_eq!(wire.level(IO_UPDATE), Some(false));
    assert_eq!(wire.level(SDIO1), Some(false));
    assert_eq!(wire.level(PWR_DWN), Some(false));
    assert_eq!(wire.history(RESET), vec![false, true, false]);
    assert_eq!(dds.profile(), 0);
}

#[test]
fn test_channel_mask() {
    assert_eq!(ChannelMask::channel(2), Some(ChannelMask::CH2));
    assert_eq!(ChannelMask::channel(4), None);
    assert_eq!((ChannelMask::CH0 | ChannelMask::CH2).bits(), 0x5);
    assert_eq!(ChannelMask::ALL.csr(), 0xF0);
}

#[test]
fn test_select_channels_writes_csr() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.select_channels(ChannelMask::CH0 | ChannelMask::CH2).unwrap();
    assert_eq!(frames(&wire), vec![vec![0x00, 0x50]]);
    assert_eq!(wire.rising_edges(IO_UPDATE), 0);
}

#[test]
fn test_frequency_word() {
    let wire = Wire::new();
    let dds = dds(&wire);
    assert_eq!(dds.frequency_word(10_000_000.0), 0x051E_B852);
    assert_eq!(dds.frequency_word(-1.0), 0);
}

// =============================================================================
// Single Tone Tests
// =============================================================================

#[test]
fn test_set_frequency() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_frequency(10_000_000.0).unwrap();

    assert_eq!(
        frames(&wire),
        vec![
            vec![0x01, 0xD0, 0x00, 0x00],
            vec![0x03, 0x00, 0x23, 0x35],
            vec![0x04, 0x05, 0x1E, 0xB8, 0x52],
        ]
    );
    assert_eq!(wire.rising_edges(IO_UPDATE), 1);
}

#[test]
fn test_set_phase() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_phase(1_000_000.0, 90.0).unwrap();

    let frames = frames(&wire);
    assert_eq!(frames[2], vec![0x05, 0x10, 0x00]);
    assert_eq!(frames[3], frame(0x04, &word(&dds, 1_000_000.0)));
}

#[test]
fn test_set_amplitude_clamps_and_enables_multiplier() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_amplitude(1_000_000.0, 2_000).unwrap();
    assert_eq!(frames(&wire)[2], vec![0x06, 0x00, 0x13, 0xFF]);

    wire.clear();
    dds.set_amplitude(1_000_000.0, 512).unwrap();
    assert_eq!(frames(&wire)[2], vec![0x06, 0x00, 0x12, 0x00]);
}

// =============================================================================
// Modulation Tests
// =============================================================================

#[test]
fn test_levels() {
    assert_eq!(Levels::Two.count(), 2);
    assert_eq!(Levels::Sixteen.count(), 16);
    assert_eq!(Levels::Eight.code(), 2);
}

#[test]
fn test_two_level_fm() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_modulation(ModulationKind::Frequency, Levels::Two, 0, 0.0, &[1_000_000.0, 10_000_000.0])
        .unwrap();

    assert_eq!(
        frames(&wire),
        vec![
            vec![0x01, 0xD0, 0x00, 0x00],
            vec![0x03, 0x80, 0x23, 0x30],
            frame(0x04, &word(&dds, 1_000_000.0)),
            frame(0x0A, &word(&dds, 10_000_000.0)),
        ]
    );
    assert_eq!(wire.rising_edges(IO_UPDATE), 1);
}

#[test]
fn test_four_level_pm() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_modulation(ModulationKind::Phase, Levels::Four, 0x1, 5_000_000.0, &[0.0, 90.0, 180.0, 270.0])
        .unwrap();

    let frames = frames(&wire);
    assert_eq!(frames[0], vec![0x01, 0xD0, 0x11, 0x00]);
    assert_eq!(frames[1], vec![0x03, 0xC0, 0x03, 0x30]);
    assert_eq!(frames[2], vec![0x05, 0x00, 0x00]);
    assert_eq!(frames[3], vec![0x0A, 0x40, 0x00, 0x00, 0x00]);
    assert_eq!(frames[4], vec![0x0B, 0x80, 0x00, 0x00, 0x00]);
    assert_eq!(frames[5], vec![0x0C, 0xC0, 0x00, 0x00, 0x00]);
    // carrier goes last with the update
    assert_eq!(frames[6], frame(0x04, &word(&dds, 5_000_000.0)));
    assert_eq!(wire.rising_edges(IO_UPDATE), 1);
}

#[test]
fn test_two_level_am_aligns_counts() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_modulation(ModulationKind::Amplitude, Levels::Two, 0, 1_000_000.0, &[0.0, 1023.0])
        .unwrap();

    let frames = frames(&wire);
    assert_eq!(frames[2], vec![0x06, 0x00, 0x00, 0x00]);
    assert_eq!(frames[3], vec![0x0A, 0xFF, 0xC0, 0x00, 0x00]);
}

#[test]
fn test_wrong_value_count_rejected() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    wire.clear();
    let result = dds.set_modulation(ModulationKind::Frequency, Levels::Four, 0, 0.0, &[1.0, 2.0]);
    assert_eq!(result, Err(Error::InvalidLength));
    assert!(wire.events().is_empty());
}

// =============================================================================
// Sweep Tests
// =============================================================================

#[test]
fn test_frequency_sweep() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    let sweep = Sweep::frequency(1_000_000.0, 10_000_000.0, 1_000.0, 2_000.0);
    dds.sweep(&sweep).unwrap();

    assert_eq!(
        frames(&wire),
        vec![
            vec![0x01, 0xD0, 0x00, 0x00],
            vec![0x03, 0x80, 0x43, 0x20],
            frame(0x04, &word(&dds, 1_000_000.0)),
            frame(0x0A, &word(&dds, 10_000_000.0)),
            frame(0x08, &word(&dds, 1_000.0)),
            frame(0x09, &word(&dds, 2_000.0)),
            vec![0x07, 0xFF, 0xFF],
        ]
    );
    assert_eq!(wire.rising_edges(IO_UPDATE), 1);
}

#[test]
fn test_amplitude_sweep_rates_and_carrier() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    let sweep = Sweep {
        kind: ModulationKind::Amplitude,
        start: 0.0,
        end: 1023.0,
        rise_step: 1.0,
        fall_step: 2.0,
        rise_rate: 0x10,
        fall_rate: 0x20,
        carrier_hz: 2_000_000.0,
    };
    dds.sweep(&sweep).unwrap();

    let frames = frames(&wire);
    assert_eq!(frames[1], vec![0x03, 0x40, 0x43, 0x20]);
    assert_eq!(frames[6], vec![0x07, 0x20, 0x10]);
    assert_eq!(frames[7], frame(0x04, &word(&dds, 2_000_000.0)));
}

// =============================================================================
// Profile Pin Tests
// =============================================================================

#[test]
fn test_set_profile_drives_pins() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.set_profile(5).unwrap();
    assert_eq!(dds.profile(), 5);
    assert_eq!(wire.level(P0), Some(true));
    assert_eq!(wire.level(P0 + 1), Some(false));
    assert_eq!(wire.level(P0 + 2), Some(true));
    assert_eq!(wire.level(P0 + 3), Some(false));
}

#[test]
fn test_set_profile_out_of_range() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    assert_eq!(dds.set_profile(16), Err(Error::InvalidChannel(16)));
}

#[test]
fn test_power_down_pin() {
    let wire = Wire::new();
    let mut dds = dds(&wire);
    dds.power_down(true).unwrap();
    assert_eq!(wire.level(PWR_DWN), Some(true));
    dds.power_down(false).unwrap();
    assert_eq!(wire.level(PWR_DWN), Some(false));
}
