//! Tuning-Word Encoding
//!
//! Synthesizers and attenuators take physical quantities as fixed-width
//! integer codes. Three scales cover every device on the board:
//!
//! - [`FrequencyScale`]: `round(f * 2^W / f_ref)` for phase-accumulator DDS
//!   parts, clamped to the accumulator range
//! - [`PhaseScale`]: `round(deg * 2^W / 360)`, wrapped into one turn
//! - [`LinearScale`]: `clamp(round((v - offset) / step), 0, max)` for step
//!   attenuators, channel indices and amplitude counts
//!
//! All encoders are infallible. Out-of-range input saturates, NaN maps
//! to code zero.

#[cfg(feature = "embedded")]
use micromath::F32Ext;

/// Fixed-width unsigned code sent to a device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TuningWord {
    value: u64,
    bits: u8,
}

impl TuningWord {
    /// Create a word, masking `value` to `bits` (1..=64)
    #[must_use]
    pub const fn new(value: u64, bits: u8) -> Self {
        let bits = clamp_width(bits);
        Self {
            value: value & Self::max_code(bits),
            bits,
        }
    }

    /// Largest code representable in `bits`
    #[must_use]
    pub const fn max_code(bits: u8) -> u64 {
        let bits = clamp_width(bits);
        if bits >= 64 {
            u64::MAX
        } else {
            (1u64 << bits) - 1
        }
    }

    /// Raw code
    #[must_use]
    pub const fn value(self) -> u64 {
        self.value
    }

    /// Word width in bits
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.bits
    }

    /// Low `N` bytes of the code, most significant first
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_be_bytes<const N: usize>(self) -> [u8; N] {
        let mut out = [0u8; N];
        for (i, byte) in out.iter_mut().rev().enumerate() {
            if i < 8 {
                *byte = (self.value >> (8 * i)) as u8;
            }
        }
        out
    }

    /// Code shifted up so its MSB lands on bit `container - 1`
    ///
    /// Used where a narrow word lives in the top of a wider register.
    #[must_use]
    pub const fn msb_aligned(self, container: u8) -> u64 {
        let container = clamp_width(container);
        if container <= self.bits {
            self.value
        } else {
            self.value << (container - self.bits)
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for TuningWord {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "0x{:X}/{}b", self.value, self.bits);
    }
}

/// Frequency to phase-increment conversion for an accumulator of `bits`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrequencyScale {
    reference_hz: f64,
    bits: u8,
}

impl FrequencyScale {
    /// Scale for an accumulator of `bits` clocked at `reference_hz`
    #[must_use]
    pub const fn new(reference_hz: f64, bits: u8) -> Self {
        Self {
            reference_hz,
            bits: clamp_width(bits),
        }
    }

    /// Reference (system) clock in Hz
    #[must_use]
    pub const fn reference_hz(&self) -> f64 {
        self.reference_hz
    }

    /// Accumulator width
    #[must_use]
    pub const fn bits(&self) -> u8 {
        self.bits
    }

    /// Frequency step of one LSB
    #[must_use]
    pub fn resolution_hz(&self) -> f64 {
        self.reference_hz / full_scale(self.bits)
    }

    /// Encode a frequency, saturating at 0 and the largest code
    #[must_use]
    pub fn encode(&self, hz: f64) -> TuningWord {
        let raw = hz * full_scale(self.bits) / self.reference_hz;
        TuningWord::new(round_saturating(raw, TuningWord::max_code(self.bits)), self.bits)
    }

    /// Frequency represented by a word
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn decode(&self, word: TuningWord) -> f64 {
        word.value() as f64 * self.reference_hz / full_scale(self.bits)
    }
}

/// Degrees to phase-offset conversion for a word of `bits`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhaseScale {
    bits: u8,
}

impl PhaseScale {
    /// Scale for a phase word of `bits`
    #[must_use]
    pub const fn new(bits: u8) -> Self {
        Self {
            bits: clamp_width(bits),
        }
    }

    /// Encode a phase; any angle is wrapped into `[0, 360)` first
    #[must_use]
    pub fn encode(&self, degrees: f64) -> TuningWord {
        let mut wrapped = degrees % 360.0;
        if wrapped < 0.0 {
            wrapped += 360.0;
        }
        let raw = wrapped * full_scale(self.bits) / 360.0;
        // 359.99.. can round up to a full turn, which the mask folds to 0
        let code = round_saturating(raw, TuningWord::max_code(self.bits).saturating_add(1));
        TuningWord::new(code, self.bits)
    }

    /// Phase in degrees represented by a word
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn decode(&self, word: TuningWord) -> f64 {
        word.value() as f64 * 360.0 / full_scale(self.bits)
    }
}

/// Offset + step linear code with an upper bound
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinearScale {
    offset: f32,
    step: f32,
    max_code: u32,
}

impl LinearScale {
    /// Scale with `code = (value - offset) / step`, limited to `max_code`
    #[must_use]
    pub const fn new(offset: f32, step: f32, max_code: u32) -> Self {
        Self {
            offset,
            step,
            max_code,
        }
    }

    /// Largest code
    #[must_use]
    pub const fn max_code(&self) -> u32 {
        self.max_code
    }

    /// Smallest representable value
    #[must_use]
    pub const fn min_value(&self) -> f32 {
        self.offset
    }

    /// Largest representable value
    #[must_use]
    pub fn max_value(&self) -> f32 {
        self.decode(self.max_code)
    }

    /// Encode a value, clamping into `[0, max_code]`
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn encode(&self, value: f32) -> u32 {
        let code = ((value - self.offset) / self.step).round();
        if code.is_nan() || code <= 0.0 {
            0
        } else if code >= self.max_code as f32 {
            self.max_code
        } else {
            code as u32
        }
    }

    /// Value represented by a code (codes above the limit are clamped)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn decode(&self, code: u32) -> f32 {
        self.offset + code.min(self.max_code) as f32 * self.step
    }
}

const fn clamp_width(bits: u8) -> u8 {
    if bits == 0 {
        1
    } else if bits > 64 {
        64
    } else {
        bits
    }
}

/// 2^bits as a float
#[allow(clippy::cast_precision_loss)]
fn full_scale(bits: u8) -> f64 {
    (1u128 << clamp_width(bits)) as f64
}

/// Round half up, saturating at `[0, max]`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn round_saturating(raw: f64, max: u64) -> u64 {
    if raw.is_nan() || raw <= 0.0 {
        return 0;
    }
    let rounded = raw + 0.5;
    if rounded >= max as f64 {
        max
    } else {
        rounded as u64
    }
}
