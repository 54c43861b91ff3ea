//! Bit-field access for sound processor register words.
//!
//! Fields are addressed by their offset from the least significant bit and their width.
//! Writes saturate to the field's range instead of failing, the same way the hardware
//! registers do.

/// Returns the largest value representable by a field of `width` bits.
#[must_use]
pub fn field_max(width: u32) -> u32 {
    match width {
        0 => 0,
        width if width >= 32 => u32::MAX,
        width => (1 << width) - 1,
    }
}

/// Clamps `value` to the range of a field of `width` bits.
#[must_use]
pub fn saturate(value: u32, width: u32) -> u32 {
    value.min(field_max(width))
}

/// Reads the `width`-bit field starting at bit `offset` of `word`.
#[must_use]
pub fn read_field(word: u32, offset: u32, width: u32) -> u32 {
    debug_assert!(offset + width <= 32, "field does not fit in a 32-bit word");
    word.checked_shr(offset).unwrap_or(0) & field_max(width)
}

/// Writes `value` into the `width`-bit field starting at bit `offset` of `word`.
///
/// Values too large for the field are clamped to its maximum. Bits outside the field are kept.
#[must_use]
pub fn write_field(word: u32, value: u32, offset: u32, width: u32) -> u32 {
    debug_assert!(offset + width <= 32, "field does not fit in a 32-bit word");
    let mask = field_max(width).checked_shl(offset).unwrap_or(0);
    let value = saturate(value, width).checked_shl(offset).unwrap_or(0);
    (word & !mask) | value
}

const OCTAVE_SIGN: u32 = 3;

/// Encodes an octave into the 4-bit sign/magnitude form used by pitch registers.
///
/// Bit 3 is the sign and bits 0-2 the magnitude. The negative zero code stands for -8,
/// so every value in `-8..=7` has exactly one encoding. Values outside that range are clamped.
#[must_use]
pub fn encode_octave(octave: i8) -> u8 {
    match octave.clamp(-8, 7) {
        -8 => 0b1000,
        octave if octave < 0 => 0b1000 | octave.unsigned_abs(),
        octave => octave.unsigned_abs(),
    }
}

/// Decodes a 4-bit sign/magnitude octave. Bits above the field are ignored.
#[must_use]
pub fn decode_octave(code: u8) -> i8 {
    let code = u32::from(code);
    let magnitude = i8::try_from(read_field(code, 0, 3)).unwrap_or_default();

    match (read_field(code, OCTAVE_SIGN, 1), magnitude) {
        (0, magnitude) => magnitude,
        (_, 0) => -8,
        (_, magnitude) => -magnitude,
    }
}
