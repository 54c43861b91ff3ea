use crate::{
    bitfield::{decode_octave, encode_octave, field_max, read_field, saturate, write_field},
    header::FormatVersion,
    tone::{Tone, ToneFormat},
};
use bilge::prelude::*;

/// Size of the voice register block shared by splits and one-shot programs.
pub(crate) const VOICE_SIZE: usize = 0x24;

/// Largest filter level the instrument editor produces.
pub const FILTER_LEVEL_MAX: u16 = 8184;

/// Pan positions range from hard left (-15) to hard right (15).
pub const PAN_RANGE: i8 = 15;

// Bits of the register block without a known meaning, at their on-disk positions.
const UNKNOWN_BIT_MASK: [u8; VOICE_SIZE] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // flags, tone pointer, loop points
    0x00, 0x80, 0x00, 0x80, 0x00, 0x80, 0x00, 0x00, // amp rates, amp release, pitch, lfo
    0x00, 0x00, 0xE0, 0xF0, 0x00, 0xC0, 0x00, 0xE0, // fx, pan, direct level, filter, first level
    0x00, 0xE0, 0x00, 0xE0, 0x00, 0xE0, 0x00, 0xE0, // filter levels
    0xE0, 0xE0, 0xE0, 0xE0, // filter rates
];

const TONE_POINTER_BITS: u32 = 23;
const FILTER_LEVEL_BITS: u32 = 13;
const PAN_SIGN: u32 = 4;

/// Register block describing how one tone is played.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Voice {
    /// Waveform played by this voice. Every voice needs a tone before its bank can be saved.
    pub tone: Option<Tone>,
    /// Whether playback loops between `loop_start` and `loop_end`.
    pub looped: bool,
    /// First sample of the loop.
    pub loop_start: u16,
    /// Last sample of the loop, also used as the playback end.
    pub loop_end: u16,
    /// Amplitude envelope.
    pub amp: AmpEnvelope,
    /// Pitch registers.
    pub pitch: Pitch,
    /// Low frequency oscillator.
    pub lfo: Lfo,
    /// Effect send.
    pub fx: FxSend,
    /// Pan position in `-15..=15`.
    pub pan: i8,
    /// Direct output level in `0..=15`.
    pub direct_level: u8,
    /// Oscillator output level, 255 being the loudest.
    pub oscillator_level: u8,
    /// Filter envelope.
    pub filter: FilterEnvelope,
    /// Flag bits without a known meaning, kept as found (`0..=63`).
    pub unknown_flags: u8,
    /// Register byte without a known meaning, kept as found.
    pub reserved: u8,
    /// Other register bits without a known meaning, kept as found.
    pub unknown_bits: UnknownBits,
}

/// Bits of the voice register block that have no known meaning, at their on-disk positions.
///
/// Loading keeps them and saving writes them back, so they survive a round trip.
/// Bits that belong to a known register are ignored when saving.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnknownBits(pub [u8; VOICE_SIZE]);

impl Default for UnknownBits {
    fn default() -> Self {
        Self([0; VOICE_SIZE])
    }
}

impl UnknownBits {
    fn from_block(buf: &[u8; VOICE_SIZE]) -> Self {
        let mut bits = [0; VOICE_SIZE];
        for ((bit, &byte), &mask) in bits.iter_mut().zip(buf).zip(&UNKNOWN_BIT_MASK) {
            *bit = byte & mask;
        }
        Self(bits)
    }

    fn apply(self, buf: &mut [u8; VOICE_SIZE]) {
        for ((byte, &bits), &mask) in buf.iter_mut().zip(&self.0).zip(&UNKNOWN_BIT_MASK) {
            *byte |= bits & mask;
        }
    }

    /// Checks whether no unknown bit is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0
            .iter()
            .zip(&UNKNOWN_BIT_MASK)
            .all(|(&bits, &mask)| bits & mask == 0)
    }
}

/// Amplitude envelope registers. Rates are in `0..=31`, 31 being the fastest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AmpEnvelope {
    /// Attack rate.
    pub attack: u8,
    /// First decay rate.
    pub decay1: u8,
    /// Second decay rate.
    pub decay2: u8,
    /// Release rate.
    pub release: u8,
    /// Level at which the first decay hands over to the second (`0..=31`).
    pub decay_level: u8,
    /// Key rate scaling (`0..=15`).
    pub key_rate_scaling: u8,
    /// Whether the envelope is linked to the loop start.
    pub loop_start_link: bool,
}

/// Pitch registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Pitch {
    /// Frequency number, an 11-bit fraction of an octave.
    pub fraction: u16,
    /// Octave in `-8..=7`.
    pub octave: i8,
}

/// Low frequency oscillator registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Lfo {
    /// Whether the oscillator restarts with every key on.
    pub sync: bool,
    /// Oscillator frequency (`0..=31`).
    pub frequency: u8,
    /// Pitch modulation depth (`0..=7`).
    pub pitch_depth: u8,
    /// Pitch modulation waveform.
    pub pitch_waveform: LfoWaveform,
    /// Amplitude modulation depth (`0..=7`).
    pub amp_depth: u8,
    /// Amplitude modulation waveform.
    pub amp_waveform: LfoWaveform,
}

/// Waveform of the low frequency oscillator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoWaveform {
    /// Sawtooth.
    #[default]
    Saw,
    /// Square.
    Square,
    /// Triangle.
    Triangle,
    /// Noise.
    Noise,
}

/// Effect send registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FxSend {
    /// Effect input channel (`0..=15`).
    pub input_channel: u8,
    /// Send level (`0..=15`).
    pub send_level: u8,
}

/// Filter envelope registers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterEnvelope {
    /// Whether the filter is bypassed.
    pub off: bool,
    /// Resonance (`0..=31`).
    pub resonance: u8,
    /// Cutoff levels of the envelope stages, 13 bits each (see [`FILTER_LEVEL_MAX`]).
    pub levels: [u16; 5],
    /// Attack rate (`0..=31`).
    pub attack: u8,
    /// First decay rate (`0..=31`).
    pub decay1: u8,
    /// Second decay rate (`0..=31`).
    pub decay2: u8,
    /// Release rate (`0..=31`).
    pub release: u8,
}

impl LfoWaveform {
    fn from_code(code: u2) -> Self {
        match code.value() {
            0 => Self::Saw,
            1 => Self::Square,
            2 => Self::Triangle,
            _ => Self::Noise,
        }
    }

    fn code(self) -> u2 {
        u2::new(match self {
            Self::Saw => 0,
            Self::Square => 1,
            Self::Triangle => 2,
            Self::Noise => 3,
        })
    }
}

#[bitsize(8)]
#[derive(FromBits)]
struct RawFlags {
    looped: bool,
    adpcm: bool,
    unknown: u6,
}

#[bitsize(8)]
#[derive(FromBits)]
struct RawJump {
    pointer_high: u7,
    pcm8: bool,
}

#[bitsize(16)]
#[derive(FromBits)]
struct RawAmpRates {
    attack: u5,
    decay1: u5,
    decay2: u5,
    unused: u1,
}

#[bitsize(16)]
#[derive(FromBits)]
struct RawAmpRelease {
    release: u5,
    decay_level: u5,
    key_rate_scaling: u4,
    loop_start_link: bool,
    unused: u1,
}

#[bitsize(16)]
#[derive(FromBits)]
struct RawPitch {
    fraction: u11,
    octave: u4,
    unused: u1,
}

#[bitsize(16)]
#[derive(FromBits)]
struct RawLfo {
    amp_depth: u3,
    amp_waveform: u2,
    pitch_depth: u3,
    pitch_waveform: u2,
    frequency: u5,
    sync: bool,
}

#[bitsize(8)]
#[derive(FromBits)]
struct RawFx {
    input_channel: u4,
    send_level: u4,
}

#[bitsize(8)]
#[derive(FromBits)]
struct RawFilter {
    resonance: u5,
    off: bool,
    unused: u2,
}

/// Where a voice's tone lives in the file, before the tone itself has been read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ToneLink {
    pub(crate) pointer: u32,
    pub(crate) format: ToneFormat,
}

fn sat_byte(value: u8, width: u32) -> u8 {
    u8::try_from(saturate(u32::from(value), width)).unwrap_or(u8::MAX)
}

fn sat_u3(value: u8) -> u3 {
    u3::new(sat_byte(value, 3))
}

fn sat_u4(value: u8) -> u4 {
    u4::new(sat_byte(value, 4))
}

fn sat_u5(value: u8) -> u5 {
    u5::new(sat_byte(value, 5))
}

fn sat_u6(value: u8) -> u6 {
    u6::new(sat_byte(value, 6))
}

fn sat_u11(value: u16) -> u11 {
    u11::new(u16::try_from(saturate(u32::from(value), 11)).unwrap_or(u16::MAX))
}

impl Voice {
    /// Encodes the register block. The tone pointer is left at zero; see [`encode_tone_pointer`].
    pub(crate) fn to_bytes(&self, version: FormatVersion) -> [u8; VOICE_SIZE] {
        let format = self.tone.as_ref().map(Tone::format).unwrap_or_default();
        let mut buf = [0; VOICE_SIZE];

        buf[0x00] = RawFlags::new(
            self.looped,
            format == ToneFormat::Adpcm,
            sat_u6(self.unknown_flags),
        )
        .into();
        buf[0x01] = RawJump::new(u7::new(0), format == ToneFormat::Pcm8).into();
        buf[0x04..0x06].copy_from_slice(&self.loop_start.to_le_bytes());
        buf[0x06..0x08].copy_from_slice(&self.loop_end.to_le_bytes());

        let amp = &self.amp;
        let rates = RawAmpRates::new(
            sat_u5(amp.attack),
            sat_u5(amp.decay1),
            sat_u5(amp.decay2),
            u1::new(0),
        );
        buf[0x08..0x0A].copy_from_slice(&u16::from(rates).to_le_bytes());

        let release = RawAmpRelease::new(
            sat_u5(amp.release),
            sat_u5(amp.decay_level),
            sat_u4(amp.key_rate_scaling),
            amp.loop_start_link,
            u1::new(0),
        );
        buf[0x0A..0x0C].copy_from_slice(&u16::from(release).to_le_bytes());

        let pitch = RawPitch::new(
            sat_u11(self.pitch.fraction),
            u4::new(encode_octave(self.pitch.octave)),
            u1::new(0),
        );
        buf[0x0C..0x0E].copy_from_slice(&u16::from(pitch).to_le_bytes());

        let lfo = &self.lfo;
        let lfo = RawLfo::new(
            sat_u3(lfo.amp_depth),
            lfo.amp_waveform.code(),
            sat_u3(lfo.pitch_depth),
            lfo.pitch_waveform.code(),
            sat_u5(lfo.frequency),
            lfo.sync,
        );
        buf[0x0E..0x10].copy_from_slice(&u16::from(lfo).to_le_bytes());

        buf[0x10] = RawFx::new(sat_u4(self.fx.input_channel), sat_u4(self.fx.send_level)).into();
        buf[0x11] = self.reserved;
        buf[0x12] = encode_pan(self.pan, version);
        buf[0x13] = sat_u4(self.direct_level).value();
        buf[0x14] = !self.oscillator_level;

        let filter = &self.filter;
        buf[0x15] = RawFilter::new(sat_u5(filter.resonance), filter.off, u2::new(0)).into();
        for (chunk, &level) in buf[0x16..0x20].chunks_exact_mut(2).zip(&filter.levels) {
            let level = saturate(u32::from(level), FILTER_LEVEL_BITS);
            chunk.copy_from_slice(&u16::try_from(level).unwrap_or(u16::MAX).to_le_bytes());
        }
        buf[0x20] = sat_u5(filter.attack).value();
        buf[0x21] = sat_u5(filter.decay1).value();
        buf[0x22] = sat_u5(filter.decay2).value();
        buf[0x23] = sat_u5(filter.release).value();

        self.unknown_bits.apply(&mut buf);
        buf
    }

    /// Decodes a register block. The returned voice has no tone yet.
    pub(crate) fn from_bytes(buf: &[u8; VOICE_SIZE], version: FormatVersion) -> (Self, ToneLink) {
        let le_u16 = |offset: usize| u16::from_le_bytes([buf[offset], buf[offset + 1]]);

        let flags = RawFlags::from(buf[0x00]);
        let jump = RawJump::from(buf[0x01]);
        let link = ToneLink {
            pointer: (u32::from(jump.pointer_high().value()) << 16) | u32::from(le_u16(0x02)),
            format: if flags.adpcm() {
                ToneFormat::Adpcm
            } else if jump.pcm8() {
                ToneFormat::Pcm8
            } else {
                ToneFormat::Pcm16
            },
        };

        let rates = RawAmpRates::from(le_u16(0x08));
        let release = RawAmpRelease::from(le_u16(0x0A));
        let pitch = RawPitch::from(le_u16(0x0C));
        let lfo = RawLfo::from(le_u16(0x0E));
        let fx = RawFx::from(buf[0x10]);
        let filter = RawFilter::from(buf[0x15]);

        let mut levels = [0; 5];
        for (level, offset) in levels.iter_mut().zip((0x16..0x20).step_by(2)) {
            *level = le_u16(offset) & 0x1FFF;
        }

        let voice = Self {
            tone: None,
            looped: flags.looped(),
            loop_start: le_u16(0x04),
            loop_end: le_u16(0x06),
            amp: AmpEnvelope {
                attack: rates.attack().value(),
                decay1: rates.decay1().value(),
                decay2: rates.decay2().value(),
                release: release.release().value(),
                decay_level: release.decay_level().value(),
                key_rate_scaling: release.key_rate_scaling().value(),
                loop_start_link: release.loop_start_link(),
            },
            pitch: Pitch {
                fraction: pitch.fraction().value(),
                octave: decode_octave(pitch.octave().value()),
            },
            lfo: Lfo {
                sync: lfo.sync(),
                frequency: lfo.frequency().value(),
                pitch_depth: lfo.pitch_depth().value(),
                pitch_waveform: LfoWaveform::from_code(lfo.pitch_waveform()),
                amp_depth: lfo.amp_depth().value(),
                amp_waveform: LfoWaveform::from_code(lfo.amp_waveform()),
            },
            fx: FxSend {
                input_channel: fx.input_channel().value(),
                send_level: fx.send_level().value(),
            },
            pan: decode_pan(buf[0x12], version),
            direct_level: buf[0x13] & 0x0F,
            oscillator_level: !buf[0x14],
            filter: FilterEnvelope {
                off: filter.off(),
                resonance: filter.resonance().value(),
                levels,
                attack: buf[0x20] & 0x1F,
                decay1: buf[0x21] & 0x1F,
                decay2: buf[0x22] & 0x1F,
                release: buf[0x23] & 0x1F,
            },
            unknown_flags: flags.unknown().value(),
            reserved: buf[0x11],
            unknown_bits: UnknownBits::from_block(buf),
        };

        (voice, link)
    }

    /// Lists the fields whose values do not fit their registers and will be clamped when saved.
    pub(crate) fn clamped_fields(&self) -> Vec<&'static str> {
        let amp = &self.amp;
        let lfo = &self.lfo;
        let filter = &self.filter;

        let mut fields: Vec<_> = [
            ("amp.attack", amp.attack, 5),
            ("amp.decay1", amp.decay1, 5),
            ("amp.decay2", amp.decay2, 5),
            ("amp.release", amp.release, 5),
            ("amp.decay_level", amp.decay_level, 5),
            ("amp.key_rate_scaling", amp.key_rate_scaling, 4),
            ("lfo.frequency", lfo.frequency, 5),
            ("lfo.pitch_depth", lfo.pitch_depth, 3),
            ("lfo.amp_depth", lfo.amp_depth, 3),
            ("fx.input_channel", self.fx.input_channel, 4),
            ("fx.send_level", self.fx.send_level, 4),
            ("direct_level", self.direct_level, 4),
            ("filter.resonance", filter.resonance, 5),
            ("filter.attack", filter.attack, 5),
            ("filter.decay1", filter.decay1, 5),
            ("filter.decay2", filter.decay2, 5),
            ("filter.release", filter.release, 5),
            ("unknown_flags", self.unknown_flags, 6),
        ]
        .into_iter()
        .filter(|&(_, value, width)| u32::from(value) > field_max(width))
        .map(|(name, _, _)| name)
        .collect();

        if u32::from(self.pitch.fraction) > field_max(11) {
            fields.push("pitch.fraction");
        }
        if !(-8..=7).contains(&self.pitch.octave) {
            fields.push("pitch.octave");
        }
        if !(-PAN_RANGE..=PAN_RANGE).contains(&self.pan) {
            fields.push("pan");
        }
        if filter.levels.iter().any(|&level| level > FILTER_LEVEL_MAX) {
            fields.push("filter.levels");
        }

        fields
    }
}

/// Encodes the tone pointer into the jump byte and the 16-bit low half that follows it.
/// The PCM8 bit of `jump` is kept. Pointers wider than 23 bits are clamped.
pub(crate) fn encode_tone_pointer(jump: u8, pointer: u32) -> [u8; 3] {
    let pointer = saturate(pointer, TONE_POINTER_BITS);
    let jump = write_field(u32::from(jump), pointer >> 16, 0, 7);
    let [low, high, ..] = pointer.to_le_bytes();

    [u8::try_from(jump).unwrap_or_default(), low, high]
}

/// Largest offset a tone pointer can address.
pub(crate) fn max_tone_pointer() -> u32 {
    field_max(TONE_POINTER_BITS)
}

/// Version 1 stores pan positions as offset binary, later versions as sign and magnitude.
pub(crate) fn encode_pan(pan: i8, version: FormatVersion) -> u8 {
    let pan = pan.clamp(-PAN_RANGE, PAN_RANGE);

    if version.has_offset_pan() {
        pan.wrapping_add(PAN_RANGE).unsigned_abs()
    } else {
        let word = write_field(0, u32::from(pan.unsigned_abs()), 0, 4);
        let word = write_field(word, u32::from(pan < 0), PAN_SIGN, 1);
        u8::try_from(word).unwrap_or_default()
    }
}

pub(crate) fn decode_pan(byte: u8, version: FormatVersion) -> i8 {
    if version.has_offset_pan() {
        let offset = read_field(u32::from(byte), 0, 5).min(30);
        i8::try_from(offset).unwrap_or_default() - PAN_RANGE
    } else {
        let word = u32::from(byte);
        let magnitude = i8::try_from(read_field(word, 0, 4)).unwrap_or_default();
        let magnitude = magnitude.min(PAN_RANGE);

        if read_field(word, PAN_SIGN, 1) == 0 {
            magnitude
        } else {
            -magnitude
        }
    }
}
