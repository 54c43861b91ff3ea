//! # smpb
//!
//! `smpb` is a library for reading and writing the instrument banks of Yamaha-style sound
//! processors: melodic (`SMPB`) and drum (`SMDB`) banks with their program/layer/split
//! hierarchy, and flat one-shot banks (`SOSB`).
//!
//! Banks are loaded into plain data structures, edited freely, and saved back in the
//! format version of choice. Tones (the waveforms voices play) are shared buffers, so a
//! tone referenced by many splits is read once and written once. Tones can be decoded to
//! 16-bit samples and exported as WAV files.
//!
//! Diagnostics are emitted through [`tracing`]; install a subscriber to see them.

pub mod adpcm;
mod bank;
pub mod bitfield;
mod error;
mod export;
mod header;
mod options;
mod osb;
mod read;
mod tone;
mod tone_table;
mod voice;
mod write;

pub use bank::{
    Bank, Layer, Program, Split, VelocityCurve, LAYERS_PER_PROGRAM, MAX_PROGRAMS, MAX_SPLITS,
    MAX_VELOCITY_CURVES,
};
pub use error::{
    Capacity, DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind, SplitIndex, VoiceIndex,
    Warning,
};
pub use export::ExportError;
pub use header::{BankKind, FormatVersion};
pub use options::{LoadOptions, SaveOptions, ToneSizeStrategy};
pub use osb::{OneShot, OneShotBank};
pub use tone::{Tone, ToneDecoder, ToneFormat};
pub use voice::{
    AmpEnvelope, FilterEnvelope, FxSend, Lfo, LfoWaveform, Pitch, UnknownBits, Voice,
    FILTER_LEVEL_MAX, PAN_RANGE,
};
