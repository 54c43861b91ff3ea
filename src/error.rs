use crate::read::ReadError;
use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
};

/// Error when decoding a bank.
///
/// The [`kind`](DecodeError::kind) names the record that could not be decoded;
/// [`Error::source`] holds the underlying I/O failure, if any.
#[derive(Debug)]
pub struct DecodeError {
    kind: DecodeErrorKind,
    source: Option<ReadError>,
}

/// Record or check that failed while decoding a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum DecodeErrorKind {
    /// The file signature was missing or did not belong to the requested bank type.
    InvalidMagic,
    /// Failed to read the format version.
    Version,
    /// Failed to read the file size.
    FileSize,
    /// Failed to read the checksum.
    Checksum,
    /// Failed to read the location or size of the program table.
    ProgramTable,
    /// Failed to read the remaining header fields.
    Header,
    /// Failed to read the velocity curves.
    VelocityCurves,
    /// Failed to read an entry of the program table.
    ProgramPointer {
        /// Program number.
        index: usize,
    },
    /// Failed to read a program record.
    Program {
        /// Program number.
        index: usize,
    },
    /// Failed to read a layer record.
    Layer {
        /// Program number.
        program: usize,
        /// Layer index within the program.
        layer: usize,
    },
    /// Failed to read a split record.
    Split {
        /// Program number.
        program: usize,
        /// Layer index within the program.
        layer: usize,
        /// Split index within the layer.
        split: usize,
    },
    /// A one-shot program entry was not framed by its markers.
    EntryMagic {
        /// Program number.
        index: usize,
    },
    /// Failed to read the end of the file while looking for the end marker.
    EndMarker,
    /// Failed to read the sample data of a tone.
    ToneData {
        /// File offset of the tone.
        pointer: u32,
    },
    /// A voice refers to a tone outside of the tone data region.
    DanglingToneReference {
        /// File offset the voice refers to.
        pointer: u32,
    },
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn new_with_source(kind: DecodeErrorKind, source: ReadError) -> Self {
        Self {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn factory(kind: DecodeErrorKind) -> impl FnOnce(ReadError) -> Self {
        move |source| Self::new_with_source(kind, source)
    }

    /// Returns the record or check that failed.
    #[must_use]
    pub fn kind(&self) -> DecodeErrorKind {
        self.kind
    }

    /// Checks whether decoding failed because the data ended in the middle of a record.
    #[must_use]
    pub fn is_truncated(&self) -> bool {
        self.source.as_ref().is_some_and(ReadError::is_incomplete)
    }
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        #[allow(clippy::enum_glob_use)]
        use DecodeErrorKind::*;

        match self.kind {
            InvalidMagic => f.write_str("no matching file signature found"),
            Version => f.write_str("failed to read file format version"),
            FileSize => f.write_str("failed to read file size"),
            Checksum => f.write_str("failed to read checksum"),
            ProgramTable => f.write_str("failed to read location of program table"),
            Header => f.write_str("failed to read bank header"),
            VelocityCurves => f.write_str("failed to read velocity curves"),
            ProgramPointer { index } => {
                f.write_str(&format!("failed to read pointer to program {index}"))
            }
            Program { index } => f.write_str(&format!("failed to read program {index}")),
            Layer { program, layer } => {
                f.write_str(&format!("failed to read layer {layer} of program {program}"))
            }
            Split {
                program,
                layer,
                split,
            } => f.write_str(&format!(
                "failed to read split {split} of layer {layer} of program {program}"
            )),
            EntryMagic { index } => f.write_str(&format!(
                "entry markers of one-shot program {index} were missing"
            )),
            EndMarker => f.write_str("failed to read end of file"),
            ToneData { pointer } => {
                f.write_str(&format!("failed to read tone data at 0x{pointer:06x}"))
            }
            DanglingToneReference { pointer } => f.write_str(&format!(
                "tone pointer 0x{pointer:06x} was outside of the tone data region"
            )),
        }
    }
}

impl Error for DecodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(e) => Some(e),
            None => None,
        }
    }
}

/// Error when encoding a bank.
///
/// Nothing is written to the output when encoding fails,
/// except for [`EncodeErrorKind::Write`] failures of the output itself.
#[derive(Debug)]
pub struct EncodeError {
    kind: EncodeErrorKind,
    source: Option<IoError>,
}

/// Reason why a bank could not be encoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum EncodeErrorKind {
    /// A table holds more entries than the format can address.
    CapacityExceeded {
        /// The table that overflowed.
        capacity: Capacity,
        /// Number of entries (or offset, for tone addresses) that was requested.
        count: usize,
    },
    /// A split has no tone.
    MissingTone {
        /// Program number.
        program: usize,
        /// Layer index within the program.
        layer: usize,
        /// Split index within the layer.
        split: usize,
    },
    /// A one-shot program has no tone.
    MissingOneShotTone {
        /// Program number.
        program: usize,
    },
    /// Writing to the output failed.
    Write,
}

/// Format limits that can be exceeded while encoding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Capacity {
    /// Programs per bank.
    Programs,
    /// Splits per layer.
    Splits,
    /// Velocity curves per bank.
    VelocityCurves,
    /// Offsets reachable by a tone pointer.
    ToneAddress,
}

impl Capacity {
    /// Returns the largest allowed count (or offset, for tone addresses).
    #[must_use]
    pub fn limit(self) -> usize {
        match self {
            Self::Programs => crate::MAX_PROGRAMS,
            Self::Splits => crate::MAX_SPLITS,
            Self::VelocityCurves => crate::MAX_VELOCITY_CURVES,
            Self::ToneAddress => (1 << 23) - 1,
        }
    }
}

impl EncodeError {
    pub(crate) fn new(kind: EncodeErrorKind) -> Self {
        Self { kind, source: None }
    }

    pub(crate) fn capacity(capacity: Capacity, count: usize) -> Self {
        Self::new(EncodeErrorKind::CapacityExceeded { capacity, count })
    }

    pub(crate) fn write(source: IoError) -> Self {
        Self {
            kind: EncodeErrorKind::Write,
            source: Some(source),
        }
    }

    /// Returns the reason encoding failed.
    #[must_use]
    pub fn kind(&self) -> EncodeErrorKind {
        self.kind
    }
}

impl Display for EncodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self.kind {
            EncodeErrorKind::CapacityExceeded { capacity, count } => {
                let what = match capacity {
                    Capacity::Programs => "number of programs",
                    Capacity::Splits => "number of splits in a layer",
                    Capacity::VelocityCurves => "number of velocity curves",
                    Capacity::ToneAddress => "tone offset",
                };
                f.write_str(&format!(
                    "{what} ({count}) exceeded the format limit of {}",
                    capacity.limit()
                ))
            }
            EncodeErrorKind::MissingTone {
                program,
                layer,
                split,
            } => f.write_str(&format!(
                "split {split} of layer {layer} of program {program} had no tone"
            )),
            EncodeErrorKind::MissingOneShotTone { program } => {
                f.write_str(&format!("one-shot program {program} had no tone"))
            }
            EncodeErrorKind::Write => f.write_str("failed to write bank data"),
        }
    }
}

impl Error for EncodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(e) => Some(e),
            None => None,
        }
    }
}

/// Position of a split within a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SplitIndex {
    /// Program number.
    pub program: usize,
    /// Layer index within the program.
    pub layer: usize,
    /// Split index within the layer.
    pub split: usize,
}

/// Position of a voice within a bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceIndex {
    /// Voice of a split in a melodic or drum bank.
    Split(SplitIndex),
    /// Voice of a one-shot program.
    OneShot(usize),
}

/// Problem that does not prevent a bank from being loaded or saved.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Warning {
    /// The format version has not been seen in the wild. It is read and written like version 2.
    UnsupportedVersion {
        /// Version number.
        version: u32,
    },
    /// A split selects a velocity curve the bank does not have.
    VelocityCurveIndex {
        /// The offending split.
        split: SplitIndex,
        /// Selected velocity curve.
        index: u8,
        /// Number of velocity curves in the bank.
        count: usize,
    },
    /// A split's lowest note is above its highest note.
    NoteRange {
        /// The offending split.
        split: SplitIndex,
    },
    /// A split's lowest velocity is above its highest velocity.
    VelocityRange {
        /// The offending split.
        split: SplitIndex,
    },
    /// A voice field does not fit its register and will be clamped when saved.
    UnrepresentableField {
        /// The offending voice.
        voice: VoiceIndex,
        /// Field path, e.g. `amp.attack`.
        field: &'static str,
    },
}

impl Display for SplitIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&format!(
            "split {} of layer {} of program {}",
            self.split, self.layer, self.program
        ))
    }
}

impl Display for VoiceIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Split(split) => Display::fmt(split, f),
            Self::OneShot(program) => f.write_str(&format!("one-shot program {program}")),
        }
    }
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::UnsupportedVersion { version } => {
                f.write_str(&format!("format version was not recognized (0x{version:x})"))
            }
            Self::VelocityCurveIndex {
                split,
                index,
                count,
            } => f.write_str(&format!(
                "{split} selected velocity curve {index}, but there are only {count}"
            )),
            Self::NoteRange { split } => f.write_str(&format!("{split} had an inverted note range")),
            Self::VelocityRange { split } => {
                f.write_str(&format!("{split} had an inverted velocity range"))
            }
            Self::UnrepresentableField { voice, field } => {
                f.write_str(&format!("{voice}: value of {field} will be clamped"))
            }
        }
    }
}
