//! Melodic and drum instrument banks.
//!
//! A bank holds up to 128 programs. Each program has up to four layers that sound together,
//! and each layer splits the keyboard into up to 128 key/velocity zones. Every split plays
//! one tone through its own [`Voice`] registers.

mod load;
mod save;

use crate::{
    error::{DecodeError, EncodeError, SplitIndex, VoiceIndex, Warning},
    header::{BankKind, FormatVersion},
    options::{LoadOptions, SaveOptions},
    read::Reader,
    tone::Tone,
    voice::{ToneLink, Voice, VOICE_SIZE},
};
use std::{
    collections::HashSet,
    io::{Read, Seek, Write},
};

/// Largest number of programs in a bank.
pub const MAX_PROGRAMS: usize = 128;

/// Largest number of splits in a layer.
pub const MAX_SPLITS: usize = 128;

/// Largest number of velocity curves in a bank.
pub const MAX_VELOCITY_CURVES: usize = 31;

/// Number of layer slots in a program.
pub const LAYERS_PER_PROGRAM: usize = 4;

const HEADER_SIZE: usize = 0x30;
const PROGRAM_RECORD_SIZE: usize = 20;
const SPLIT_SIZE: usize = 0x40;

/// Melodic (`SMPB`) or drum (`SMDB`) instrument bank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bank {
    /// Whether this is a drum kit bank.
    pub drum: bool,
    /// Format version the bank was loaded from, and is saved as by default.
    pub version: FormatVersion,
    /// Programs, indexed by program number.
    pub programs: Vec<Program>,
    /// Velocity curves selectable by splits.
    pub velocity_curves: Vec<VelocityCurve>,
    /// Header bytes without a known meaning, kept as found.
    pub reserved: [u8; 16],
}

/// One instrument of a bank.
///
/// A program without layers and with a zero `reserved` word is stored as a missing program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Program {
    /// Layer slots. All present layers sound together.
    pub layers: [Option<Layer>; LAYERS_PER_PROGRAM],
    /// Record word without a known meaning, kept as found.
    pub reserved: u32,
}

/// Set of splits covering the keyboard.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Layer {
    /// Delay before the layer starts sounding.
    pub delay: u16,
    /// Pitch bend range upwards, in semitones.
    pub bend_range_up: u8,
    /// Pitch bend range downwards, in semitones.
    pub bend_range_down: u8,
    /// Key and velocity zones.
    pub splits: Vec<Split>,
}

/// Key and velocity zone of a layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    /// Lowest note of the zone.
    pub start_note: u8,
    /// Highest note of the zone.
    pub end_note: u8,
    /// Lowest velocity of the zone.
    pub velocity_low: u8,
    /// Highest velocity of the zone.
    pub velocity_high: u8,
    /// Note at which the tone plays at its original pitch.
    pub base_note: u8,
    /// Fine tuning relative to `base_note`.
    pub fine_tune: i8,
    /// Index of the velocity curve in [`Bank::velocity_curves`].
    pub velocity_curve: u8,
    /// Whether the zone plays drum sounds (no pitch tracking).
    pub drum_mode: bool,
    /// Drum group; notes of the same group cut each other off.
    pub drum_group: u8,
    /// Record bytes without a known meaning, kept as found.
    pub reserved: [u8; 19],
    /// Voice registers and tone.
    pub voice: Voice,
}

impl Default for Split {
    fn default() -> Self {
        Self {
            start_note: 0,
            end_note: 127,
            velocity_low: 0,
            velocity_high: 127,
            base_note: 60,
            fine_tune: 0,
            velocity_curve: 0,
            drum_mode: false,
            drum_group: 0,
            reserved: [0; 19],
            voice: Voice::default(),
        }
    }
}

/// Mapping from note-on velocity to playback level.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VelocityCurve(pub [u8; 128]);

impl Default for VelocityCurve {
    /// The identity curve.
    fn default() -> Self {
        let mut curve = [0; 128];
        for (level, velocity) in curve.iter_mut().zip(0..) {
            *level = velocity;
        }
        Self(curve)
    }
}

impl Program {
    /// Checks whether the program has no layers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Option::is_none)
    }
}

impl Split {
    pub(crate) fn to_bytes(&self, version: FormatVersion) -> [u8; SPLIT_SIZE] {
        let mut buf = [0; SPLIT_SIZE];
        buf[..VOICE_SIZE].copy_from_slice(&self.voice.to_bytes(version));
        buf[VOICE_SIZE..VOICE_SIZE + 9].copy_from_slice(&[
            self.start_note,
            self.end_note,
            self.velocity_low,
            self.velocity_high,
            self.base_note,
            self.fine_tune.to_le_bytes()[0],
            self.velocity_curve,
            u8::from(self.drum_mode),
            self.drum_group,
        ]);
        buf[VOICE_SIZE + 9..].copy_from_slice(&self.reserved);
        buf
    }

    /// Decodes a split record. The voice's tone is attached later.
    pub(crate) fn from_bytes(buf: &[u8; SPLIT_SIZE], version: FormatVersion) -> (Self, ToneLink) {
        let mut voice = [0; VOICE_SIZE];
        voice.copy_from_slice(&buf[..VOICE_SIZE]);
        let (voice, link) = Voice::from_bytes(&voice, version);

        let fields = &buf[VOICE_SIZE..];
        let mut reserved = [0; 19];
        reserved.copy_from_slice(&fields[9..]);

        let split = Self {
            start_note: fields[0],
            end_note: fields[1],
            velocity_low: fields[2],
            velocity_high: fields[3],
            base_note: fields[4],
            fine_tune: i8::from_le_bytes([fields[5]]),
            velocity_curve: fields[6],
            drum_mode: fields[7] != 0,
            drum_group: fields[8],
            reserved,
            voice,
        };

        (split, link)
    }
}

impl Bank {
    /// Creates an empty melodic bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bank type written to the file signature.
    #[must_use]
    pub fn kind(&self) -> BankKind {
        if self.drum {
            BankKind::Drum
        } else {
            BankKind::Melodic
        }
    }

    /// Loads a bank with the default [`LoadOptions`].
    ///
    /// # Errors
    ///
    /// Fails if the data is not a melodic or drum bank, ends in the middle of a record,
    /// or refers to tones outside of the file.
    pub fn load<R: Read + Seek>(source: R) -> Result<Self, DecodeError> {
        Self::load_with(source, LoadOptions::default())
    }

    /// Loads a bank.
    ///
    /// Offsets in bank files are absolute, so `source` is read from its start regardless of its
    /// current position. Problems that do not prevent loading are logged as warnings.
    ///
    /// # Errors
    ///
    /// See [`Bank::load`].
    pub fn load_with<R: Read + Seek>(source: R, options: LoadOptions) -> Result<Self, DecodeError> {
        load::load(&mut Reader::new(source), options)
    }

    /// Saves the bank in its own format version.
    ///
    /// # Errors
    ///
    /// See [`Bank::save_with`].
    pub fn save<W: Write>(&self, sink: W) -> Result<(), EncodeError> {
        self.save_with(sink, SaveOptions::default())
    }

    /// Saves the bank.
    ///
    /// The file is assembled in memory first; nothing is written to `sink` unless encoding succeeds.
    ///
    /// # Errors
    ///
    /// Fails if a table exceeds its capacity, a split has no tone, or writing to `sink` fails.
    pub fn save_with<W: Write>(&self, mut sink: W, options: SaveOptions) -> Result<(), EncodeError> {
        let data = self.to_bytes(options)?;
        sink.write_all(&data).map_err(EncodeError::write)
    }

    /// Encodes the bank into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`Bank::save_with`].
    pub fn to_bytes(&self, options: SaveOptions) -> Result<Vec<u8>, EncodeError> {
        save::encode(self, options.version.unwrap_or(self.version))
    }

    /// Iterates over all splits in file order.
    pub fn splits(&self) -> impl Iterator<Item = (SplitIndex, &Split)> + '_ {
        self.programs
            .iter()
            .enumerate()
            .flat_map(|(program, record)| {
                record
                    .layers
                    .iter()
                    .enumerate()
                    .filter_map(|(layer, slot)| slot.as_ref().map(|record| (layer, record)))
                    .flat_map(move |(layer, record)| {
                        record.splits.iter().enumerate().map(move |(split, record)| {
                            let index = SplitIndex {
                                program,
                                layer,
                                split,
                            };
                            (index, record)
                        })
                    })
            })
    }

    fn splits_mut(&mut self) -> impl Iterator<Item = &mut Split> + '_ {
        self.programs
            .iter_mut()
            .flat_map(|program| program.layers.iter_mut().flatten())
            .flat_map(|layer| layer.splits.iter_mut())
    }

    /// Returns every distinct tone buffer played by the bank, in file order.
    #[must_use]
    pub fn tones(&self) -> Vec<&Tone> {
        let mut seen = HashSet::new();
        self.splits()
            .filter_map(|(_, split)| split.voice.tone.as_ref())
            .filter(|tone| seen.insert(tone.buffer_id()))
            .collect()
    }

    /// Checks the bank for problems that do not prevent it from being saved.
    #[must_use]
    pub fn validate(&self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        if !self.version.is_known() {
            warnings.push(Warning::UnsupportedVersion {
                version: self.version.0,
            });
        }

        for (index, split) in self.splits() {
            if usize::from(split.velocity_curve) >= self.velocity_curves.len() {
                warnings.push(Warning::VelocityCurveIndex {
                    split: index,
                    index: split.velocity_curve,
                    count: self.velocity_curves.len(),
                });
            }
            if split.start_note > split.end_note {
                warnings.push(Warning::NoteRange { split: index });
            }
            if split.velocity_low > split.velocity_high {
                warnings.push(Warning::VelocityRange { split: index });
            }

            warnings.extend(split.voice.clamped_fields().into_iter().map(|field| {
                Warning::UnrepresentableField {
                    voice: VoiceIndex::Split(index),
                    field,
                }
            }));
        }

        warnings
    }
}

#[cfg(test)]
mod test {
    use super::{Bank, Layer, Program, Split, VelocityCurve, MAX_PROGRAMS};
    use crate::{
        error::{Capacity, DecodeErrorKind, EncodeErrorKind, SplitIndex, VoiceIndex, Warning},
        header::FormatVersion,
        options::{LoadOptions, SaveOptions},
        tone::{Tone, ToneFormat},
        voice::Voice,
    };
    use std::io::Cursor;

    const SPLIT_0: usize = 0xD4;
    const SPLIT_1: usize = 0xD4 + 0x40;
    const TONE: usize = 0x154;
    const FILE_SIZE: usize = 0x220;

    fn split(tone: &Tone, start_note: u8, end_note: u8) -> Split {
        Split {
            start_note,
            end_note,
            base_note: 48,
            fine_tune: -12,
            drum_group: 3,
            reserved: [7; 19],
            voice: Voice {
                tone: Some(tone.clone()),
                looped: true,
                loop_start: 10,
                loop_end: 50,
                pan: 10,
                oscillator_level: 230,
                ..Voice::default()
            },
            ..Split::default()
        }
    }

    // One program with one layer of two splits sharing a 100-sample PCM16 tone.
    fn scenario() -> Bank {
        let samples: Vec<i16> = (0..100).map(|i| i * 300 - 15000).collect();
        let tone = Tone::from_samples(ToneFormat::Pcm16, &samples);

        let layer = Layer {
            delay: 5,
            bend_range_up: 2,
            bend_range_down: 12,
            splits: vec![split(&tone, 0, 59), split(&tone, 60, 127)],
        };

        Bank {
            drum: false,
            version: FormatVersion::V2,
            programs: vec![Program {
                layers: [Some(layer), None, None, None],
                reserved: 0xDEAD_BEEF,
            }],
            velocity_curves: vec![VelocityCurve::default()],
            reserved: [0x11; 16],
        }
    }

    fn le_u32(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn checksum(data: &[u8]) -> u32 {
        data.iter()
            .enumerate()
            .filter(|&(position, _)| position >= 4 && !(0x0C..0x10).contains(&position))
            .fold(0u32, |sum, (_, &byte)| sum.wrapping_add(u32::from(byte)))
    }

    #[test]
    fn identity_velocity_curve() {
        let curve = VelocityCurve::default();
        assert_eq!(curve.0[0], 0);
        assert_eq!(curve.0[64], 64);
        assert_eq!(curve.0[127], 127);
    }

    #[test]
    fn save_scenario_layout() {
        let data = scenario().to_bytes(SaveOptions::new()).unwrap();

        assert_eq!(data.len(), FILE_SIZE);
        assert_eq!(&data[..8], b"SMPB\x02\x00\x00\x00");
        assert_eq!(le_u32(&data, 0x08), FILE_SIZE as u32);
        assert_eq!(le_u32(&data, 0x0C), checksum(&data));
        assert_eq!(le_u32(&data, 0x10), 0xB0);
        assert_eq!(le_u32(&data, 0x14), 1);
        assert_eq!(le_u32(&data, 0x18), 0x30);
        assert_eq!(le_u32(&data, 0x1C), 1);
        assert_eq!(&data[0x20..0x30], [0x11; 16]);

        // program table, program record, layer record
        assert_eq!(le_u32(&data, 0xB0), 0xB4);
        assert_eq!(le_u32(&data, 0xB4), 0xC8);
        assert_eq!(&data[0xB8..0xC4], [0; 12]);
        assert_eq!(le_u32(&data, 0xC4), 0xDEAD_BEEF);
        assert_eq!(le_u32(&data, 0xC8), SPLIT_0 as u32);
        assert_eq!(le_u32(&data, 0xCC), 2);

        // both splits point at the single copy of the tone
        for split in [SPLIT_0, SPLIT_1] {
            assert_eq!(&data[split + 1..split + 4], [0x00, 0x54, 0x01]);
        }
        assert_eq!(&data[TONE..TONE + 2], (-15000i16).to_be_bytes());
        assert_eq!(&data[TONE + 200..TONE + 204], b"ENDB");
    }

    #[test]
    fn scenario_roundtrip() {
        let bank = scenario();
        let mut data = Vec::new();
        bank.save(&mut data).unwrap();

        let loaded = Bank::load(Cursor::new(&data)).unwrap();
        assert_eq!(loaded, bank);

        let splits = &loaded.programs[0].layers[0].as_ref().unwrap().splits;
        let first = splits[0].voice.tone.as_ref().unwrap();
        let second = splits[1].voice.tone.as_ref().unwrap();
        assert_eq!(first.samples(), 100);
        assert_eq!(second.samples(), 100);
        assert!(first.shares_buffer(second));
        assert_eq!(loaded.tones().len(), 1);

        // saving the loaded bank reproduces the file
        assert_eq!(loaded.to_bytes(SaveOptions::new()).unwrap(), data);
    }

    #[test]
    fn separate_buffers_are_written_separately() {
        let mut bank = scenario();
        let layer = bank.programs[0].layers[0].as_mut().unwrap();
        let data = layer.splits[1].voice.tone.as_ref().unwrap().data().to_vec();
        layer.splits[1].voice.tone = Some(Tone::new(ToneFormat::Pcm16, data));

        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(data.len(), 0x300);
        assert_eq!(&data[SPLIT_0 + 1..SPLIT_0 + 4], [0x00, 0x54, 0x01]);
        assert_eq!(&data[SPLIT_1 + 1..SPLIT_1 + 4], [0x00, 0x1C, 0x02]);

        let loaded = Bank::load(Cursor::new(data)).unwrap();
        let splits = &loaded.programs[0].layers[0].as_ref().unwrap().splits;
        let first = splits[0].voice.tone.as_ref().unwrap();
        let second = splits[1].voice.tone.as_ref().unwrap();
        assert_eq!(first, second);
        assert!(!first.shares_buffer(second));
        assert_eq!(loaded.tones().len(), 2);
    }

    #[test]
    fn too_many_programs() {
        let mut bank = scenario();
        bank.programs = vec![bank.programs[0].clone(); MAX_PROGRAMS + 1];

        let mut sink = Vec::new();
        let err = bank.save(&mut sink).unwrap_err();
        assert_eq!(
            err.kind(),
            EncodeErrorKind::CapacityExceeded {
                capacity: Capacity::Programs,
                count: 129
            }
        );
        assert!(sink.is_empty());

        bank.programs.truncate(MAX_PROGRAMS);
        assert!(bank.save(&mut sink).is_ok());
        assert!(!sink.is_empty());
    }

    #[test]
    fn too_many_splits_and_curves() {
        let mut bank = scenario();
        bank.velocity_curves = vec![VelocityCurve::default(); 32];
        assert!(bank.to_bytes(SaveOptions::new()).is_err_and(|e| e.kind()
            == EncodeErrorKind::CapacityExceeded {
                capacity: Capacity::VelocityCurves,
                count: 32
            }));

        let mut bank = scenario();
        let layer = bank.programs[0].layers[0].as_mut().unwrap();
        layer.splits = vec![layer.splits[0].clone(); 129];
        assert!(bank.to_bytes(SaveOptions::new()).is_err_and(|e| e.kind()
            == EncodeErrorKind::CapacityExceeded {
                capacity: Capacity::Splits,
                count: 129
            }));
    }

    #[test]
    fn missing_tone() {
        let mut bank = scenario();
        bank.programs[0].layers[0].as_mut().unwrap().splits[1].voice.tone = None;

        let mut sink = Vec::new();
        assert!(bank.save(&mut sink).is_err_and(|e| e.kind()
            == EncodeErrorKind::MissingTone {
                program: 0,
                layer: 0,
                split: 1
            }));
        assert!(sink.is_empty());
    }

    #[test]
    fn pan_follows_version() {
        let bank = scenario();

        let v1 = bank.to_bytes(SaveOptions::new().version(FormatVersion::V1)).unwrap();
        let v2 = bank.to_bytes(SaveOptions::new().version(FormatVersion::V2)).unwrap();
        assert_eq!(v1[SPLIT_0 + 0x12], 25);
        assert_eq!(v2[SPLIT_0 + 0x12], 10);

        for data in [v1, v2] {
            let loaded = Bank::load(Cursor::new(data)).unwrap();
            assert_eq!(loaded.splits().next().unwrap().1.voice.pan, 10);
        }
    }

    #[test]
    fn version_1_has_no_checksum() {
        let mut bank = scenario();
        bank.version = FormatVersion::V1;

        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(&data[4..8], [1, 0, 0, 0]);
        assert_eq!(le_u32(&data, 0x0C), 0);

        let loaded = Bank::load(Cursor::new(data)).unwrap();
        assert_eq!(loaded.version, FormatVersion::V1);
        assert_eq!(loaded, bank);

        let vendor = scenario()
            .to_bytes(SaveOptions::new().version(FormatVersion::VENDOR))
            .unwrap();
        assert_eq!(le_u32(&vendor, 0x0C), checksum(&vendor));
    }

    #[test]
    fn checksum_mismatch_is_not_fatal() {
        let mut data = scenario().to_bytes(SaveOptions::new()).unwrap();
        data[TONE] ^= 0xFF;

        let loaded = Bank::load(Cursor::new(&data)).unwrap();
        assert_ne!(loaded, scenario());

        let loaded = Bank::load_with(Cursor::new(&data), LoadOptions::new().verify_checksum(false));
        assert!(loaded.is_ok());
    }

    #[test]
    fn tone_size_strategies() {
        let data = scenario().to_bytes(SaveOptions::new()).unwrap();

        let options = LoadOptions::new();
        let gap = Bank::load_with(Cursor::new(&data), options.guess_tone_size(true)).unwrap();
        let loop_end = Bank::load_with(Cursor::new(&data), options.guess_tone_size(false)).unwrap();

        assert_eq!(gap.tones()[0].samples(), 100);
        assert_eq!(loop_end.tones()[0].samples(), 50);
        assert_eq!(loop_end.tones()[0].data(), &gap.tones()[0].data()[..100]);
    }

    #[test]
    fn empty_programs_keep_their_number() {
        let mut bank = scenario();
        bank.programs.insert(0, Program::default());
        bank.programs.push(Program::default());

        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(le_u32(&data, 0x14), 3);

        let loaded = Bank::load(Cursor::new(data)).unwrap();
        assert_eq!(loaded.programs.len(), 3);
        assert!(loaded.programs[0].is_empty());
        assert!(!loaded.programs[1].is_empty());
        assert!(loaded.programs[2].is_empty());
        assert_eq!(loaded, bank);
    }

    #[test]
    fn program_record_without_layers() {
        let mut bank = scenario();
        bank.programs.push(Program {
            layers: [None, None, None, None],
            reserved: 0x1234,
        });

        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_ne!(le_u32(&data, 0xB4), 0);

        let loaded = Bank::load(Cursor::new(data)).unwrap();
        assert!(loaded.programs[1].is_empty());
        assert_eq!(loaded.programs[1].reserved, 0x1234);
        assert_eq!(loaded, bank);
    }

    #[test]
    fn unknown_split_bits_survive() {
        let mut data = scenario().to_bytes(SaveOptions::new()).unwrap();
        for (offset, bits) in [
            (0x09, 0x80),
            (0x0D, 0x80),
            (0x12, 0xE0),
            (0x13, 0xA0),
            (0x15, 0xC0),
            (0x1B, 0xE0),
            (0x20, 0xE0),
        ] {
            data[SPLIT_0 + offset] |= bits;
        }

        let loaded = Bank::load(Cursor::new(&data)).unwrap();
        let saved = loaded.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(&saved[SPLIT_0..SPLIT_1], &data[SPLIT_0..SPLIT_1]);
        assert_eq!(&saved[SPLIT_1..TONE], &data[SPLIT_1..TONE]);
    }

    #[test]
    fn load_ignores_stream_position() {
        let data = scenario().to_bytes(SaveOptions::new()).unwrap();
        let mut source = Cursor::new(data);
        source.set_position(20);
        assert_eq!(Bank::load(source).unwrap(), scenario());
    }

    #[test]
    fn drum_banks() {
        let mut bank = scenario();
        bank.drum = true;
        bank.programs[0].layers[0].as_mut().unwrap().splits[0].drum_mode = true;

        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(&data[..4], b"SMDB");
        assert_eq!(Bank::load(Cursor::new(data)).unwrap(), bank);
    }

    #[test]
    fn empty_bank() {
        let bank = Bank::new();
        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        assert_eq!(data.len(), 0x40);
        assert_eq!(Bank::load(Cursor::new(data)).unwrap(), bank);
    }

    #[test]
    fn reject_other_signatures() {
        let mut data = scenario().to_bytes(SaveOptions::new()).unwrap();

        data[..4].copy_from_slice(b"SOSB");
        assert!(Bank::load(Cursor::new(&data))
            .is_err_and(|e| e.kind() == DecodeErrorKind::InvalidMagic));

        data[..4].copy_from_slice(b"XXXX");
        assert!(Bank::load(Cursor::new(&data))
            .is_err_and(|e| e.kind() == DecodeErrorKind::InvalidMagic));
    }

    #[test]
    fn truncated_file() {
        let data = scenario().to_bytes(SaveOptions::new()).unwrap();

        let err = Bank::load(Cursor::new(&data[..0x120])).unwrap_err();
        assert!(err.is_truncated());
        assert_eq!(
            err.kind(),
            DecodeErrorKind::Split {
                program: 0,
                layer: 0,
                split: 1
            }
        );

        let err = Bank::load(Cursor::new(&data[..0x20])).unwrap_err();
        assert!(err.is_truncated());
    }

    #[test]
    fn dangling_tone_pointer() {
        let mut data = scenario().to_bytes(SaveOptions::new()).unwrap();
        data[SPLIT_1 + 1] = 0x7F;

        assert!(Bank::load(Cursor::new(data)).is_err_and(|e| e.kind()
            == DecodeErrorKind::DanglingToneReference {
                pointer: 0x7F_0154
            }));
    }

    #[test]
    fn validation_warnings() {
        let mut bank = scenario();
        assert!(bank.validate().is_empty());

        bank.version = FormatVersion(9);
        let layer = bank.programs[0].layers[0].as_mut().unwrap();
        layer.splits[0].velocity_curve = 1;
        layer.splits[1].start_note = 100;
        layer.splits[1].end_note = 90;
        layer.splits[1].velocity_low = 127;
        layer.splits[1].velocity_high = 1;
        layer.splits[1].voice.amp.release = 32;

        let second = SplitIndex {
            program: 0,
            layer: 0,
            split: 1,
        };
        assert_eq!(
            bank.validate(),
            [
                Warning::UnsupportedVersion { version: 9 },
                Warning::VelocityCurveIndex {
                    split: SplitIndex {
                        program: 0,
                        layer: 0,
                        split: 0
                    },
                    index: 1,
                    count: 1
                },
                Warning::NoteRange { split: second },
                Warning::VelocityRange { split: second },
                Warning::UnrepresentableField {
                    voice: VoiceIndex::Split(second),
                    field: "amp.release"
                },
            ]
        );

        // validation problems never prevent saving or loading
        let data = bank.to_bytes(SaveOptions::new()).unwrap();
        let loaded = Bank::load(Cursor::new(data)).unwrap();
        let layer = loaded.programs[0].layers[0].as_ref().unwrap();
        assert_eq!(layer.splits[1].voice.amp.release, 31);
    }
}
