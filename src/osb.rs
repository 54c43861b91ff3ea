//! One-shot sound banks (`SOSB`).
//!
//! A one-shot bank is a flat list of programs, each playing a single tone through one [`Voice`]
//! without any key or velocity zones. Entries and tones are framed by markers.

use crate::{
    bank::MAX_PROGRAMS,
    error::{
        Capacity, DecodeError, DecodeErrorKind, EncodeError, EncodeErrorKind, VoiceIndex, Warning,
    },
    header::{compute_checksum, locate_end_marker, BankKind, FormatVersion, Header},
    options::{LoadOptions, SaveOptions},
    read::Reader,
    tone::Tone,
    tone_table::{ToneFraming, TonePlacer, ToneTable},
    voice::{encode_tone_pointer, ToneLink, Voice, VOICE_SIZE},
    write::Writer,
};
use std::{
    collections::HashSet,
    io::{Read, Seek, Write},
};
use tracing::{debug, instrument, trace, warn};

const HEADER_SIZE: usize = 0x20;
const ENTRY_MAGIC: [u8; 4] = *b"SOSP";
const ENTRY_END: [u8; 4] = *b"ENDP";
const ENTRY_RESERVED_SIZE: usize = 10;

/// One-shot sound bank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OneShotBank {
    /// Format version the bank was loaded from, and is saved as by default.
    pub version: FormatVersion,
    /// Programs, indexed by program number. `None` marks an unused program number.
    pub programs: Vec<Option<OneShot>>,
    /// Header bytes without a known meaning, kept as found.
    pub reserved: [u8; 8],
}

/// Program of a one-shot bank.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OneShot {
    /// Voice registers and tone.
    pub voice: Voice,
    /// Time the loop keeps playing. Version 1 stores 32 bits, later versions 16.
    pub loop_time: u32,
    /// Entry bytes without a known meaning, kept as found.
    pub reserved: [u8; ENTRY_RESERVED_SIZE],
}

// Size of the fields following the voice block.
fn trailer_size(version: FormatVersion) -> usize {
    if version.has_wide_loop_time() {
        16
    } else {
        14
    }
}

fn entry_size(version: FormatVersion) -> usize {
    ENTRY_MAGIC.len() + VOICE_SIZE + trailer_size(version) + ENTRY_END.len()
}

impl OneShotBank {
    /// Creates an empty one-shot bank.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a one-shot bank with the default [`LoadOptions`].
    ///
    /// # Errors
    ///
    /// Fails if the data is not a one-shot bank, an entry is cut short or misses its markers,
    /// or a voice refers to a tone outside of the file.
    pub fn load<R: Read + Seek>(source: R) -> Result<Self, DecodeError> {
        Self::load_with(source, LoadOptions::default())
    }

    /// Loads a one-shot bank.
    ///
    /// Offsets are absolute, so `source` is read from its start regardless of its current position.
    ///
    /// # Errors
    ///
    /// See [`OneShotBank::load`].
    #[instrument(level = "trace", skip_all)]
    pub fn load_with<R: Read + Seek>(source: R, options: LoadOptions) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(source);
        let reader = &mut reader;

        reader
            .seek_to(0)
            .map_err(DecodeError::factory(DecodeErrorKind::InvalidMagic))?;
        let header = Header::parse(reader)?;
        if header.kind != BankKind::OneShot {
            return Err(DecodeError::new(DecodeErrorKind::InvalidMagic));
        }
        let version = header.version;

        let program_table = read_offset(reader, DecodeErrorKind::ProgramTable)?;
        let program_count = read_offset(reader, DecodeErrorKind::ProgramTable)?;
        let reserved = reader
            .take_const()
            .map_err(DecodeError::factory(DecodeErrorKind::Header))?;

        header
            .check_file_size(reader)
            .map_err(DecodeError::factory(DecodeErrorKind::FileSize))?;

        if options.verify_checksum && version.has_checksum() {
            let computed = compute_checksum(reader)
                .map_err(DecodeError::factory(DecodeErrorKind::Checksum))?;
            if computed != header.checksum {
                warn!(
                    stored = header.checksum,
                    computed, "checksum did not match file contents"
                );
            }
        }

        if program_count > MAX_PROGRAMS {
            warn!(program_count, "bank has more programs than the format allows");
        }

        let mut tone_table = ToneTable::new();
        let mut pointers = Vec::new();
        let mut programs = Vec::new();
        let mut structure_end = HEADER_SIZE;

        for index in 0..program_count {
            reader
                .seek_to(program_table + index * 4)
                .map_err(DecodeError::factory(DecodeErrorKind::ProgramPointer { index }))?;
            let pointer = read_offset(reader, DecodeErrorKind::ProgramPointer { index })?;
            structure_end = structure_end.max(reader.position());

            if pointer == 0 {
                programs.push(None);
                continue;
            }

            let (program, link) = read_entry(reader, version, index, pointer)?;
            structure_end = structure_end.max(reader.position());

            tone_table.add(link, program.voice.loop_end);
            pointers.push(link.pointer);
            programs.push(Some(program));
        }

        let region_end = locate_end_marker(reader)
            .map_err(DecodeError::factory(DecodeErrorKind::EndMarker))?;

        let tones = tone_table.materialize(
            reader,
            options.tone_size,
            ToneFraming::ONE_SHOT,
            structure_end..region_end,
        )?;

        let mut bank = Self {
            version,
            programs,
            reserved,
        };

        let shots = bank.programs.iter_mut().flatten();
        for (program, pointer) in shots.zip(pointers) {
            program.voice.tone = tones.get(&pointer).cloned();
        }

        for warning in bank.validate() {
            warn!(%warning, "bank validation");
        }

        debug!(
            programs = bank.programs.len(),
            tones = tones.len(),
            "loaded one-shot bank"
        );
        Ok(bank)
    }

    /// Saves the bank in its own format version.
    ///
    /// # Errors
    ///
    /// See [`OneShotBank::save_with`].
    pub fn save<W: Write>(&self, sink: W) -> Result<(), EncodeError> {
        self.save_with(sink, SaveOptions::default())
    }

    /// Saves the bank. Nothing is written to `sink` unless encoding succeeds.
    ///
    /// # Errors
    ///
    /// Fails if there are too many programs, a program has no tone, or writing to `sink` fails.
    pub fn save_with<W: Write>(&self, mut sink: W, options: SaveOptions) -> Result<(), EncodeError> {
        let data = self.to_bytes(options)?;
        sink.write_all(&data).map_err(EncodeError::write)
    }

    /// Encodes the bank into a new buffer.
    ///
    /// # Errors
    ///
    /// See [`OneShotBank::save_with`].
    #[instrument(level = "trace", skip_all)]
    pub fn to_bytes(&self, options: SaveOptions) -> Result<Vec<u8>, EncodeError> {
        let version = options.version.unwrap_or(self.version);

        if self.programs.len() > MAX_PROGRAMS {
            return Err(EncodeError::capacity(Capacity::Programs, self.programs.len()));
        }

        let mut writer = Writer::new();
        let slots = Header::write(&mut writer, BankKind::OneShot, version);

        let program_table = writer.placeholder();
        writer.le_u32(u32::try_from(self.programs.len()).unwrap_or(u32::MAX));
        writer.bytes(&self.reserved);

        writer.patch_here(program_table);
        let program_slots: Vec<_> = self.programs.iter().map(|_| writer.placeholder()).collect();

        let mut entries = Vec::new();
        for ((index, program), slot) in self.programs.iter().enumerate().zip(program_slots) {
            let Some(program) = program else {
                continue;
            };

            writer.patch_here(slot);
            entries.push((index, program, writer.position()));
            write_entry(&mut writer, program, version);
            trace!(index, "wrote one-shot entry");
        }

        let mut tones = TonePlacer::new(ToneFraming::ONE_SHOT);
        for (index, program, position) in entries {
            let tone = program.voice.tone.as_ref().ok_or_else(|| {
                EncodeError::new(EncodeErrorKind::MissingOneShotTone { program: index })
            })?;

            let pointer = tones.place(&mut writer, tone)?;
            let at = position + ENTRY_MAGIC.len() + 1;
            let jump = writer.byte_at(at);
            writer.patch_bytes(at, &encode_tone_pointer(jump, pointer));
        }

        Header::finish(&mut writer, slots);

        debug!(
            programs = self.programs.len(),
            tones = tones.len(),
            size = writer.position(),
            "encoded one-shot bank"
        );
        Ok(writer.into_inner())
    }

    /// Returns every distinct tone buffer played by the bank, in program order.
    #[must_use]
    pub fn tones(&self) -> Vec<&Tone> {
        let mut seen = HashSet::new();
        self.programs
            .iter()
            .flatten()
            .filter_map(|program| program.voice.tone.as_ref())
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

        for (index, program) in self.programs.iter().enumerate() {
            let Some(program) = program else {
                continue;
            };

            let voice = VoiceIndex::OneShot(index);
            warnings.extend(
                program
                    .voice
                    .clamped_fields()
                    .into_iter()
                    .map(|field| Warning::UnrepresentableField { voice, field }),
            );

            if !self.version.has_wide_loop_time() && program.loop_time > u32::from(u16::MAX) {
                warnings.push(Warning::UnrepresentableField {
                    voice,
                    field: "loop_time",
                });
            }
        }

        warnings
    }
}

fn read_offset<R: Read + Seek>(
    reader: &mut Reader<R>,
    kind: DecodeErrorKind,
) -> Result<usize, DecodeError> {
    reader
        .le_u32()
        .map(|value| usize::try_from(value).unwrap_or(usize::MAX))
        .map_err(DecodeError::factory(kind))
}

fn read_entry<R: Read + Seek>(
    reader: &mut Reader<R>,
    version: FormatVersion,
    index: usize,
    pointer: usize,
) -> Result<(OneShot, ToneLink), DecodeError> {
    let entry_error = || DecodeError::factory(DecodeErrorKind::Program { index });

    reader.seek_to(pointer).map_err(entry_error())?;
    let entry = reader.take(entry_size(version)).map_err(entry_error())?;

    let (magic, rest) = entry.split_at(ENTRY_MAGIC.len());
    let (body, end) = rest.split_at(rest.len() - ENTRY_END.len());
    if magic != ENTRY_MAGIC || end != ENTRY_END {
        return Err(DecodeError::new(DecodeErrorKind::EntryMagic { index }));
    }

    let mut voice = [0; VOICE_SIZE];
    voice.copy_from_slice(&body[..VOICE_SIZE]);
    let (voice, link) = Voice::from_bytes(&voice, version);

    let fields = &body[VOICE_SIZE..];
    let loop_end = u16::from_le_bytes([fields[0], fields[1]]);
    if loop_end != voice.loop_end {
        debug!(index, loop_end, "entry loop end differs from its voice, using the voice");
    }

    let (loop_time, reserved) = if version.has_wide_loop_time() {
        let loop_time = u32::from_le_bytes([fields[2], fields[3], fields[4], fields[5]]);
        (loop_time, &fields[6..])
    } else {
        (u32::from(u16::from_le_bytes([fields[2], fields[3]])), &fields[4..])
    };

    let mut program = OneShot {
        voice,
        loop_time,
        ..OneShot::default()
    };
    program.reserved.copy_from_slice(reserved);

    trace!(index, "read one-shot entry");
    Ok((program, link))
}

fn write_entry(writer: &mut Writer, program: &OneShot, version: FormatVersion) {
    writer.bytes(&ENTRY_MAGIC);
    writer.bytes(&program.voice.to_bytes(version));
    writer.le_u16(program.voice.loop_end);

    if version.has_wide_loop_time() {
        writer.le_u32(program.loop_time);
    } else {
        writer.le_u16(u16::try_from(program.loop_time).unwrap_or(u16::MAX));
    }

    writer.bytes(&program.reserved);
    writer.bytes(&ENTRY_END);
}
