use super::{
    Bank, Layer, Program, Split, VelocityCurve, HEADER_SIZE, MAX_PROGRAMS, PROGRAM_RECORD_SIZE,
    SPLIT_SIZE,
};
use crate::{
    error::{DecodeError, DecodeErrorKind},
    header::{compute_checksum, locate_end_marker, BankKind, FormatVersion, Header},
    options::LoadOptions,
    read::Reader,
    tone_table::{ToneFraming, ToneTable},
};
use std::io::{Read, Seek};
use tracing::{debug, instrument, trace, warn};

// Tones referenced by the splits, and each split's tone pointer in file order.
#[derive(Debug, Default)]
struct Structure {
    tones: ToneTable,
    pointers: Vec<u32>,
}

#[instrument(level = "trace", skip_all)]
pub(super) fn load<R: Read + Seek>(
    reader: &mut Reader<R>,
    options: LoadOptions,
) -> Result<Bank, DecodeError> {
    reader
        .seek_to(0)
        .map_err(DecodeError::factory(DecodeErrorKind::InvalidMagic))?;

    let header = Header::parse(reader)?;
    let drum = match header.kind {
        BankKind::Melodic => false,
        BankKind::Drum => true,
        BankKind::OneShot => return Err(DecodeError::new(DecodeErrorKind::InvalidMagic)),
    };
    let version = header.version;

    let program_table = read_offset(reader, DecodeErrorKind::ProgramTable)?;
    let program_count = read_offset(reader, DecodeErrorKind::ProgramTable)?;
    let curve_table = read_offset(reader, DecodeErrorKind::VelocityCurves)?;
    let curve_count = read_offset(reader, DecodeErrorKind::VelocityCurves)?;
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

    let velocity_curves = read_velocity_curves(reader, curve_table, curve_count)?;

    let mut structure = Structure::default();
    let mut programs = Vec::new();
    for index in 0..program_count {
        reader
            .seek_to(program_table + index * 4)
            .map_err(DecodeError::factory(DecodeErrorKind::ProgramPointer { index }))?;
        let pointer = read_offset(reader, DecodeErrorKind::ProgramPointer { index })?;

        let program = if pointer == 0 {
            Program::default()
        } else {
            read_program(reader, &mut structure, version, index, pointer)?
        };
        programs.push(program);
    }

    let region_end = locate_end_marker(reader)
        .map_err(DecodeError::factory(DecodeErrorKind::EndMarker))?;

    let tones = structure.tones.materialize(
        reader,
        options.tone_size,
        ToneFraming::BARE,
        HEADER_SIZE..region_end,
    )?;

    let mut bank = Bank {
        drum,
        version,
        programs,
        velocity_curves,
        reserved,
    };

    for (split, pointer) in bank.splits_mut().zip(structure.pointers) {
        split.voice.tone = tones.get(&pointer).cloned();
    }

    for warning in bank.validate() {
        warn!(%warning, "bank validation");
    }

    debug!(
        programs = bank.programs.len(),
        tones = tones.len(),
        "loaded bank"
    );
    Ok(bank)
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

fn read_velocity_curves<R: Read + Seek>(
    reader: &mut Reader<R>,
    table: usize,
    count: usize,
) -> Result<Vec<VelocityCurve>, DecodeError> {
    if count == 0 {
        return Ok(Vec::new());
    }

    reader
        .seek_to(table)
        .map_err(DecodeError::factory(DecodeErrorKind::VelocityCurves))?;

    (0..count)
        .map(|_| {
            reader
                .take_const()
                .map(VelocityCurve)
                .map_err(DecodeError::factory(DecodeErrorKind::VelocityCurves))
        })
        .collect()
}

fn read_program<R: Read + Seek>(
    reader: &mut Reader<R>,
    structure: &mut Structure,
    version: FormatVersion,
    index: usize,
    pointer: usize,
) -> Result<Program, DecodeError> {
    let program_error = || DecodeError::factory(DecodeErrorKind::Program { index });

    reader.seek_to(pointer).map_err(program_error())?;
    let record: [u8; PROGRAM_RECORD_SIZE] = reader.take_const().map_err(program_error())?;

    let word = |offset: usize| {
        u32::from_le_bytes([
            record[offset],
            record[offset + 1],
            record[offset + 2],
            record[offset + 3],
        ])
    };

    let mut program = Program {
        reserved: word(16),
        ..Program::default()
    };

    for (layer, slot) in program.layers.iter_mut().enumerate() {
        let pointer = usize::try_from(word(layer * 4)).unwrap_or(usize::MAX);
        if pointer != 0 {
            *slot = Some(read_layer(reader, structure, version, index, layer, pointer)?);
        }
    }

    trace!(index, "read program");
    Ok(program)
}

fn read_layer<R: Read + Seek>(
    reader: &mut Reader<R>,
    structure: &mut Structure,
    version: FormatVersion,
    program: usize,
    layer: usize,
    pointer: usize,
) -> Result<Layer, DecodeError> {
    let layer_error = || DecodeError::factory(DecodeErrorKind::Layer { program, layer });

    reader.seek_to(pointer).map_err(layer_error())?;
    let split_table = reader.le_u32().map_err(layer_error())?;
    let split_count = reader.le_u32().map_err(layer_error())?;
    let delay = reader.le_u16().map_err(layer_error())?;
    let bend_range_up = reader.u8().map_err(layer_error())?;
    let bend_range_down = reader.u8().map_err(layer_error())?;

    let split_table = usize::try_from(split_table).unwrap_or(usize::MAX);
    let split_count = usize::try_from(split_count).unwrap_or(usize::MAX);

    let mut splits = Vec::new();
    for split in 0..split_count {
        let split_error = DecodeError::factory(DecodeErrorKind::Split {
            program,
            layer,
            split,
        });

        let buf = reader
            .seek_to(split_table + split * SPLIT_SIZE)
            .and_then(|()| reader.take_const())
            .map_err(split_error)?;

        let (record, link) = Split::from_bytes(&buf, version);
        structure.tones.add(link, record.voice.loop_end);
        structure.pointers.push(link.pointer);
        splits.push(record);
    }

    Ok(Layer {
        delay,
        bend_range_up,
        bend_range_down,
        splits,
    })
}
