use super::{Bank, MAX_PROGRAMS, MAX_SPLITS, MAX_VELOCITY_CURVES};
use crate::{
    error::{Capacity, EncodeError, EncodeErrorKind},
    header::{FormatVersion, Header},
    tone_table::{ToneFraming, TonePlacer},
    voice::encode_tone_pointer,
    write::{Placeholder, Writer},
};
use tracing::{debug, instrument, trace};

#[instrument(level = "trace", skip_all)]
pub(super) fn encode(bank: &Bank, version: FormatVersion) -> Result<Vec<u8>, EncodeError> {
    check_capacity(bank)?;

    let mut writer = Writer::new();
    let slots = Header::write(&mut writer, bank.kind(), version);

    let program_table = writer.placeholder();
    writer.le_u32(count(bank.programs.len()));
    let curve_table = writer.placeholder();
    writer.le_u32(count(bank.velocity_curves.len()));
    writer.bytes(&bank.reserved);

    writer.patch_here(curve_table);
    for curve in &bank.velocity_curves {
        writer.bytes(&curve.0);
    }

    writer.patch_here(program_table);
    let program_slots: Vec<Placeholder> =
        bank.programs.iter().map(|_| writer.placeholder()).collect();

    // position of every split record, in file order
    let mut split_positions = Vec::new();

    for (index, (program, slot)) in bank.programs.iter().zip(program_slots).enumerate() {
        // empty programs keep their null pointer unless their record carries data
        if program.is_empty() && program.reserved == 0 {
            continue;
        }

        writer.patch_here(slot);
        let layer_slots: Vec<Option<Placeholder>> = program
            .layers
            .iter()
            .map(|layer| match layer {
                Some(_) => Some(writer.placeholder()),
                None => {
                    writer.le_u32(0);
                    None
                }
            })
            .collect();
        writer.le_u32(program.reserved);

        let mut split_tables = Vec::new();
        for (layer, slot) in program.layers.iter().zip(layer_slots) {
            if let (Some(layer), Some(slot)) = (layer, slot) {
                writer.patch_here(slot);
                split_tables.push((layer, writer.placeholder()));
                writer.le_u32(count(layer.splits.len()));
                writer.le_u16(layer.delay);
                writer.u8(layer.bend_range_up);
                writer.u8(layer.bend_range_down);
            }
        }

        for (layer, split_table) in split_tables {
            writer.patch_here(split_table);
            for split in &layer.splits {
                split_positions.push(writer.position());
                writer.bytes(&split.to_bytes(version));
            }
        }

        trace!(index, "wrote program");
    }

    let mut tones = TonePlacer::new(ToneFraming::BARE);
    for ((index, split), position) in bank.splits().zip(split_positions) {
        let tone = split.voice.tone.as_ref().ok_or_else(|| {
            EncodeError::new(EncodeErrorKind::MissingTone {
                program: index.program,
                layer: index.layer,
                split: index.split,
            })
        })?;

        let pointer = tones.place(&mut writer, tone)?;
        let jump = writer.byte_at(position + 1);
        writer.patch_bytes(position + 1, &encode_tone_pointer(jump, pointer));
    }

    Header::finish(&mut writer, slots);

    debug!(
        programs = bank.programs.len(),
        tones = tones.len(),
        size = writer.position(),
        "encoded bank"
    );
    Ok(writer.into_inner())
}

fn check_capacity(bank: &Bank) -> Result<(), EncodeError> {
    if bank.programs.len() > MAX_PROGRAMS {
        return Err(EncodeError::capacity(Capacity::Programs, bank.programs.len()));
    }
    if bank.velocity_curves.len() > MAX_VELOCITY_CURVES {
        return Err(EncodeError::capacity(
            Capacity::VelocityCurves,
            bank.velocity_curves.len(),
        ));
    }

    let splits = bank
        .programs
        .iter()
        .flat_map(|program| program.layers.iter().flatten())
        .map(|layer| layer.splits.len())
        .max()
        .unwrap_or_default();
    if splits > MAX_SPLITS {
        return Err(EncodeError::capacity(Capacity::Splits, splits));
    }

    Ok(())
}

// Table sizes are checked against the format limits before anything is written.
fn count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
