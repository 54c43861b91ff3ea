use crate::{
    error::{Capacity, DecodeError, DecodeErrorKind, EncodeError},
    options::ToneSizeStrategy,
    read::Reader,
    tone::{Tone, ToneFormat},
    voice::{max_tone_pointer, ToneLink},
    write::Writer,
};
use std::{
    collections::{BTreeMap, HashMap},
    io::{Read, Seek},
    ops::Range,
};
use tracing::{debug, instrument, trace, warn};

/// Markers written around each tone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ToneFraming {
    pub(crate) header: &'static [u8],
    pub(crate) trailer: &'static [u8],
}

impl ToneFraming {
    /// Melodic and drum banks store tones back to back.
    pub(crate) const BARE: Self = Self {
        header: &[],
        trailer: &[],
    };

    /// One-shot banks frame every tone; tone pointers address the header marker.
    pub(crate) const ONE_SHOT: Self = Self {
        header: b"SOSD",
        trailer: b"ENDD",
    };
}

#[derive(Debug)]
struct PendingTone {
    format: ToneFormat,
    loop_end: u16,
}

/// Tones referenced by the voices of a bank that is being loaded, keyed by file offset.
#[derive(Debug, Default)]
pub(crate) struct ToneTable {
    pending: BTreeMap<u32, PendingTone>,
}

impl ToneTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers a voice's tone. Voices sharing a pointer share the tone.
    pub(crate) fn add(&mut self, link: ToneLink, loop_end: u16) {
        let pending = self.pending.entry(link.pointer).or_insert(PendingTone {
            format: link.format,
            loop_end,
        });

        if pending.format != link.format {
            warn!(
                pointer = link.pointer,
                "tone is played in more than one format, keeping {:?}", pending.format
            );
        }
        pending.loop_end = pending.loop_end.max(loop_end);
    }

    /// Reads every registered tone once.
    ///
    /// `region` spans the part of the file tones may live in, from the end of the bank structure
    /// to the end marker.
    #[instrument(level = "trace", skip_all)]
    pub(crate) fn materialize<R: Read + Seek>(
        self,
        reader: &mut Reader<R>,
        strategy: ToneSizeStrategy,
        framing: ToneFraming,
        region: Range<usize>,
    ) -> Result<HashMap<u32, Tone>, DecodeError> {
        let starts: Vec<usize> = self.pending.keys().map(|&pointer| to_usize(pointer)).collect();
        let mut tones = HashMap::with_capacity(starts.len());

        for (index, (&pointer, pending)) in self.pending.iter().enumerate() {
            let start = starts[index];
            let data_start = start + framing.header.len();

            if !region.contains(&start) || data_start > region.end {
                return Err(DecodeError::new(DecodeErrorKind::DanglingToneReference {
                    pointer,
                }));
            }

            let gap_end = starts.get(index + 1).map_or(region.end, |&next| next.min(region.end));
            let len = match strategy {
                ToneSizeStrategy::Gap => gap_end.saturating_sub(data_start + framing.trailer.len()),
                ToneSizeStrategy::LoopEnd => pending
                    .format
                    .bytes_for(usize::from(pending.loop_end))
                    .min(region.end - data_start),
            };

            let read_error = DecodeError::factory(DecodeErrorKind::ToneData { pointer });
            reader.seek_to(start).map_err(read_error)?;

            if !framing.header.is_empty() {
                let marker = reader
                    .take(framing.header.len())
                    .map_err(DecodeError::factory(DecodeErrorKind::ToneData { pointer }))?;
                if marker != framing.header {
                    warn!(pointer, "tone marker was missing");
                }
            }

            let data = reader
                .take(len)
                .map_err(DecodeError::factory(DecodeErrorKind::ToneData { pointer }))?;

            trace!(pointer, len, format = ?pending.format, "read tone");
            drop(tones.insert(pointer, Tone::new(pending.format, data)));
        }

        debug!(count = tones.len(), "read tones");
        Ok(tones)
    }
}

fn to_usize(pointer: u32) -> usize {
    usize::try_from(pointer).unwrap_or(usize::MAX)
}

/// Writes tones for a bank that is being saved, each distinct buffer once.
#[derive(Debug)]
pub(crate) struct TonePlacer {
    framing: ToneFraming,
    placed: HashMap<*const u8, u32>,
}

impl TonePlacer {
    pub(crate) fn new(framing: ToneFraming) -> Self {
        Self {
            framing,
            placed: HashMap::new(),
        }
    }

    /// Returns the offset of `tone`, writing it first if its buffer has not been written yet.
    pub(crate) fn place(&mut self, writer: &mut Writer, tone: &Tone) -> Result<u32, EncodeError> {
        if let Some(&pointer) = self.placed.get(&tone.buffer_id()) {
            return Ok(pointer);
        }

        let position = writer.position();
        let pointer = u32::try_from(position)
            .ok()
            .filter(|&pointer| pointer <= max_tone_pointer())
            .ok_or_else(|| EncodeError::capacity(Capacity::ToneAddress, position))?;

        writer.bytes(self.framing.header);
        writer.bytes(tone.data());
        writer.bytes(self.framing.trailer);

        trace!(pointer, len = tone.data().len(), "wrote tone");
        let _ = self.placed.insert(tone.buffer_id(), pointer);
        Ok(pointer)
    }

    /// Number of distinct tones written so far.
    pub(crate) fn len(&self) -> usize {
        self.placed.len()
    }
}

#[cfg(test)]
mod test {
    use super::{ToneFraming, TonePlacer, ToneTable};
    use crate::{
        error::DecodeErrorKind,
        options::ToneSizeStrategy,
        read::Reader,
        tone::{Tone, ToneFormat},
        voice::ToneLink,
        write::Writer,
    };
    use std::io::Cursor;

    fn link(pointer: u32, format: ToneFormat) -> ToneLink {
        ToneLink { pointer, format }
    }

    fn file() -> Vec<u8> {
        (0..64).collect()
    }

    fn table() -> ToneTable {
        let mut table = ToneTable::new();
        table.add(link(30, ToneFormat::Pcm16), 4);
        table.add(link(16, ToneFormat::Pcm8), 3);
        table.add(link(16, ToneFormat::Pcm8), 5);
        table
    }

    #[test]
    fn gap_sizes() {
        let mut reader = Reader::new(Cursor::new(file()));
        let tones = table()
            .materialize(&mut reader, ToneSizeStrategy::Gap, ToneFraming::BARE, 16..48)
            .unwrap();

        assert_eq!(tones.len(), 2);
        assert_eq!(tones[&16].format(), ToneFormat::Pcm8);
        assert_eq!(tones[&16].data(), (16..30).collect::<Vec<u8>>());
        assert_eq!(tones[&30].format(), ToneFormat::Pcm16);
        assert_eq!(tones[&30].data(), (30..48).collect::<Vec<u8>>());
    }

    #[test]
    fn loop_end_sizes() {
        let mut reader = Reader::new(Cursor::new(file()));
        let tones = table()
            .materialize(&mut reader, ToneSizeStrategy::LoopEnd, ToneFraming::BARE, 16..48)
            .unwrap();

        // the largest loop end of the voices sharing a tone wins
        assert_eq!(tones[&16].data(), [16, 17, 18, 19, 20]);
        assert_eq!(tones[&30].samples(), 4);
        assert_eq!(tones[&30].data().len(), 8);
    }

    #[test]
    fn loop_end_stops_at_region_end() {
        let mut table = ToneTable::new();
        table.add(link(40, ToneFormat::Adpcm), 1000);

        let mut reader = Reader::new(Cursor::new(file()));
        let tones = table
            .materialize(&mut reader, ToneSizeStrategy::LoopEnd, ToneFraming::BARE, 16..48)
            .unwrap();
        assert_eq!(tones[&40].data().len(), 8);
    }

    #[test]
    fn framed_tones() {
        let mut data = vec![0; 8];
        data.extend_from_slice(b"SOSD\x01\x02\x03\x04\x05\x06ENDDSOSD\x07\x08ENDDENDB");

        let mut table = ToneTable::new();
        table.add(link(8, ToneFormat::Pcm8), 0);
        table.add(link(22, ToneFormat::Pcm8), 0);

        let mut reader = Reader::new(Cursor::new(data));
        let tones = table
            .materialize(&mut reader, ToneSizeStrategy::Gap, ToneFraming::ONE_SHOT, 8..32)
            .unwrap();

        assert_eq!(tones[&8].data(), [1, 2, 3, 4, 5, 6]);
        assert_eq!(tones[&22].data(), [7, 8]);
    }

    #[test]
    fn dangling_pointers() {
        for pointer in [4, 48, 60] {
            let mut table = ToneTable::new();
            table.add(link(pointer, ToneFormat::Pcm16), 0);

            let mut reader = Reader::new(Cursor::new(file()));
            assert!(table
                .materialize(&mut reader, ToneSizeStrategy::Gap, ToneFraming::BARE, 16..48)
                .is_err_and(|e| e.kind() == DecodeErrorKind::DanglingToneReference { pointer }));
        }
    }

    #[test]
    fn truncated_tone_data() {
        let mut table = ToneTable::new();
        table.add(link(16, ToneFormat::Pcm16), 0);

        // the region claims more data than the file holds
        let mut reader = Reader::new(Cursor::new(file()));
        assert!(table
            .materialize(&mut reader, ToneSizeStrategy::Gap, ToneFraming::BARE, 16..100)
            .is_err_and(|e| e.kind() == DecodeErrorKind::ToneData { pointer: 16 }
                && e.is_truncated()));
    }

    #[test]
    fn place_each_buffer_once() {
        let tone = Tone::new(ToneFormat::Pcm8, vec![1, 2, 3]);
        let copy = Tone::new(ToneFormat::Pcm8, vec![1, 2, 3]);

        let mut writer = Writer::new();
        writer.bytes(b"head");
        let mut placer = TonePlacer::new(ToneFraming::BARE);

        assert_eq!(placer.place(&mut writer, &tone).unwrap(), 4);
        assert_eq!(placer.place(&mut writer, &tone.clone()).unwrap(), 4);
        assert_eq!(placer.place(&mut writer, &copy).unwrap(), 7);
        assert_eq!(placer.len(), 2);
        assert_eq!(writer.into_inner(), b"head\x01\x02\x03\x01\x02\x03");
    }

    #[test]
    fn place_framed_tones() {
        let tone = Tone::new(ToneFormat::Adpcm, vec![0xAB]);

        let mut writer = Writer::new();
        let mut placer = TonePlacer::new(ToneFraming::ONE_SHOT);
        assert_eq!(placer.place(&mut writer, &tone).unwrap(), 0);
        assert_eq!(writer.into_inner(), b"SOSD\xABENDD");
    }
}
