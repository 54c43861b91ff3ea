use crate::{
    error::{DecodeError, DecodeErrorKind},
    read::{ReadResult, Reader},
    write::{byte_sum, Placeholder, Writer},
};
use phf::phf_map;
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Read, Seek},
};
use tap::Pipe;
use tracing::{debug, warn};

/// Format version stored in a bank header.
///
/// Versions 1 and 2 are the common ones; [`FormatVersion::VENDOR`] shows up in banks
/// produced by the vendor's own tools and is laid out like version 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FormatVersion(pub u32);

impl FormatVersion {
    /// Version 1: no checksum, offset binary pan positions, 32-bit one-shot loop times.
    pub const V1: Self = Self(1);
    /// Version 2.
    pub const V2: Self = Self(2);
    /// Vendor tool version.
    pub const VENDOR: Self = Self(0x5001);

    /// Checks whether files of this version carry a checksum.
    #[must_use]
    pub fn has_checksum(self) -> bool {
        self.0 >= 2
    }

    /// Checks whether this version has been seen in real banks.
    #[must_use]
    pub fn is_known(self) -> bool {
        matches!(self, Self::V1 | Self::V2 | Self::VENDOR)
    }

    pub(crate) fn has_offset_pan(self) -> bool {
        self.0 <= 1
    }

    pub(crate) fn has_wide_loop_time(self) -> bool {
        self.0 <= 1
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::V2
    }
}

impl From<u32> for FormatVersion {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for FormatVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&format!("0x{:x}", self.0))
    }
}

/// Type of bank, identified by the file signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BankKind {
    /// Melodic instrument bank (`SMPB`).
    Melodic,
    /// Drum kit bank (`SMDB`).
    Drum,
    /// One-shot sound bank (`SOSB`).
    OneShot,
}

impl BankKind {
    /// Returns the file signature.
    #[must_use]
    pub fn magic(self) -> [u8; 4] {
        match self {
            Self::Melodic => *b"SMPB",
            Self::Drum => *b"SMDB",
            Self::OneShot => *b"SOSB",
        }
    }
}

// keyed by the signature read as a little-endian word
static BANK_KINDS: phf::Map<u32, BankKind> = phf_map! {
    0x4250_4D53u32 => BankKind::Melodic,
    0x4244_4D53u32 => BankKind::Drum,
    0x4253_4F53u32 => BankKind::OneShot,
};

/// Marker following the last tone of a bank.
pub(crate) const END_MARKER: [u8; 4] = *b"ENDB";

/// Files are zero-padded to a multiple of this size.
pub(crate) const FILE_ALIGNMENT: usize = 32;

const CHECKSUM_START: usize = 4;
const CHECKSUM_OFFSET: usize = 0x0C;

// The end marker plus the largest possible padding.
const TAIL_SEARCH_LEN: usize = END_MARKER.len() + FILE_ALIGNMENT;

/// Fields shared by the headers of all bank types.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) kind: BankKind,
    pub(crate) version: FormatVersion,
    pub(crate) file_size: u32,
    pub(crate) checksum: u32,
}

impl Header {
    pub(crate) fn parse<R: Read + Seek>(reader: &mut Reader<R>) -> Result<Self, DecodeError> {
        let kind = reader
            .le_u32()
            .map_err(DecodeError::factory(DecodeErrorKind::InvalidMagic))?
            .pipe(kind_from_magic)?;

        let version = reader
            .le_u32()
            .map(FormatVersion)
            .map_err(DecodeError::factory(DecodeErrorKind::Version))?;

        if !version.is_known() {
            warn!(%version, "format version was not recognized");
        }

        let file_size = reader
            .le_u32()
            .map_err(DecodeError::factory(DecodeErrorKind::FileSize))?;

        let checksum = reader
            .le_u32()
            .map_err(DecodeError::factory(DecodeErrorKind::Checksum))?;

        debug!(?kind, %version, file_size, "parsed bank header");

        Ok(Self {
            kind,
            version,
            file_size,
            checksum,
        })
    }

    /// Compares the stored file size against the length of the stream. A mismatch is logged.
    pub(crate) fn check_file_size<R: Read + Seek>(&self, reader: &mut Reader<R>) -> ReadResult<()> {
        let len = reader.stream_len()?;
        if usize::try_from(self.file_size) != Ok(len) {
            warn!(stored = self.file_size, len, "file size did not match the stream length");
        }
        Ok(())
    }

    /// Writes the common fields, leaving the file size and checksum to [`Header::finish`].
    pub(crate) fn write(writer: &mut Writer, kind: BankKind, version: FormatVersion) -> HeaderSlots {
        writer.bytes(&kind.magic());
        writer.le_u32(version.0);

        HeaderSlots {
            version,
            file_size: writer.placeholder(),
            checksum: writer.placeholder(),
        }
    }

    /// Terminates the file: end marker, padding, file size and (for versions that have one) checksum.
    pub(crate) fn finish(writer: &mut Writer, slots: HeaderSlots) {
        writer.bytes(&END_MARKER);
        writer.pad_to(FILE_ALIGNMENT);
        writer.patch(slots.file_size, writer.offset());

        // the checksum field is still zero here, so it does not count towards the sum
        if slots.version.has_checksum() {
            let checksum = writer.byte_sum(CHECKSUM_START);
            writer.patch(slots.checksum, checksum);
        }
    }
}

fn kind_from_magic(magic: u32) -> Result<BankKind, DecodeError> {
    BANK_KINDS
        .get(&magic)
        .copied()
        .ok_or_else(|| DecodeError::new(DecodeErrorKind::InvalidMagic))
}

/// Header fields patched once the rest of the file has been written.
#[derive(Debug)]
pub(crate) struct HeaderSlots {
    version: FormatVersion,
    file_size: Placeholder,
    checksum: Placeholder,
}

/// Computes the checksum of a whole file the way [`Header::finish`] does,
/// ignoring the value currently stored in the checksum field.
pub(crate) fn compute_checksum<R: Read + Seek>(reader: &mut Reader<R>) -> ReadResult<u32> {
    let len = reader.stream_len()?;
    reader.seek_to(0)?;
    let data = reader.take(len)?;

    let stored = data
        .get(CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4)
        .map_or(0, byte_sum);

    Ok(data
        .get(CHECKSUM_START..)
        .map_or(0, byte_sum)
        .wrapping_sub(stored))
}

/// Finds the end of the tone data: the position of the end marker, or the end of the stream
/// when the file has none.
pub(crate) fn locate_end_marker<R: Read + Seek>(reader: &mut Reader<R>) -> ReadResult<usize> {
    let len = reader.stream_len()?;
    let tail_start = len.saturating_sub(TAIL_SEARCH_LEN);
    reader.seek_to(tail_start)?;
    let tail = reader.take(len - tail_start)?;

    let content_len = tail
        .iter()
        .rposition(|&byte| byte != 0)
        .map_or(0, |last| last + 1);

    if tail[..content_len].ends_with(&END_MARKER) {
        Ok(tail_start + content_len - END_MARKER.len())
    } else {
        debug!("no end marker found, tone data extends to the end of the file");
        Ok(len)
    }
}

#[cfg(test)]
mod test {
    use super::{
        compute_checksum, locate_end_marker, BankKind, FormatVersion, Header,
    };
    use crate::{error::DecodeErrorKind, read::Reader, write::Writer};
    use std::io::Cursor;

    #[test]
    fn parse_header() {
        let data = b"SMDB\x02\x00\x00\x00\x40\x00\x00\x00\x78\x56\x34\x12";
        let mut reader = Reader::new(Cursor::new(data.as_slice()));
        let header = Header::parse(&mut reader).unwrap();

        assert_eq!(header.kind, BankKind::Drum);
        assert_eq!(header.version, FormatVersion::V2);
        assert_eq!(header.file_size, 0x40);
        assert_eq!(header.checksum, 0x1234_5678);
        assert_eq!(reader.position(), 0x10);
    }

    #[test]
    fn recognize_bank_kinds() {
        for kind in [BankKind::Melodic, BankKind::Drum, BankKind::OneShot] {
            let mut data = kind.magic().to_vec();
            data.extend_from_slice(&[0; 12]);
            let mut reader = Reader::new(Cursor::new(data));
            assert_eq!(Header::parse(&mut reader).unwrap().kind, kind);
        }
    }

    #[test]
    fn reject_unknown_magic() {
        let data = b"RIFF\x02\x00\x00\x00\x40\x00\x00\x00\x00\x00\x00\x00";
        let mut reader = Reader::new(Cursor::new(data.as_slice()));
        assert!(Header::parse(&mut reader)
            .is_err_and(|e| e.kind() == DecodeErrorKind::InvalidMagic && !e.is_truncated()));

        let mut reader = Reader::new(Cursor::new(b"SM".as_slice()));
        assert!(Header::parse(&mut reader)
            .is_err_and(|e| e.kind() == DecodeErrorKind::InvalidMagic && e.is_truncated()));
    }

    #[test]
    fn truncated_header() {
        let data = b"SMPB\x01\x00\x00\x00\x40\x00";
        let mut reader = Reader::new(Cursor::new(data.as_slice()));
        assert!(Header::parse(&mut reader)
            .is_err_and(|e| e.kind() == DecodeErrorKind::FileSize && e.is_truncated()));
    }

    #[test]
    fn unknown_versions_are_accepted() {
        let data = b"SMPB\x07\x00\x00\x00\x40\x00\x00\x00\x00\x00\x00\x00";
        let mut reader = Reader::new(Cursor::new(data.as_slice()));
        let header = Header::parse(&mut reader).unwrap();

        assert_eq!(header.version, FormatVersion(7));
        assert!(!header.version.is_known());
        assert!(header.version.has_checksum());
    }

    #[test]
    fn finish_with_checksum() {
        let mut writer = Writer::new();
        let slots = Header::write(&mut writer, BankKind::Melodic, FormatVersion::V2);
        writer.bytes(&[1, 2, 3]);
        Header::finish(&mut writer, slots);

        let data = writer.into_inner();
        assert_eq!(data.len(), 32);
        assert_eq!(&data[..8], b"SMPB\x02\x00\x00\x00");
        assert_eq!(&data[0x08..0x0C], [32, 0, 0, 0]);
        assert_eq!(&data[0x10..0x17], b"\x01\x02\x03ENDB");
        assert!(data[0x17..].iter().all(|&byte| byte == 0));

        // version, file size, payload and marker
        let marker: u32 = b"ENDB".iter().map(|&byte| u32::from(byte)).sum();
        let expected = 2 + 32 + 6 + marker;
        let checksum = u32::from_le_bytes(data[0x0C..0x10].try_into().unwrap());
        assert_eq!(checksum, expected);

        let mut reader = Reader::new(Cursor::new(data));
        assert_eq!(compute_checksum(&mut reader).unwrap(), expected);
    }

    #[test]
    fn finish_without_checksum() {
        let mut writer = Writer::new();
        let slots = Header::write(&mut writer, BankKind::OneShot, FormatVersion::V1);
        writer.bytes(&[0xFF; 40]);
        Header::finish(&mut writer, slots);

        let data = writer.into_inner();
        assert_eq!(data.len(), 64);
        assert_eq!(&data[0x0C..0x10], [0; 4]);
    }

    #[test]
    fn find_end_marker() {
        let mut data = vec![0xAA; 50];
        data.extend_from_slice(b"ENDB");
        data.resize(64, 0);
        let mut reader = Reader::new(Cursor::new(data));
        assert_eq!(locate_end_marker(&mut reader).unwrap(), 50);

        // tone data ending in zeros does not confuse the search
        let mut data = vec![0; 40];
        data.extend_from_slice(b"ENDB");
        let mut reader = Reader::new(Cursor::new(data));
        assert_eq!(locate_end_marker(&mut reader).unwrap(), 40);

        let mut reader = Reader::new(Cursor::new(vec![0x11; 20]));
        assert_eq!(locate_end_marker(&mut reader).unwrap(), 20);

        let mut reader = Reader::new(Cursor::new(Vec::new()));
        assert_eq!(locate_end_marker(&mut reader).unwrap(), 0);
    }
}
