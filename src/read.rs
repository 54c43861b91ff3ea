use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Error as IoError, ErrorKind, Read, Seek, SeekFrom},
    num::NonZeroUsize,
};

/// Positioned reader over a seekable bank file.
/// Offsets stored in bank files are absolute, so the reader is expected to start at offset 0.
pub(crate) struct Reader<R: Read + Seek> {
    inner: R,
    position: usize,
}

impl<R: Read + Seek> Reader<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            inner: reader,
            position: 0,
        }
    }

    fn read_to_slice(&mut self, buf: &mut [u8]) -> ReadResult<()> {
        let mut filled = 0;

        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => {
                    filled += n;
                    self.position += n;
                }
                Err(e) => match e.kind() {
                    // this I/O error is non-fatal, so reading is retried
                    ErrorKind::Interrupted => {}
                    ErrorKind::UnexpectedEof => {
                        return Err(self.to_error(ReadErrorKind::Incomplete(Needed::Unknown)))
                    }
                    _ => return Err(self.to_error_with_source(ReadErrorKind::Failure, e)),
                },
            }
        }

        match NonZeroUsize::new(buf.len() - filled) {
            None => Ok(()),
            Some(missing) => Err(self.to_error(ReadErrorKind::Incomplete(Needed::Size(missing)))),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.position
    }

    pub(crate) fn seek_to(&mut self, position: usize) -> ReadResult<()> {
        match self.inner.seek(SeekFrom::Start(position as u64)) {
            Ok(_) => {
                self.position = position;
                Ok(())
            }
            Err(e) => Err(self.to_error_with_source(ReadErrorKind::Failure, e)),
        }
    }

    /// Returns the total length of the underlying stream without moving the read position.
    pub(crate) fn stream_len(&mut self) -> ReadResult<usize> {
        let end = self
            .inner
            .seek(SeekFrom::End(0))
            .map_err(|e| self.to_error_with_source(ReadErrorKind::Failure, e))?;

        self.seek_to(self.position)?;

        Ok(usize::try_from(end).unwrap_or(usize::MAX))
    }

    pub(crate) fn take_const<const LEN: usize>(&mut self) -> ReadResult<[u8; LEN]> {
        let mut buf = [0; LEN];
        self.read_to_slice(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn take(&mut self, len: usize) -> ReadResult<Vec<u8>> {
        let mut buf = vec![0; len];
        self.read_to_slice(&mut buf)?;
        Ok(buf)
    }

    pub(crate) fn u8(&mut self) -> ReadResult<u8> {
        let [byte] = self.take_const()?;
        Ok(byte)
    }

    pub(crate) fn le_u16(&mut self) -> ReadResult<u16> {
        self.take_const().map(u16::from_le_bytes)
    }

    pub(crate) fn le_u32(&mut self) -> ReadResult<u32> {
        self.take_const().map(u32::from_le_bytes)
    }
}

pub(crate) type ReadResult<T> = Result<T, ReadError>;

#[derive(Debug)]
pub(crate) struct ReadError {
    position: usize,
    kind: ReadErrorKind,
    source: Option<IoError>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ReadErrorKind {
    Failure,
    Incomplete(Needed),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Needed {
    Size(NonZeroUsize),
    Unknown,
}

impl<R: Read + Seek> Reader<R> {
    fn to_error(&self, kind: ReadErrorKind) -> ReadError {
        ReadError {
            position: self.position,
            kind,
            source: None,
        }
    }

    fn to_error_with_source(&self, kind: ReadErrorKind, source: IoError) -> ReadError {
        ReadError {
            position: self.position,
            kind,
            source: Some(source),
        }
    }
}

impl ReadError {
    /// The stream ended before a fixed-size record was complete.
    pub(crate) fn is_incomplete(&self) -> bool {
        matches!(self.kind, ReadErrorKind::Incomplete(_))
    }
}

#[cfg(test)]
impl ReadError {
    fn is_kind(&self, kind: ReadErrorKind) -> bool {
        self.kind == kind
    }
}

impl Display for ReadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.kind {
            ReadErrorKind::Failure => f.write_str("failed to read data due to I/O error"),
            ReadErrorKind::Incomplete(needed) => match needed {
                Needed::Size(size) => {
                    f.write_str(&format!("incomplete data: needed {size} more bytes to read"))
                }
                Needed::Unknown => f.write_str("incomplete data"),
            },
        }?;

        f.write_str(&format!(" - byte position {}", self.position))
    }
}

impl Error for ReadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.source {
            Some(e) => Some(e),
            None => None,
        }
    }
}
