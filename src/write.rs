/// Growable output buffer for bank files.
///
/// Table offsets are only known once the content they point at has been written,
/// so tables are emitted with placeholders that get patched afterwards.
/// The whole file is staged in memory; nothing reaches the caller's sink until every pass succeeded.
#[derive(Debug, Default)]
pub(crate) struct Writer {
    buf: Vec<u8>,
}

/// Position of a 32-bit field that still has to be filled in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Placeholder(usize);

impl Writer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn position(&self) -> usize {
        self.buf.len()
    }

    /// Current position as a file offset.
    pub(crate) fn offset(&self) -> u32 {
        u32::try_from(self.position()).unwrap_or(u32::MAX)
    }

    pub(crate) fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub(crate) fn le_u16(&mut self, value: u16) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn le_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub(crate) fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub(crate) fn placeholder(&mut self) -> Placeholder {
        let placeholder = Placeholder(self.position());
        self.le_u32(0);
        placeholder
    }

    pub(crate) fn patch(&mut self, placeholder: Placeholder, value: u32) {
        self.patch_bytes(placeholder.0, &value.to_le_bytes());
    }

    /// Points a placeholder at the current position.
    pub(crate) fn patch_here(&mut self, placeholder: Placeholder) {
        self.patch(placeholder, self.offset());
    }

    pub(crate) fn patch_bytes(&mut self, position: usize, data: &[u8]) {
        self.buf[position..position + data.len()].copy_from_slice(data);
    }

    pub(crate) fn byte_at(&self, position: usize) -> u8 {
        self.buf[position]
    }

    pub(crate) fn pad_to(&mut self, alignment: usize) {
        let len = self.buf.len().next_multiple_of(alignment);
        self.buf.resize(len, 0);
    }

    /// Wrapping sum of every byte from `start` to the end of the buffer.
    pub(crate) fn byte_sum(&self, start: usize) -> u32 {
        byte_sum(&self.buf[start..])
    }

    pub(crate) fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

pub(crate) fn byte_sum(data: &[u8]) -> u32 {
    data.iter()
        .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}
