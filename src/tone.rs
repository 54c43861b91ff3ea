use crate::adpcm::{self, Decoder as AdpcmDecoder};
use std::sync::Arc;

/// Sample encoding of a tone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ToneFormat {
    /// Signed 16-bit samples, stored big-endian.
    #[default]
    Pcm16,
    /// Signed 8-bit samples.
    Pcm8,
    /// 4-bit adaptive differential PCM (see [`adpcm`](crate::adpcm)).
    Adpcm,
}

impl ToneFormat {
    /// Returns the number of bits one sample occupies.
    #[must_use]
    pub fn bits_per_sample(self) -> usize {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm8 => 8,
            Self::Adpcm => 4,
        }
    }

    /// Returns how many whole samples fit in `len` bytes.
    #[must_use]
    pub fn samples_in(self, len: usize) -> usize {
        len * 8 / self.bits_per_sample()
    }

    /// Returns how many bytes `samples` samples occupy.
    #[must_use]
    pub fn bytes_for(self, samples: usize) -> usize {
        (samples * self.bits_per_sample()).div_ceil(8)
    }
}

/// A waveform referenced by splits and one-shot programs.
///
/// The sample data lives in a shared buffer. Cloning a tone shares that buffer,
/// and a bank writes a shared buffer once no matter how many voices reference it.
/// Two tones built from separate buffers are written separately even when their contents match.
///
/// Equality compares the format and contents, not buffer identity; see [`Tone::shares_buffer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tone {
    format: ToneFormat,
    data: Arc<[u8]>,
}

impl Tone {
    /// Creates a tone from raw sample data in the given format.
    pub fn new(format: ToneFormat, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            format,
            data: data.into(),
        }
    }

    /// Encodes 16-bit samples into a new tone.
    ///
    /// 8-bit tones keep the high byte of every sample.
    #[must_use]
    pub fn from_samples(format: ToneFormat, samples: &[i16]) -> Self {
        let data = match format {
            ToneFormat::Pcm16 => samples
                .iter()
                .flat_map(|sample| sample.to_be_bytes())
                .collect::<Vec<_>>(),
            ToneFormat::Pcm8 => samples
                .iter()
                .map(|sample| sample.to_be_bytes()[0])
                .collect(),
            ToneFormat::Adpcm => adpcm::encode(samples),
        };

        Self::new(format, data)
    }

    /// Returns the sample encoding.
    #[must_use]
    pub fn format(&self) -> ToneFormat {
        self.format
    }

    /// Returns the raw sample data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the number of samples, derived from the data length.
    #[must_use]
    pub fn samples(&self) -> usize {
        self.format.samples_in(self.data.len())
    }

    /// Checks whether both tones use the same buffer.
    #[must_use]
    pub fn shares_buffer(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    pub(crate) fn buffer_id(&self) -> *const u8 {
        Arc::as_ptr(&self.data).cast::<u8>()
    }

    /// Creates a decoder positioned at the first sample.
    #[must_use]
    pub fn decoder(&self) -> ToneDecoder<'_> {
        ToneDecoder::new(self)
    }

    /// Decodes every sample of the tone.
    #[must_use]
    pub fn decode(&self) -> Vec<i16> {
        let mut samples = vec![0; self.samples()];
        let written = self.decoder().read(&mut samples);
        samples.truncate(written);
        samples
    }
}

/// Resumable sample decoder over one tone.
#[derive(Debug)]
pub struct ToneDecoder<'tone> {
    data: &'tone [u8],
    cursor: usize,
    kind: DecoderKind,
}

#[derive(Debug)]
enum DecoderKind {
    Pcm16,
    Pcm8,
    Adpcm(AdpcmDecoder),
}

impl<'tone> ToneDecoder<'tone> {
    fn new(tone: &'tone Tone) -> Self {
        Self {
            data: &tone.data,
            cursor: 0,
            kind: match tone.format {
                ToneFormat::Pcm16 => DecoderKind::Pcm16,
                ToneFormat::Pcm8 => DecoderKind::Pcm8,
                ToneFormat::Adpcm => DecoderKind::Adpcm(AdpcmDecoder::new(true)),
            },
        }
    }

    /// Enables or disables the high-pass filter of ADPCM decoding (enabled by default).
    /// Has no effect on PCM tones.
    #[must_use]
    pub fn high_pass(mut self, enabled: bool) -> Self {
        if let DecoderKind::Adpcm(decoder) = &mut self.kind {
            *decoder = AdpcmDecoder::new(enabled);
        }
        self
    }

    /// Decodes samples into `out`, continuing where the last call stopped.
    ///
    /// Returns the number of samples written, which is 0 once the tone is exhausted.
    pub fn read(&mut self, out: &mut [i16]) -> usize {
        let data = self.data;
        let remaining = &data[self.cursor.min(data.len())..];
        let mut written = 0;

        match &mut self.kind {
            DecoderKind::Pcm16 => {
                for (sample, bytes) in out.iter_mut().zip(remaining.chunks_exact(2)) {
                    *sample = i16::from_be_bytes([bytes[0], bytes[1]]);
                    written += 1;
                }
                self.cursor += written * 2;
            }
            DecoderKind::Pcm8 => {
                for (sample, &byte) in out.iter_mut().zip(remaining) {
                    *sample = i16::from_be_bytes([byte, 0]);
                    written += 1;
                }
                self.cursor += written;
            }
            DecoderKind::Adpcm(decoder) => written = decoder.decode(data, &mut self.cursor, out),
        }

        written
    }
}
