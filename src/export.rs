use crate::tone::Tone;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    io::{Seek, Write},
};
use tracing::{debug, instrument};

// Samples decoded per pass.
const CHUNK_LEN: usize = 1024;

impl Tone {
    /// Decodes the tone and writes it to `sink` as a mono 16-bit WAV file.
    ///
    /// ADPCM tones are decoded with the high-pass filter enabled.
    ///
    /// # Errors
    ///
    /// Fails if writing to `sink` fails.
    #[instrument(level = "trace", skip(self, sink))]
    pub fn write_wav<W: Write + Seek>(&self, sink: W, sample_rate: u32) -> Result<(), ExportError> {
        let mut writer = WavWriter::new(
            sink,
            WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )
        .map_err(ExportError::from_hound(ExportErrorKind::CreateWriter))?;

        let mut decoder = self.decoder();
        let mut chunk = [0; CHUNK_LEN];
        let mut total = 0;

        loop {
            let len = decoder.read(&mut chunk);
            if len == 0 {
                break;
            }

            for &sample in &chunk[..len] {
                writer
                    .write_sample(sample)
                    .map_err(ExportError::from_hound(ExportErrorKind::WriteSample))?;
            }
            total += len;
        }

        writer
            .finalize()
            .map_err(ExportError::from_hound(ExportErrorKind::Finalize))?;

        debug!(samples = total, "exported tone");
        Ok(())
    }
}

/// Error when exporting a tone as a WAV file.
#[derive(Debug)]
pub struct ExportError {
    kind: ExportErrorKind,
    source: hound::Error,
}

#[derive(Clone, Copy, Debug)]
enum ExportErrorKind {
    CreateWriter,
    WriteSample,
    Finalize,
}

impl ExportError {
    fn from_hound(kind: ExportErrorKind) -> impl FnOnce(hound::Error) -> Self {
        move |source| Self { kind, source }
    }
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self.kind {
            ExportErrorKind::CreateWriter => "failed to write WAV header",
            ExportErrorKind::WriteSample => "failed to write WAV samples",
            ExportErrorKind::Finalize => "failed to finalize WAV file",
        })
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}
