use crate::header::FormatVersion;

/// How the length of each tone is determined when loading a bank.
///
/// Bank files only store where a tone starts, so its length has to be inferred.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ToneSizeStrategy {
    /// A tone extends to the start of the next tone, or to the end marker for the last one.
    #[default]
    Gap,
    /// A tone extends to the largest loop end of the voices that play it.
    LoopEnd,
}

/// Options for loading banks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadOptions {
    /// How tone lengths are determined.
    pub tone_size: ToneSizeStrategy,
    /// Whether to compare the stored checksum against the file contents.
    /// A mismatch is logged, never fatal.
    pub verify_checksum: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            tone_size: ToneSizeStrategy::Gap,
            verify_checksum: true,
        }
    }
}

impl LoadOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects [`ToneSizeStrategy::Gap`] when `guess` is set, [`ToneSizeStrategy::LoopEnd`] otherwise.
    #[must_use]
    pub fn guess_tone_size(mut self, guess: bool) -> Self {
        self.tone_size = if guess {
            ToneSizeStrategy::Gap
        } else {
            ToneSizeStrategy::LoopEnd
        };
        self
    }

    /// Enables or disables checksum verification.
    #[must_use]
    pub fn verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }
}

/// Options for saving banks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveOptions {
    /// Format version to write. `None` keeps the version of the bank being saved.
    pub version: Option<FormatVersion>,
}

impl SaveOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes the given format version instead of the bank's own.
    #[must_use]
    pub fn version(mut self, version: FormatVersion) -> Self {
        self.version = Some(version);
        self
    }
}
