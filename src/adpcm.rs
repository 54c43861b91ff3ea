//! 4-bit adaptive differential PCM as understood by the sound processor.
//!
//! Every sample is stored as a 4-bit code: bit 3 is the sign and bits 0-2 the magnitude of the
//! difference from the previous sample, measured in units of an adaptive step size.
//! Two codes share a byte, low nibble first.
//!
//! The predictor state belongs to exactly one contiguous stream. Decoding a tone with state
//! left over from another tone corrupts the output, so every tone starts from a fresh
//! [`Decoder`] (or one that has been [`reset`](Decoder::reset)).

/// Step size multipliers (in 1/256 units), indexed by code magnitude.
const STEP_TABLE: [i32; 8] = [230, 230, 230, 230, 307, 409, 512, 614];

/// Smallest step size the predictor can reach.
pub const MIN_STEP_SIZE: i16 = 127;

/// Largest step size the predictor can reach.
pub const MAX_STEP_SIZE: i16 = 24576;

const SIGN_BIT: u8 = 0b1000;
const MAGNITUDE_MASK: u8 = 0b0111;

// Shift applied to the current byte before taking its low nibble.
// Starting at 4 reads the low nibble first, which is the order the encoder writes codes in.
const FIRST_NIBBLE_SHIFT: u8 = 4;

/// Predictor state of a single stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct State {
    history: i16,
    step_size: i16,
}

impl Default for State {
    fn default() -> Self {
        Self {
            history: 0,
            step_size: MIN_STEP_SIZE,
        }
    }
}

impl State {
    /// Creates the state every stream starts from.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the last reconstructed sample.
    #[must_use]
    pub fn history(&self) -> i16 {
        self.history
    }

    /// Returns the current quantization step size.
    #[must_use]
    pub fn step_size(&self) -> i16 {
        self.step_size
    }

    /// Applies one 4-bit code and returns the reconstructed sample.
    /// Bits above the code are ignored.
    pub fn step(&mut self, code: u8) -> i16 {
        let magnitude = code & MAGNITUDE_MASK;
        let step_size = i32::from(self.step_size);

        let diff = (((1 + (i32::from(magnitude) << 1)) * step_size) >> 3).clamp(0, 32767);
        let history = i32::from(self.history);
        let sample = if code & SIGN_BIT == 0 {
            history + diff
        } else {
            history - diff
        };

        let next_step = (STEP_TABLE[usize::from(magnitude)] * step_size) >> 8;

        self.history = saturate_i16(sample);
        self.step_size = saturate_i16(
            next_step.clamp(i32::from(MIN_STEP_SIZE), i32::from(MAX_STEP_SIZE)),
        );
        self.history
    }

    // One-pole leak toward zero that keeps decoded tones free of DC drift.
    fn leak(&mut self) {
        self.history = saturate_i16(i32::from(self.history) * 254 / 256);
    }
}

fn saturate_i16(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

/// Streaming encoder producing packed 4-bit codes.
#[derive(Clone, Debug, Default)]
pub struct Encoder {
    state: State,
    pending: Option<u8>,
}

impl Encoder {
    /// Creates an encoder for a new stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the predictor state, which mirrors what a decoder without high-pass filtering reconstructs.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Encodes one sample. A byte is returned once both of its nibbles are known.
    pub fn push(&mut self, sample: i16) -> Option<u8> {
        // the 3 lowest bits are dropped to keep noise out of the prediction
        let delta = i32::from(sample & !7) - i32::from(self.state.history);
        let magnitude = (delta.abs() * 4 / i32::from(self.state.step_size)).min(7);

        let mut code = u8::try_from(magnitude).unwrap_or(MAGNITUDE_MASK);
        if delta < 0 {
            code |= SIGN_BIT;
        }

        let _ = self.state.step(code);

        match self.pending.take() {
            Some(low) => Some(low | (code << 4)),
            None => {
                self.pending = Some(code);
                None
            }
        }
    }

    /// Flushes a trailing code that has no partner nibble.
    #[must_use]
    pub fn finish(self) -> Option<u8> {
        self.pending
    }
}

/// Streaming decoder for packed 4-bit codes.
#[derive(Clone, Debug)]
pub struct Decoder {
    state: State,
    shift: u8,
    high_pass: bool,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Decoder {
    /// Creates a decoder for a new stream.
    ///
    /// With `high_pass` enabled, the history leaks by 254/256 before every sample,
    /// which is how the hardware keeps DC offset from building up.
    #[must_use]
    pub fn new(high_pass: bool) -> Self {
        Self {
            state: State::new(),
            shift: FIRST_NIBBLE_SHIFT,
            high_pass,
        }
    }

    /// Returns the predictor state.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// Returns the decoder to the state of a fresh stream.
    pub fn reset(&mut self) {
        self.state = State::new();
        self.shift = FIRST_NIBBLE_SHIFT;
    }

    /// Decodes codes from `data` starting at byte `*cursor` until `out` is full or the data runs out.
    ///
    /// `cursor` is advanced past every byte whose two nibbles have been consumed.
    /// Returns the number of samples written.
    pub fn decode(&mut self, data: &[u8], cursor: &mut usize, out: &mut [i16]) -> usize {
        let mut written = 0;

        for sample in out.iter_mut() {
            let Some(&byte) = data.get(*cursor) else {
                break;
            };

            let code = (byte >> (FIRST_NIBBLE_SHIFT - self.shift)) & 0x0F;
            if self.shift == 0 {
                *cursor += 1;
            }
            self.shift ^= FIRST_NIBBLE_SHIFT;

            if self.high_pass {
                self.state.leak();
            }
            *sample = self.state.step(code);
            written += 1;
        }

        written
    }
}

/// Encodes 16-bit samples. An odd number of samples leaves the last byte's high nibble at zero.
#[must_use]
pub fn encode(samples: &[i16]) -> Vec<u8> {
    let mut encoder = Encoder::new();
    let mut data = Vec::with_capacity(samples.len().div_ceil(2));

    data.extend(samples.iter().filter_map(|&sample| encoder.push(sample)));
    data.extend(encoder.finish());
    data
}

/// Decodes up to `len` samples from the start of `data` with a fresh predictor.
#[must_use]
pub fn decode(data: &[u8], len: usize, high_pass: bool) -> Vec<i16> {
    let mut samples = vec![0; len.min(data.len() * 2)];
    let written = Decoder::new(high_pass).decode(data, &mut 0, &mut samples);
    samples.truncate(written);
    samples
}
