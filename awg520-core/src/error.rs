use thiserror::Error;

use crate::defined::{SEQ_LINES_MAX, WFM_MEMORY_SAMPLES};

/// An error produced while encoding or decoding an instrument file.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum FormatError {
    /// The waveform has no samples.
    #[error("Waveform is empty")]
    EmptyWaveform,
    /// The waveform does not fit the per-channel memory.
    #[error("Waveform length ({0}) exceeds the instrument memory ({max} samples)", max = WFM_MEMORY_SAMPLES)]
    WaveformTooLong(usize),
    /// The sample and marker arrays differ in length.
    #[error("Sample array length ({samples}) does not match marker array length ({markers})")]
    LengthMismatch {
        /// Number of analog samples.
        samples: usize,
        /// Number of marker bits.
        markers: usize,
    },
    /// The sample clock is not a positive, finite frequency.
    #[error("Invalid sample clock: {0} Hz")]
    InvalidClock(f64),
    /// The sequence table has no entries.
    #[error("Sequence table is empty")]
    EmptyTable,
    /// The sequence table exceeds the instrument limit.
    #[error("Sequence table length ({0}) exceeds the instrument limit ({max} lines)", max = SEQ_LINES_MAX)]
    TableTooLong(usize),
    /// The waveform name cannot be written into a sequence-table line.
    #[error("Invalid waveform name: {0:?}")]
    InvalidWaveformName(String),
    /// The data did not parse as the expected file format.
    #[error("Malformed {kind} file: {reason}")]
    Malformed {
        /// Which codec rejected the data.
        kind: &'static str,
        /// What was wrong with it.
        reason: String,
    },
}

impl FormatError {
    pub(crate) fn malformed(kind: &'static str, reason: impl Into<String>) -> Self {
        FormatError::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}
