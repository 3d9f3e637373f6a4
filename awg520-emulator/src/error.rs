use thiserror::Error;

use awg520_core::error::FormatError;
use awg520_core::scpi::ParseCommandError;

/// An error produced when the emulated instrument rejects a command.
#[derive(Error, Debug, PartialEq, Clone)]
#[non_exhaustive]
pub enum EmulatorError {
    /// The line did not parse as a supported command.
    #[error("{0}")]
    Parse(#[from] ParseCommandError),
    /// The named file is not on the instrument's mass storage.
    #[error("No file named {0:?} on mass storage")]
    FileNotFound(String),
    /// A stored file did not parse as its format.
    #[error("{0}")]
    Format(#[from] FormatError),
    /// A sequence references a waveform file that is not on mass storage.
    #[error("Waveform {0:?} referenced by the sequence is not on mass storage")]
    MissingWaveform(String),
    /// The two waveforms of a sequence line differ in length.
    #[error("Waveforms {0:?} and {1:?} of a sequence line differ in length")]
    WaveformLengthMismatch(String, String),
    /// The file extension names no loadable format.
    #[error("Unsupported file type: {0:?}")]
    UnsupportedFile(String),
    /// The command requires a loaded sequence.
    #[error("No sequence is loaded")]
    NoSequenceLoaded,
    /// The command requires enhanced run mode.
    #[error("Not in enhanced run mode")]
    NotEnhancedMode,
    /// The command requires the instrument to be running.
    #[error("The instrument is not running")]
    NotRunning,
    /// Software jumps require the loaded sequence to declare software jump
    /// mode.
    #[error("Jump mode of the loaded sequence is not SOFTWARE")]
    JumpModeNotSoftware,
    /// The jump target is outside the sequence table.
    #[error("Jump target {target} is outside the sequence table (1..={lines})")]
    JumpOutOfRange {
        /// Requested 1-based line.
        target: u16,
        /// Number of lines in the loaded table.
        lines: usize,
    },
}
