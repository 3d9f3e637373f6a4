use std::path::PathBuf;

use thiserror::Error;

use awg520_core::error::FormatError;
use awg520_core::link::LinkError;

use crate::file::FileWriteError;
use crate::sequence::SequenceError;

/// An error produced by the driver.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Awg520Error {
    /// Communication with the instrument failed.
    #[error("{0}")]
    Link(#[from] LinkError),
    /// A file codec rejected its input.
    #[error("{0}")]
    Format(#[from] FormatError),
    /// A timing description could not be sampled.
    #[error("{0}")]
    Sequence(#[from] SequenceError),
    /// A waveform or sequence file could not be written.
    #[error("{0}")]
    FileWrite(#[from] FileWriteError),
    /// A local file or directory could not be read.
    #[error("Failed to read {}: {source}", path.display())]
    FileRead {
        /// The unreadable path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The file name is not representable on the instrument.
    #[error("File name {} cannot be sent to the instrument", .0.display())]
    InvalidFileName(PathBuf),
    /// The connected instrument did not identify as an AWG520.
    #[error("Connected instrument does not identify as an AWG520: {0:?}")]
    UnexpectedInstrument(String),
}

impl Awg520Error {
    pub(crate) fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Awg520Error::FileRead {
            path: path.into(),
            source,
        }
    }
}
