//! Writes waveform and sequence files into a destination directory. Every
//! write goes to a temporary file first and is renamed into place, so a
//! failed write never leaves a half-written file the instrument could load.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use thiserror::Error;

use awg520_core::defined::OutputChannel;
use awg520_core::error::FormatError;
use awg520_core::seq::SequenceFile;
use awg520_core::wfm::Waveform;

/// An error produced while writing an instrument file.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FileWriteError {
    /// The destination could not be created or written.
    #[error("Failed to write {}: {source}", path.display())]
    Io {
        /// The destination path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// The data to write failed codec validation.
    #[error("{0}")]
    Format(#[from] FormatError),
}

/// Writes the files of one experiment run into a directory, all at one
/// sample clock.
#[derive(Debug, Clone)]
pub struct AwgFile {
    dir: PathBuf,
    clock_hz: f64,
}

impl AwgFile {
    /// A writer for `dir` at the given sample clock.
    pub fn new(dir: impl Into<PathBuf>, clock_hz: f64) -> Result<Self, FormatError> {
        if !clock_hz.is_finite() || clock_hz <= 0.0 {
            return Err(FormatError::InvalidClock(clock_hz));
        }
        Ok(Self {
            dir: dir.into(),
            clock_hz,
        })
    }

    /// The file name of a bank's waveform on one channel, e.g. `trig_1.wfm`.
    #[must_use]
    pub fn waveform_name(bank: &str, channel: OutputChannel) -> String {
        format!("{bank}_{}.wfm", channel.index())
    }

    /// The destination directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes one channel of a bank as `{bank}_{channel}.wfm`, returning the
    /// written path.
    pub fn write_waveform(
        &self,
        bank: &str,
        channel: OutputChannel,
        waveform: &Waveform,
    ) -> Result<PathBuf, FileWriteError> {
        let contents = waveform.encode(self.clock_hz)?;
        self.write_atomic(&Self::waveform_name(bank, channel), &contents)
    }

    /// Writes a sequence table under `name`, returning the written path.
    pub fn write_sequence(
        &self,
        name: &str,
        table: &SequenceFile,
    ) -> Result<PathBuf, FileWriteError> {
        self.write_atomic(name, &table.encode())
    }

    fn write_atomic(&self, name: &str, contents: &[u8]) -> Result<PathBuf, FileWriteError> {
        let path = self.dir.join(name);
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|source| FileWriteError::Io {
            path: path.clone(),
            source,
        })?;
        tmp.write_all(contents).map_err(|source| FileWriteError::Io {
            path: path.clone(),
            source,
        })?;
        tmp.persist(&path).map_err(|e| FileWriteError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        tracing::debug!(path = %path.display(), bytes = contents.len(), "Wrote instrument file");
        Ok(path)
    }
}
