#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::unescaped_backticks)]

//! Driver for the Tektronix/Sony AWG520 arbitrary waveform generator.
//!
//! The crate turns symbolic timing descriptions into the instrument's
//! waveform and sequence files, writes them to disk, uploads them over the
//! instrument's FTP port, and drives sequence playback over its SCPI port.
//! The shipped [`odmr`] module builds the trigger pattern of an
//! optically-detected-magnetic-resonance scan on top of those pieces.

/// The instrument handle.
pub mod controller;
/// The crate-level error type.
pub mod error;
/// The waveform/sequence file writer.
pub mod file;
/// Transports to the instrument.
pub mod link;
/// The ODMR trigger-sequence construction.
pub mod odmr;
/// Commonly used items.
pub mod prelude;
/// Symbolic timing descriptions and their sampling.
pub mod sequence;

pub use controller::{Awg520, Awg520Option, SettleTimes};
pub use error::Awg520Error;
