#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::unescaped_backticks)]

//! Core types and codecs for the Tektronix/Sony AWG520 arbitrary waveform
//! generator: the on-disk waveform and sequence file formats, the SCPI
//! command subset the driver speaks, and the transport abstraction the
//! driver talks through.

/// Instrument constants and channel addressing.
pub mod defined;
/// Errors produced by the file codecs.
pub mod error;
/// The transport abstraction over the instrument's control and file ports.
pub mod link;
/// The SCPI command subset of the control port.
pub mod scpi;
/// The sequence (`.seq`) file codec.
pub mod seq;
/// Sleeping strategies for instrument settle times.
pub mod sleep;
/// The waveform (`.wfm`) file codec.
pub mod wfm;
