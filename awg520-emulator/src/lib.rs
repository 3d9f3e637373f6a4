//! An in-memory emulation of the AWG520's externally visible behavior: the
//! files on its mass storage, the sequencer state machine, and the SCPI
//! commands that drive them. Used by the audit link and the driver's tests in
//! place of hardware.

pub mod emulator;
pub mod error;

pub use emulator::{Awg520Emulator, MarkerLevels, IDN_REPLY};
pub use error::EmulatorError;
