//! Transports to the instrument: [`TcpLink`] for the real hardware, and a
//! test link wrapping the emulator behind the `link-audit` feature.

mod tcp;

pub use tcp::{TcpLink, TcpLinkOption};

#[cfg(feature = "link-audit")]
mod audit;

#[cfg(feature = "link-audit")]
pub use audit::{Audit, AuditOption};
