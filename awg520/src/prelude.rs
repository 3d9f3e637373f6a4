//! Re-exports of the items most programs need.

pub use awg520_core::defined::{Marker, OutputChannel};
pub use awg520_core::link::{Link, LinkError};
pub use awg520_core::scpi::{Command, RunMode};
pub use awg520_core::seq::{JumpMode, Repeat, SeqEntry, SequenceFile};
pub use awg520_core::sleep::{Sleep, SpinSleeper, StdSleeper};
pub use awg520_core::wfm::Waveform;

pub use crate::controller::{Awg520, Awg520Option, SettleTimes};
pub use crate::error::Awg520Error;
pub use crate::file::{AwgFile, FileWriteError};
pub use crate::link::{TcpLink, TcpLinkOption};
pub use crate::odmr::{write_trigger_sequence, TriggerConfig, TriggerFiles};
pub use crate::sequence::{ChannelId, Sequence, SequenceError, TimeSpec};
