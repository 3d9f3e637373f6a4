use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::defined::{Marker, OutputChannel};

/// The error returned when a line does not parse as a supported command.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
#[error("Not a supported SCPI command: {line:?}")]
pub struct ParseCommandError {
    line: String,
}

/// Run mode of the instrument (`AWGC:RMOD`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Waveforms play back continuously. Power-on default.
    #[default]
    Continuous,
    /// Playback starts on a trigger event.
    Triggered,
    /// Playback runs while the gate is asserted.
    Gated,
    /// Sequence-table playback with per-line trigger and jump control.
    Enhanced,
}

impl RunMode {
    const fn mnemonic(self) -> &'static str {
        match self {
            RunMode::Continuous => "CONT",
            RunMode::Triggered => "TRIG",
            RunMode::Gated => "GAT",
            RunMode::Enhanced => "ENH",
        }
    }

    fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "CONT" => Some(RunMode::Continuous),
            "TRIG" => Some(RunMode::Triggered),
            "GAT" => Some(RunMode::Gated),
            "ENH" => Some(RunMode::Enhanced),
            _ => None,
        }
    }
}

/// Marker rail selector of a marker voltage command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoltageLevel {
    /// The low rail.
    Low,
    /// The high rail.
    High,
}

impl VoltageLevel {
    const fn mnemonic(self) -> &'static str {
        match self {
            VoltageLevel::Low => "LOW",
            VoltageLevel::High => "HIGH",
        }
    }
}

/// One command on the SCPI control connection.
///
/// [`Display`](fmt::Display) renders the exact wire form without a line
/// terminator; [`FromStr`] parses it back.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// `*IDN?`, the identity query.
    Identify,
    /// `*TRG`, a software trigger event.
    Trigger,
    /// `AWGC:RUN`, start output.
    Run,
    /// `AWGC:STOP`, stop output.
    Stop,
    /// `AWGC:RMOD <mode>`, select the run mode.
    RunMode(RunMode),
    /// `AWGC:EVEN:SOFT <line>`, a software jump to a 1-based sequence-table
    /// line.
    SoftJump(u16),
    /// `SOUR<n>:FUNC:USER "<file>"`, load a waveform or sequence file from
    /// the instrument's mass storage into a channel.
    LoadFile {
        /// Target channel.
        channel: OutputChannel,
        /// File name on the instrument.
        file: String,
    },
    /// `SOUR<n>:MARK<m>:VOLT:<LOW|HIGH> <volts>`, set a marker output rail.
    MarkerVoltage {
        /// Channel the marker belongs to.
        channel: OutputChannel,
        /// Which marker line.
        marker: Marker,
        /// Which rail.
        level: VoltageLevel,
        /// Rail voltage in volts.
        volts: f64,
    },
}

impl Command {
    /// Whether the instrument answers this command with a response line.
    #[must_use]
    pub const fn is_query(&self) -> bool {
        matches!(self, Command::Identify)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Identify => f.write_str("*IDN?"),
            Command::Trigger => f.write_str("*TRG"),
            Command::Run => f.write_str("AWGC:RUN"),
            Command::Stop => f.write_str("AWGC:STOP"),
            Command::RunMode(mode) => write!(f, "AWGC:RMOD {}", mode.mnemonic()),
            Command::SoftJump(line) => write!(f, "AWGC:EVEN:SOFT {line}"),
            Command::LoadFile { channel, file } => {
                write!(f, "SOUR{}:FUNC:USER \"{}\"", channel.index(), file)
            }
            Command::MarkerVoltage {
                channel,
                marker,
                level,
                volts,
            } => write!(
                f,
                "SOUR{}:MARK{}:VOLT:{} {}",
                channel.index(),
                marker.index(),
                level.mnemonic(),
                volts
            ),
        }
    }
}

impl FromStr for Command {
    type Err = ParseCommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']);
        let err = || ParseCommandError {
            line: line.to_owned(),
        };
        match line {
            "*IDN?" => Ok(Command::Identify),
            "*TRG" => Ok(Command::Trigger),
            "AWGC:RUN" => Ok(Command::Run),
            "AWGC:STOP" => Ok(Command::Stop),
            _ => {
                if let Some(rest) = line.strip_prefix("AWGC:RMOD ") {
                    RunMode::from_mnemonic(rest.trim())
                        .map(Command::RunMode)
                        .ok_or_else(err)
                } else if let Some(rest) = line.strip_prefix("AWGC:EVEN:SOFT ") {
                    rest.trim().parse().map(Command::SoftJump).map_err(|_| err())
                } else if let Some(rest) = line.strip_prefix("SOUR") {
                    parse_source(rest).ok_or_else(err)
                } else {
                    Err(err())
                }
            }
        }
    }
}

fn parse_source(rest: &str) -> Option<Command> {
    let (channel, rest) = rest.split_once(':')?;
    let channel = match channel {
        "1" => OutputChannel::Ch1,
        "2" => OutputChannel::Ch2,
        _ => return None,
    };
    if let Some(file) = rest.strip_prefix("FUNC:USER ") {
        let file = file.trim().strip_prefix('"')?.strip_suffix('"')?;
        (!file.is_empty()).then(|| Command::LoadFile {
            channel,
            file: file.to_owned(),
        })
    } else if let Some(rest) = rest.strip_prefix("MARK") {
        let (marker, rest) = rest.split_once(":VOLT:")?;
        let marker = match marker {
            "1" => Marker::M1,
            "2" => Marker::M2,
            _ => return None,
        };
        let (level, volts) = rest.split_once(' ')?;
        let level = match level {
            "LOW" => VoltageLevel::Low,
            "HIGH" => VoltageLevel::High,
            _ => return None,
        };
        let volts = volts.trim().parse().ok()?;
        Some(Command::MarkerVoltage {
            channel,
            marker,
            level,
            volts,
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[test]
    #[case("*IDN?", Command::Identify)]
    #[case("*TRG", Command::Trigger)]
    #[case("AWGC:RUN", Command::Run)]
    #[case("AWGC:STOP", Command::Stop)]
    #[case("AWGC:RMOD ENH", Command::RunMode(RunMode::Enhanced))]
    #[case("AWGC:RMOD CONT", Command::RunMode(RunMode::Continuous))]
    #[case("AWGC:EVEN:SOFT 2", Command::SoftJump(2))]
    #[case(
        "SOUR1:FUNC:USER \"scan.seq\"",
        Command::LoadFile {
            channel: OutputChannel::Ch1,
            file: "scan.seq".to_owned(),
        }
    )]
    #[case(
        "SOUR2:MARK1:VOLT:HIGH 2",
        Command::MarkerVoltage {
            channel: OutputChannel::Ch2,
            marker: Marker::M1,
            level: VoltageLevel::High,
            volts: 2.0,
        }
    )]
    #[case(
        "SOUR1:MARK2:VOLT:LOW 0",
        Command::MarkerVoltage {
            channel: OutputChannel::Ch1,
            marker: Marker::M2,
            level: VoltageLevel::Low,
            volts: 0.0,
        }
    )]
    fn wire_form(#[case] expected: &str, #[case] command: Command) {
        assert_eq!(expected, command.to_string());
        assert_eq!(Ok(command), expected.parse());
    }

    #[test]
    fn parse_strips_line_terminator() {
        assert_eq!(Ok(Command::Trigger), "*TRG\r\n".parse());
        assert_eq!(Ok(Command::Trigger), "*TRG\n".parse());
    }

    #[rstest::rstest]
    #[test]
    #[case("")]
    #[case("*RST")]
    #[case("AWGC:RMOD FAST")]
    #[case("AWGC:EVEN:SOFT two")]
    #[case("SOUR3:FUNC:USER \"scan.seq\"")]
    #[case("SOUR1:FUNC:USER scan.seq")]
    #[case("SOUR1:FUNC:USER \"\"")]
    #[case("SOUR1:MARK9:VOLT:LOW 0")]
    #[case("SOUR1:MARK1:VOLT:MID 1")]
    #[case("SOUR1:MARK1:VOLT:LOW x")]
    fn parse_rejects(#[case] line: &str) {
        assert_eq!(
            Err(ParseCommandError {
                line: line.to_owned()
            }),
            line.parse::<Command>()
        );
    }

    #[test]
    fn only_identify_is_a_query() {
        assert!(Command::Identify.is_query());
        assert!(!Command::Trigger.is_query());
        assert!(!Command::Run.is_query());
        assert!(!Command::SoftJump(1).is_query());
    }
}
