//! The sequence (`.seq`) file format: CRLF-terminated ASCII lines behind a
//! `MAGIC 3002` header. A `LINES {n}` declaration is followed by one table
//! line per entry and a closing `JUMP_MODE` directive. Entry order is
//! playback order.

use std::num::NonZeroU32;

use derive_new::new;
use getset::{CopyGetters, Getters};

use crate::defined::SEQ_LINES_MAX;
use crate::error::FormatError;

const MAGIC: &str = "MAGIC 3002";

/// Repeat behavior of one sequence-table entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Repeat {
    /// The entry repeats until the instrument is explicitly moved off it.
    Infinite,
    /// The entry plays the given number of times, then falls through to the
    /// next line.
    Finite(NonZeroU32),
}

impl Repeat {
    /// Play the entry exactly once.
    pub const ONCE: Repeat = Repeat::Finite(NonZeroU32::MIN);

    /// A finite repeat count, or `None` if `count` is zero.
    #[must_use]
    pub const fn finite(count: u32) -> Option<Self> {
        match NonZeroU32::new(count) {
            Some(count) => Some(Repeat::Finite(count)),
            None => None,
        }
    }

    /// The on-disk repeat-count field. Zero encodes an infinite repeat.
    #[must_use]
    pub const fn wire(self) -> u32 {
        match self {
            Repeat::Infinite => 0,
            Repeat::Finite(count) => count.get(),
        }
    }

    /// Inverse of [`wire`](Repeat::wire).
    #[must_use]
    pub const fn from_wire(raw: u32) -> Self {
        match NonZeroU32::new(raw) {
            Some(count) => Repeat::Finite(count),
            None => Repeat::Infinite,
        }
    }
}

/// The jump directive closing a sequence table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JumpMode {
    /// Jumps come from `AWGC:EVEN:SOFT` commands on the control connection.
    Software,
    /// Jumps follow the per-line jump targets of the table.
    Table,
    /// Jumps follow the rear-panel logic inputs.
    Logic,
}

impl JumpMode {
    const fn mnemonic(self) -> &'static str {
        match self {
            JumpMode::Software => "SOFTWARE",
            JumpMode::Table => "TABLE",
            JumpMode::Logic => "LOGIC",
        }
    }

    fn from_mnemonic(s: &str) -> Option<Self> {
        match s {
            "SOFTWARE" => Some(JumpMode::Software),
            "TABLE" => Some(JumpMode::Table),
            "LOGIC" => Some(JumpMode::Logic),
            _ => None,
        }
    }
}

/// One sequence-table line: a waveform file per channel, the repeat count,
/// and the trigger/jump-enable flag. The two trailing fields of the on-disk
/// line are reserved and always zero.
#[derive(new, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SeqEntry {
    /// Waveform file played on channel 1.
    pub ch1_waveform: String,
    /// Waveform file played on channel 2.
    pub ch2_waveform: String,
    /// How often the entry repeats.
    pub repeat: Repeat,
    /// Whether the entry responds to trigger and jump events.
    pub jump_enabled: bool,
}

/// A validated sequence table plus its jump mode.
///
/// Validation happens at construction, so [`encode`](SequenceFile::encode)
/// cannot fail.
#[derive(Clone, Debug, PartialEq, Eq, Getters, CopyGetters)]
pub struct SequenceFile {
    /// Table entries in playback order.
    #[getset(get = "pub")]
    entries: Vec<SeqEntry>,
    /// Jump mode directive.
    #[getset(get_copy = "pub")]
    jump_mode: JumpMode,
}

impl SequenceFile {
    /// A sequence file from `entries`, checking the table length and the
    /// waveform names.
    pub fn new(entries: Vec<SeqEntry>, jump_mode: JumpMode) -> Result<Self, FormatError> {
        if entries.is_empty() {
            return Err(FormatError::EmptyTable);
        }
        if entries.len() > SEQ_LINES_MAX {
            return Err(FormatError::TableTooLong(entries.len()));
        }
        entries.iter().try_for_each(|entry| {
            validate_name(&entry.ch1_waveform)?;
            validate_name(&entry.ch2_waveform)
        })?;
        Ok(Self { entries, jump_mode })
    }

    /// Serializes the table into the on-disk format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = format!("{MAGIC}\r\nLINES {}\r\n", self.entries.len());
        self.entries.iter().for_each(|entry| {
            out.push_str(&format!(
                "\"{}\",\"{}\",{},{},0,0\r\n",
                entry.ch1_waveform,
                entry.ch2_waveform,
                entry.repeat.wire(),
                u8::from(entry.jump_enabled)
            ));
        });
        out.push_str(&format!("JUMP_MODE {}\r\n", self.jump_mode.mnemonic()));
        out.into_bytes()
    }

    /// Parses an on-disk sequence file.
    pub fn decode(data: &[u8]) -> Result<Self, FormatError> {
        let text = std::str::from_utf8(data)
            .map_err(|_| FormatError::malformed("sequence", "not ASCII text"))?;
        let mut lines = text.split("\r\n");
        if lines.next() != Some(MAGIC) {
            return Err(FormatError::malformed("sequence", "missing MAGIC 3002 header"));
        }
        let count: usize = lines
            .next()
            .and_then(|line| line.strip_prefix("LINES "))
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| FormatError::malformed("sequence", "missing LINES declaration"))?;
        let entries = (0..count)
            .map(|i| {
                lines
                    .next()
                    .ok_or_else(|| {
                        FormatError::malformed(
                            "sequence",
                            format!("table ends after {i} of {count} lines"),
                        )
                    })
                    .and_then(parse_entry)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let jump_mode = lines
            .next()
            .and_then(|line| line.strip_prefix("JUMP_MODE "))
            .and_then(JumpMode::from_mnemonic)
            .ok_or_else(|| FormatError::malformed("sequence", "missing JUMP_MODE directive"))?;
        if lines.any(|line| !line.is_empty()) {
            return Err(FormatError::malformed("sequence", "content after JUMP_MODE"));
        }
        Self::new(entries, jump_mode)
    }
}

fn validate_name(name: &str) -> Result<(), FormatError> {
    if name.is_empty() || name.contains(['"', ',', '\r', '\n']) {
        return Err(FormatError::InvalidWaveformName(name.to_owned()));
    }
    Ok(())
}

fn parse_entry(line: &str) -> Result<SeqEntry, FormatError> {
    let err = || FormatError::malformed("sequence", format!("bad table line: {line:?}"));
    let rest = line.strip_prefix('"').ok_or_else(err)?;
    let (ch1_waveform, rest) = rest.split_once('"').ok_or_else(err)?;
    let rest = rest.strip_prefix(",\"").ok_or_else(err)?;
    let (ch2_waveform, rest) = rest.split_once('"').ok_or_else(err)?;
    let rest = rest.strip_prefix(',').ok_or_else(err)?;
    let mut fields = rest.split(',');
    let repeat = fields
        .next()
        .and_then(|raw| raw.parse().ok())
        .map(Repeat::from_wire)
        .ok_or_else(err)?;
    let jump_enabled = match fields.next() {
        Some("0") => false,
        Some("1") => true,
        _ => return Err(err()),
    };
    // reserved goto fields, required to be zero
    if fields.next() != Some("0") || fields.next() != Some("0") || fields.next().is_some() {
        return Err(err());
    }
    Ok(SeqEntry::new(
        ch1_waveform.to_owned(),
        ch2_waveform.to_owned(),
        repeat,
        jump_enabled,
    ))
}
