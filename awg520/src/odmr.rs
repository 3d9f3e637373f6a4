//! The trigger pattern of an ODMR scan.
//!
//! Each dwell period gates the photon counter on the first half of the
//! period while the green pump laser stays on throughout; the counter
//! latches on the next rising edge of the gate. An idle "arm" bank keeps the
//! laser on while the sequencer waits for the software trigger that starts a
//! scan.

use core::num::NonZeroU32;
use core::time::Duration;
use std::path::{Path, PathBuf};

use awg520_core::defined::OutputChannel;
use awg520_core::seq::{JumpMode, Repeat, SeqEntry, SequenceFile};

use crate::error::Awg520Error;
use crate::file::AwgFile;
use crate::sequence::{sample_clock_hz, ticks, ChannelId, Sequence, TimeSpec};

/// Name of the generated sequence file.
pub const SEQUENCE_FILE: &str = "odmr_trigger.seq";
/// Sequence-table line of the arm bank.
pub const ARM_LINE: u16 = 1;
/// Sequence-table line of the trigger bank.
pub const TRIGGER_LINE: u16 = 2;

const DEFAULT_NUM_STEPS: NonZeroU32 = match NonZeroU32::new(100) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration of one trigger pattern.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerConfig {
    /// Duration of one measurement step.
    pub dwell_time: Duration,
    /// Number of dwell periods played per scan.
    pub num_steps: NonZeroU32,
    /// Sample resolution of the instrument clock.
    pub resolution: Duration,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            dwell_time: Duration::from_millis(1),
            num_steps: DEFAULT_NUM_STEPS,
            resolution: Duration::from_nanos(100),
        }
    }
}

/// The paths written by [`write_trigger_sequence`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerFiles {
    /// The four waveform files, one per bank and channel.
    pub waveforms: Vec<PathBuf>,
    /// The sequence file referencing them.
    pub sequence: PathBuf,
}

/// Builds the trigger pattern for `config` and writes its waveform and
/// sequence files into `dir`.
///
/// The "trig" bank gates the counter on `[0, stop/2)` ticks and keeps the
/// laser on over `[0, stop)`, with `stop` the dwell time in resolution ticks
/// (truncating). The "arm" bank holds only the laser on for the same length.
/// The sequence table plays the arm bank until a software jump, then the
/// trig bank `num_steps` times:
///
/// ```text
/// "arm_1.wfm","arm_2.wfm",0,1,0,0
/// "trig_1.wfm","trig_2.wfm",{num_steps},1,0,0
/// JUMP_MODE SOFTWARE
/// ```
#[tracing::instrument(skip_all, fields(dir = %dir.display()))]
pub fn write_trigger_sequence(
    dir: &Path,
    config: &TriggerConfig,
) -> Result<TriggerFiles, Awg520Error> {
    let stop = ticks(config.dwell_time, config.resolution);
    let half = stop / 2;
    tracing::debug!(stop, half, "Trigger pattern tick counts");

    let trig = Sequence::new(
        vec![
            TimeSpec::new(ChannelId::Measure, 0, half),
            TimeSpec::new(ChannelId::Green, 0, stop),
        ],
        config.resolution,
    )?
    .sample()?;
    let arm = Sequence::new(
        vec![TimeSpec::new(ChannelId::Green, 0, trig.len() as u64)],
        config.resolution,
    )?
    .sample()?;

    let writer = AwgFile::new(dir, sample_clock_hz(config.resolution))?;
    let mut waveforms = Vec::with_capacity(2 * OutputChannel::ALL.len());
    for (bank, data) in [("trig", &trig), ("arm", &arm)] {
        for channel in OutputChannel::ALL {
            waveforms.push(writer.write_waveform(bank, channel, data.channel(channel))?);
        }
    }

    let table = SequenceFile::new(
        vec![
            SeqEntry::new(
                AwgFile::waveform_name("arm", OutputChannel::Ch1),
                AwgFile::waveform_name("arm", OutputChannel::Ch2),
                Repeat::Infinite,
                true,
            ),
            SeqEntry::new(
                AwgFile::waveform_name("trig", OutputChannel::Ch1),
                AwgFile::waveform_name("trig", OutputChannel::Ch2),
                Repeat::Finite(config.num_steps),
                true,
            ),
        ],
        JumpMode::Software,
    )?;
    let sequence = writer.write_sequence(SEQUENCE_FILE, &table)?;

    Ok(TriggerFiles {
        waveforms,
        sequence,
    })
}
