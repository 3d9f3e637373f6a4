//! Symbolic timing descriptions. A [`Sequence`] is a list of
//! channel/start/stop triples in ticks of the sample resolution; sampling it
//! yields one [`Waveform`] per output channel, all of the same length.

use core::time::Duration;

use bit_vec::BitVec;
use derive_new::new;
use thiserror::Error;

use awg520_core::defined::{OutputChannel, MIN_SAMPLE_PERIOD, WFM_MEMORY_SAMPLES};
use awg520_core::error::FormatError;
use awg520_core::wfm::Waveform;

/// An error produced while building or sampling a timing description.
#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum SequenceError {
    /// The description has no active windows.
    #[error("Timing description is empty")]
    Empty,
    /// A window ends at or before its start.
    #[error("Active window of {channel:?} is empty: start {start} >= stop {stop}")]
    EmptyWindow {
        /// The channel of the offending window.
        channel: ChannelId,
        /// Start tick.
        start: u64,
        /// Stop tick.
        stop: u64,
    },
    /// The sample resolution is finer than the instrument clock allows.
    #[error("Resolution {0:?} is below the minimum sample period ({MIN_SAMPLE_PERIOD:?})")]
    ResolutionTooFine(Duration),
    /// The description does not fit the instrument's waveform memory.
    #[error("Sequence length ({0} ticks) exceeds the instrument memory ({WFM_MEMORY_SAMPLES} samples)")]
    TooLong(u64),
    /// Sampling produced an invalid waveform.
    #[error("{0}")]
    Format(#[from] FormatError),
}

/// A named logic channel of the experiment, routed to a fixed marker line of
/// the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelId {
    /// The photon-counter gate, on channel 1's marker.
    Measure,
    /// The green pump laser, on channel 2's marker.
    Green,
}

impl ChannelId {
    /// The output channel whose marker line carries this signal.
    #[must_use]
    pub const fn output(self) -> OutputChannel {
        match self {
            ChannelId::Measure => OutputChannel::Ch1,
            ChannelId::Green => OutputChannel::Ch2,
        }
    }
}

/// One active window: `channel` is high from tick `start` to tick `stop`
/// (exclusive).
#[derive(new, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeSpec {
    /// The channel the window drives.
    pub channel: ChannelId,
    /// First active tick.
    pub start: u64,
    /// First inactive tick after the window.
    pub stop: u64,
}

/// Number of whole resolution ticks in `duration`, truncating toward zero.
///
/// Returns zero when `resolution` is zero and saturates at [`u64::MAX`];
/// callers validate the resolution and the tick count through
/// [`Sequence::new`].
#[must_use]
pub fn ticks(duration: Duration, resolution: Duration) -> u64 {
    duration
        .as_nanos()
        .checked_div(resolution.as_nanos())
        .map_or(0, |quotient| u64::try_from(quotient).unwrap_or(u64::MAX))
}

/// The sample clock frequency in Hz for the given sample resolution.
#[must_use]
pub fn sample_clock_hz(resolution: Duration) -> f64 {
    1.0 / resolution.as_secs_f64()
}

/// A validated timing description at a fixed sample resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    specs: Vec<TimeSpec>,
    resolution: Duration,
    length: u64,
}

impl Sequence {
    /// A sequence from active windows, checking that every window is
    /// non-empty and that the whole description fits the instrument.
    pub fn new(specs: Vec<TimeSpec>, resolution: Duration) -> Result<Self, SequenceError> {
        if resolution < MIN_SAMPLE_PERIOD {
            return Err(SequenceError::ResolutionTooFine(resolution));
        }
        let length = specs
            .iter()
            .try_fold(0u64, |length, spec| {
                if spec.start >= spec.stop {
                    return Err(SequenceError::EmptyWindow {
                        channel: spec.channel,
                        start: spec.start,
                        stop: spec.stop,
                    });
                }
                Ok(length.max(spec.stop))
            })?;
        if length == 0 {
            return Err(SequenceError::Empty);
        }
        if length > WFM_MEMORY_SAMPLES as u64 {
            return Err(SequenceError::TooLong(length));
        }
        Ok(Self {
            specs,
            resolution,
            length,
        })
    }

    /// Total length in ticks, the largest stop tick of any window.
    #[must_use]
    pub const fn length(&self) -> u64 {
        self.length
    }

    /// The sample resolution.
    #[must_use]
    pub const fn resolution(&self) -> Duration {
        self.resolution
    }

    /// Samples the description into one waveform per output channel.
    ///
    /// Marker bits are set on every `[start, stop)` window routed to the
    /// channel; the analog samples stay at zero, trigger patterns live on the
    /// marker lines alone.
    pub fn sample(&self) -> Result<Bank, SequenceError> {
        let len = self.length as usize;
        let waveforms = OutputChannel::ALL
            .iter()
            .map(|&output| {
                let mut markers = BitVec::from_elem(len, false);
                self.specs
                    .iter()
                    .filter(|spec| spec.channel.output() == output)
                    .for_each(|spec| {
                        (spec.start..spec.stop).for_each(|tick| {
                            markers.set(tick as usize, true);
                        });
                    });
                Ok(Waveform::new(vec![0.0; len], markers)?)
            })
            .collect::<Result<Vec<_>, SequenceError>>()?;
        Ok(Bank { waveforms })
    }
}

/// One bank of playback data: a waveform per output channel, all of equal
/// length.
#[derive(Clone, Debug, PartialEq)]
pub struct Bank {
    waveforms: Vec<Waveform>,
}

impl Bank {
    /// The waveform of one output channel.
    #[must_use]
    pub fn channel(&self, channel: OutputChannel) -> &Waveform {
        &self.waveforms[usize::from(channel.index()) - 1]
    }

    /// The bank's length in samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waveforms[0].len()
    }

    /// Always `false`; empty descriptions are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
