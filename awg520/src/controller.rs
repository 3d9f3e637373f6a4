//! The instrument handle. One [`Awg520`] owns one open connection; the
//! high-level operations consume the handle and release the connection on
//! every exit path.

use core::time::Duration;
use std::path::Path;
use std::time::Instant;

use itertools::Itertools;

use awg520_core::defined::{Marker, OutputChannel, IDN_MODEL};
use awg520_core::link::Link;
use awg520_core::scpi::{Command, RunMode, VoltageLevel};
use awg520_core::sleep::{Sleep, StdSleeper};

use crate::error::Awg520Error;
use crate::odmr;

/// Settle times the instrument needs after control commands.
///
/// The defaults are the empirically required command latencies of the
/// AWG520; shortening them makes the instrument drop commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettleTimes {
    /// Wait after entering run mode.
    pub run: Duration,
    /// Wait after a trigger event.
    pub trigger: Duration,
    /// Wait after a software jump.
    pub jump: Duration,
}

impl Default for SettleTimes {
    fn default() -> Self {
        Self {
            run: Duration::from_millis(200),
            trigger: Duration::from_millis(100),
            jump: Duration::from_millis(5),
        }
    }
}

impl SettleTimes {
    /// All-zero settle times, for links that need none.
    pub const ZERO: SettleTimes = SettleTimes {
        run: Duration::ZERO,
        trigger: Duration::ZERO,
        jump: Duration::ZERO,
    };
}

/// Configuration of an [`Awg520`] handle.
#[derive(Clone, Debug, PartialEq)]
pub struct Awg520Option {
    /// Settle times after control commands.
    pub settle: SettleTimes,
    /// The sequence file [`setup`](Awg520::setup) loads into both channels.
    pub sequence_file: String,
    /// Low rail of the marker outputs in volts.
    pub marker_low: f64,
    /// High rail of the marker outputs in volts.
    pub marker_high: f64,
}

impl Default for Awg520Option {
    fn default() -> Self {
        Self {
            settle: SettleTimes::default(),
            sequence_file: odmr::SEQUENCE_FILE.to_owned(),
            marker_low: 0.0,
            // TTL-compatible trigger level for the counter hardware
            marker_high: 2.0,
        }
    }
}

/// A handle to one AWG520.
///
/// Opening the handle opens the link and verifies the instrument's identity;
/// [`close`](Awg520::close), [`upload`](Awg520::upload) and
/// [`run_and_acquire`](Awg520::run_and_acquire) release the connection, and
/// dropping an open handle closes it best-effort.
pub struct Awg520<L: Link, S: Sleep = StdSleeper> {
    link: L,
    sleeper: S,
    option: Awg520Option,
}

impl<L: Link> Awg520<L, StdSleeper> {
    /// Equivalent to [`Self::open_with`] with a [`StdSleeper`].
    pub fn open(link: L, option: Awg520Option) -> Result<Self, Awg520Error> {
        Self::open_with(link, option, StdSleeper)
    }
}

impl<L: Link, S: Sleep> Awg520<L, S> {
    /// Opens the link and checks that the connected instrument identifies as
    /// an AWG520. The link is closed again if the check fails.
    pub fn open_with(mut link: L, option: Awg520Option, sleeper: S) -> Result<Self, Awg520Error> {
        link.open()?;
        let mut awg = Self {
            link,
            sleeper,
            option,
        };
        if let Err(e) = awg.handshake() {
            let _ = awg.close_impl();
            return Err(e);
        }
        Ok(awg)
    }

    fn handshake(&mut self) -> Result<(), Awg520Error> {
        let idn = self.link.query(&Command::Identify)?;
        if !idn.contains(IDN_MODEL) {
            return Err(Awg520Error::UnexpectedInstrument(idn));
        }
        tracing::info!("Connected to {idn}");
        Ok(())
    }

    /// Whether the link is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Sets the marker output rails and loads the configured sequence file
    /// into both channels. The I/Q modulator is left untouched; trigger
    /// patterns do not use it.
    pub fn setup(&mut self) -> Result<(), Awg520Error> {
        for channel in OutputChannel::ALL {
            for (level, volts) in [
                (VoltageLevel::Low, self.option.marker_low),
                (VoltageLevel::High, self.option.marker_high),
            ] {
                self.link.send(&Command::MarkerVoltage {
                    channel,
                    marker: Marker::M1,
                    level,
                    volts,
                })?;
            }
        }
        let file = self.option.sequence_file.clone();
        for channel in OutputChannel::ALL {
            self.link.send(&Command::LoadFile {
                channel,
                file: file.clone(),
            })?;
        }
        tracing::debug!(file, "Instrument set up");
        Ok(())
    }

    /// Selects enhanced run mode and starts the sequencer, then waits out the
    /// run settle time.
    pub fn run(&mut self) -> Result<(), Awg520Error> {
        self.link.send(&Command::RunMode(RunMode::Enhanced))?;
        self.link.send(&Command::Run)?;
        self.sleeper.sleep(self.option.settle.run);
        Ok(())
    }

    /// Stops the sequencer.
    pub fn stop(&mut self) -> Result<(), Awg520Error> {
        self.link.send(&Command::Stop)?;
        Ok(())
    }

    /// Issues a software trigger event, then waits out the trigger settle
    /// time.
    pub fn trigger(&mut self) -> Result<(), Awg520Error> {
        self.link.send(&Command::Trigger)?;
        self.sleeper.sleep(self.option.settle.trigger);
        Ok(())
    }

    /// Jumps the sequencer to a 1-based table line, then waits out the jump
    /// settle time.
    pub fn jump(&mut self, line: u16) -> Result<(), Awg520Error> {
        self.link.send(&Command::SoftJump(line))?;
        self.sleeper.sleep(self.option.settle.jump);
        Ok(())
    }

    /// Places `contents` on the instrument's mass storage under `name`.
    pub fn send_file(&mut self, name: &str, contents: &[u8]) -> Result<(), Awg520Error> {
        self.link.send_file(name, contents)?;
        Ok(())
    }

    /// Transfers every regular file in `dir` to the instrument under its own
    /// name and releases the connection, returning the elapsed transfer time.
    #[tracing::instrument(skip_all, fields(dir = %dir.display()))]
    pub fn upload(mut self, dir: &Path) -> Result<Duration, Awg520Error> {
        let result = self.upload_impl(dir);
        let closed = self.close_impl();
        result.and_then(|elapsed| closed.map(|()| elapsed))
    }

    fn upload_impl(&mut self, dir: &Path) -> Result<Duration, Awg520Error> {
        let start = Instant::now();
        let paths = std::fs::read_dir(dir)
            .and_then(|entries| {
                entries
                    .map(|entry| entry.map(|entry| entry.path()))
                    .collect::<Result<Vec<_>, _>>()
            })
            .map_err(|source| Awg520Error::file_read(dir, source))?;
        let mut sent = 0usize;
        for path in paths
            .into_iter()
            .filter(|path| path.is_file())
            .sorted()
        {
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .ok_or_else(|| Awg520Error::InvalidFileName(path.clone()))?
                .to_owned();
            let contents =
                std::fs::read(&path).map_err(|source| Awg520Error::file_read(&path, source))?;
            tracing::debug!(name, bytes = contents.len(), "Transferring file");
            self.link.send_file(&name, &contents)?;
            sent += 1;
        }
        let elapsed = start.elapsed();
        tracing::info!(?elapsed, sent, "File transfer finished");
        Ok(elapsed)
    }

    /// Runs a full acquisition: sets the instrument up, starts the
    /// sequencer, and for each of `num_averages` scans triggers the arm
    /// line, jumps to the trigger line, and triggers its playback. The
    /// connection is released exactly once, on success and on failure alike.
    ///
    /// Data acquisition hardware is expected to latch on the gate edges the
    /// trigger bank emits during each scan.
    #[tracing::instrument(skip_all, fields(num_averages = num_averages))]
    pub fn run_and_acquire(mut self, num_averages: u32) -> Result<(), Awg520Error> {
        let result = self.acquire_impl(num_averages);
        let closed = self.close_impl();
        result.and(closed)
    }

    fn acquire_impl(&mut self, num_averages: u32) -> Result<(), Awg520Error> {
        self.setup()?;
        self.run()?;
        for scan in 0..num_averages {
            tracing::debug!(scan, "Scan");
            // release the arm line, switch to the trigger bank, play it
            self.trigger()?;
            self.jump(odmr::TRIGGER_LINE)?;
            self.trigger()?;
        }
        Ok(())
    }

    /// Stops the sequencer and closes the link. A no-op on a handle whose
    /// link is already closed.
    pub fn close(mut self) -> Result<(), Awg520Error> {
        self.close_impl()
    }

    fn close_impl(&mut self) -> Result<(), Awg520Error> {
        if !self.link.is_open() {
            return Ok(());
        }
        let stopped = self.link.send(&Command::Stop);
        let closed = self.link.close();
        stopped?;
        closed?;
        Ok(())
    }
}

impl<L: Link, S: Sleep> Drop for Awg520<L, S> {
    fn drop(&mut self) {
        if self.link.is_open() {
            let _ = self.close_impl();
        }
    }
}
