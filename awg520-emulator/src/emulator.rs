//! The instrument state machine.

use std::collections::HashMap;

use awg520_core::defined::{Marker, OutputChannel, OUTPUT_CHANNELS};
use awg520_core::scpi::{Command, RunMode, VoltageLevel};
use awg520_core::seq::{JumpMode, Repeat, SequenceFile};
use awg520_core::wfm::Waveform;

use crate::error::EmulatorError;

/// The reply the emulated instrument gives to `*IDN?`.
pub const IDN_REPLY: &str = "SONY/TEK,AWG520,0,SCPI:95.0 OS:2.0 USR:2.0";

/// The output rails of one marker line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MarkerLevels {
    /// Low rail in volts.
    pub low: f64,
    /// High rail in volts.
    pub high: f64,
}

impl Default for MarkerLevels {
    // power-on marker levels of the instrument
    fn default() -> Self {
        Self {
            low: 0.0,
            high: 2.0,
        }
    }
}

/// An emulated AWG520.
///
/// The emulator executes parsed SCPI commands against the same file codecs
/// the driver writes with, so every file the driver uploads is validated the
/// way the instrument would validate it.
///
/// The sequencer is modeled at command granularity: a trigger releases a
/// waiting line immediately, a released finite-repeat line plays out its
/// repeats and falls through to the next line (wrapping past the last), and
/// an infinite line repeats until a software jump moves off it.
pub struct Awg520Emulator {
    files: HashMap<String, Vec<u8>>,
    loaded: [Option<String>; OUTPUT_CHANNELS],
    sequence: Option<SequenceFile>,
    run_mode: RunMode,
    running: bool,
    current_line: u16,
    waiting_trigger: bool,
    triggers: u32,
    soft_jumps: u32,
    marker_levels: HashMap<(OutputChannel, Marker), MarkerLevels>,
}

impl Default for Awg520Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Awg520Emulator {
    /// A freshly powered-on instrument: empty mass storage, continuous run
    /// mode, stopped.
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            loaded: [None, None],
            sequence: None,
            run_mode: RunMode::default(),
            running: false,
            current_line: 1,
            waiting_trigger: false,
            triggers: 0,
            soft_jumps: 0,
            marker_levels: HashMap::new(),
        }
    }

    /// Places `contents` on the instrument's mass storage, replacing any
    /// existing file of the same name.
    pub fn store_file(&mut self, name: impl Into<String>, contents: impl Into<Vec<u8>>) {
        self.files.insert(name.into(), contents.into());
    }

    /// Executes one command, returning the response line for queries.
    pub fn execute(&mut self, command: &Command) -> Result<Option<String>, EmulatorError> {
        match command {
            Command::Identify => return Ok(Some(IDN_REPLY.to_owned())),
            Command::Trigger => self.on_trigger(),
            Command::Run => self.on_run()?,
            Command::Stop => self.running = false,
            Command::RunMode(mode) => self.run_mode = *mode,
            Command::SoftJump(target) => self.on_jump(*target)?,
            Command::LoadFile { channel, file } => self.on_load(*channel, file)?,
            Command::MarkerVoltage {
                channel,
                marker,
                level,
                volts,
            } => {
                let levels = self.marker_levels.entry((*channel, *marker)).or_default();
                match level {
                    VoltageLevel::Low => levels.low = *volts,
                    VoltageLevel::High => levels.high = *volts,
                }
            }
        }
        Ok(None)
    }

    /// Parses and executes one line of the control connection.
    pub fn execute_line(&mut self, line: &str) -> Result<Option<String>, EmulatorError> {
        self.execute(&line.parse::<Command>()?)
    }

    fn on_trigger(&mut self) {
        self.triggers += 1;
        if !self.running || self.run_mode != RunMode::Enhanced || !self.waiting_trigger {
            return;
        }
        self.waiting_trigger = false;
        let Some(lines) = self.sequence.as_ref().map(|seq| seq.entries().len()) else {
            return;
        };
        let mut hops = 0;
        while hops < lines {
            let Some((repeat, _)) = self.line_info(self.current_line) else {
                return;
            };
            if matches!(repeat, Repeat::Infinite) {
                return;
            }
            self.current_line = if usize::from(self.current_line) == lines {
                1
            } else {
                self.current_line + 1
            };
            hops += 1;
            if self
                .line_info(self.current_line)
                .is_some_and(|(_, wait)| wait)
            {
                self.waiting_trigger = true;
                return;
            }
        }
    }

    fn on_run(&mut self) -> Result<(), EmulatorError> {
        if self.run_mode == RunMode::Enhanced {
            if self.sequence.is_none() {
                return Err(EmulatorError::NoSequenceLoaded);
            }
            self.current_line = 1;
            self.waiting_trigger = self.line_info(1).is_some_and(|(_, wait)| wait);
        }
        self.running = true;
        Ok(())
    }

    fn on_jump(&mut self, target: u16) -> Result<(), EmulatorError> {
        if self.run_mode != RunMode::Enhanced {
            return Err(EmulatorError::NotEnhancedMode);
        }
        let Some(seq) = self.sequence.as_ref() else {
            return Err(EmulatorError::NoSequenceLoaded);
        };
        if !self.running {
            return Err(EmulatorError::NotRunning);
        }
        if seq.jump_mode() != JumpMode::Software {
            return Err(EmulatorError::JumpModeNotSoftware);
        }
        let lines = seq.entries().len();
        if target == 0 || usize::from(target) > lines {
            return Err(EmulatorError::JumpOutOfRange { target, lines });
        }
        self.soft_jumps += 1;
        self.current_line = target;
        self.waiting_trigger = self.line_info(target).is_some_and(|(_, wait)| wait);
        Ok(())
    }

    fn on_load(&mut self, channel: OutputChannel, file: &str) -> Result<(), EmulatorError> {
        let contents = self
            .files
            .get(file)
            .ok_or_else(|| EmulatorError::FileNotFound(file.to_owned()))?;
        if file.ends_with(".seq") {
            let seq = SequenceFile::decode(contents)?;
            seq.entries().iter().try_for_each(|entry| {
                let ch1 = self.stored_waveform(&entry.ch1_waveform)?;
                let ch2 = self.stored_waveform(&entry.ch2_waveform)?;
                if ch1.len() != ch2.len() {
                    return Err(EmulatorError::WaveformLengthMismatch(
                        entry.ch1_waveform.clone(),
                        entry.ch2_waveform.clone(),
                    ));
                }
                Ok(())
            })?;
            // loading stops playback and rewinds the sequencer
            self.sequence = Some(seq);
            self.running = false;
            self.current_line = 1;
            self.waiting_trigger = false;
        } else if file.ends_with(".wfm") {
            Waveform::decode(contents)?;
        } else {
            return Err(EmulatorError::UnsupportedFile(file.to_owned()));
        }
        self.loaded[usize::from(channel.index()) - 1] = Some(file.to_owned());
        Ok(())
    }

    fn stored_waveform(&self, name: &str) -> Result<Waveform, EmulatorError> {
        let contents = self
            .files
            .get(name)
            .ok_or_else(|| EmulatorError::MissingWaveform(name.to_owned()))?;
        Ok(Waveform::decode(contents)?.0)
    }

    fn line_info(&self, line: u16) -> Option<(Repeat, bool)> {
        let entry = self
            .sequence
            .as_ref()?
            .entries()
            .get(usize::from(line).checked_sub(1)?)?;
        Some((entry.repeat, entry.jump_enabled))
    }

    /// The files on the instrument's mass storage.
    #[must_use]
    pub const fn files(&self) -> &HashMap<String, Vec<u8>> {
        &self.files
    }

    /// The contents of a stored file.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// The file loaded into a channel, if any.
    #[must_use]
    pub fn loaded_file(&self, channel: OutputChannel) -> Option<&str> {
        self.loaded[usize::from(channel.index()) - 1].as_deref()
    }

    /// The loaded sequence table, if any.
    #[must_use]
    pub const fn sequence(&self) -> Option<&SequenceFile> {
        self.sequence.as_ref()
    }

    /// The selected run mode.
    #[must_use]
    pub const fn run_mode(&self) -> RunMode {
        self.run_mode
    }

    /// Whether output is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// The 1-based sequence-table line the sequencer is on.
    #[must_use]
    pub const fn current_line(&self) -> u16 {
        self.current_line
    }

    /// Whether the sequencer is holding the current line for a trigger.
    #[must_use]
    pub const fn waiting_trigger(&self) -> bool {
        self.waiting_trigger
    }

    /// Number of trigger events received.
    #[must_use]
    pub const fn triggers(&self) -> u32 {
        self.triggers
    }

    /// Number of software jumps executed.
    #[must_use]
    pub const fn soft_jumps(&self) -> u32 {
        self.soft_jumps
    }

    /// The output rails of a marker line.
    #[must_use]
    pub fn marker_levels(&self, channel: OutputChannel, marker: Marker) -> MarkerLevels {
        self.marker_levels
            .get(&(channel, marker))
            .copied()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use awg520_core::seq::SeqEntry;
    use bit_vec::BitVec;

    use super::*;

    const CLOCK_HZ: f64 = 1e7;

    fn waveform(len: usize) -> Vec<u8> {
        Waveform::new(vec![0.0; len], BitVec::from_elem(len, true))
            .and_then(|wfm| wfm.encode(CLOCK_HZ))
            .expect("valid waveform")
    }

    fn trigger_table() -> SequenceFile {
        SequenceFile::new(
            vec![
                SeqEntry::new(
                    "arm_1.wfm".to_owned(),
                    "arm_2.wfm".to_owned(),
                    Repeat::Infinite,
                    true,
                ),
                SeqEntry::new(
                    "trig_1.wfm".to_owned(),
                    "trig_2.wfm".to_owned(),
                    Repeat::finite(100).expect("nonzero"),
                    true,
                ),
            ],
            JumpMode::Software,
        )
        .expect("valid table")
    }

    fn loaded_emulator() -> Awg520Emulator {
        let mut awg = Awg520Emulator::new();
        for name in ["arm_1.wfm", "arm_2.wfm", "trig_1.wfm", "trig_2.wfm"] {
            awg.store_file(name, waveform(100));
        }
        awg.store_file("odmr_trigger.seq", trigger_table().encode());
        for channel in OutputChannel::ALL {
            awg.execute(&Command::LoadFile {
                channel,
                file: "odmr_trigger.seq".to_owned(),
            })
            .expect("load");
        }
        awg.execute(&Command::RunMode(RunMode::Enhanced)).expect("rmod");
        awg
    }

    #[test]
    fn identify() -> anyhow::Result<()> {
        let mut awg = Awg520Emulator::new();
        let reply = awg.execute(&Command::Identify)?;
        assert_eq!(Some(IDN_REPLY.to_owned()), reply);
        assert!(reply.is_some_and(|r| r.contains("AWG520")));
        Ok(())
    }

    #[test]
    fn load_validates_referenced_waveforms() {
        let mut awg = Awg520Emulator::new();
        awg.store_file("odmr_trigger.seq", trigger_table().encode());
        awg.store_file("arm_1.wfm", waveform(100));
        assert_eq!(
            Err(EmulatorError::MissingWaveform("arm_2.wfm".to_owned())),
            awg.execute(&Command::LoadFile {
                channel: OutputChannel::Ch1,
                file: "odmr_trigger.seq".to_owned(),
            })
            .map(|_| ())
        );
        assert!(awg.sequence().is_none());
    }

    #[test]
    fn load_rejects_length_mismatch_within_a_line() {
        let mut awg = Awg520Emulator::new();
        for name in ["arm_2.wfm", "trig_1.wfm", "trig_2.wfm"] {
            awg.store_file(name, waveform(100));
        }
        awg.store_file("arm_1.wfm", waveform(50));
        awg.store_file("odmr_trigger.seq", trigger_table().encode());
        assert_eq!(
            Err(EmulatorError::WaveformLengthMismatch(
                "arm_1.wfm".to_owned(),
                "arm_2.wfm".to_owned()
            )),
            awg.execute(&Command::LoadFile {
                channel: OutputChannel::Ch1,
                file: "odmr_trigger.seq".to_owned(),
            })
            .map(|_| ())
        );
    }

    #[test]
    fn load_rejects_missing_and_unsupported_files() {
        let mut awg = Awg520Emulator::new();
        assert_eq!(
            Err(EmulatorError::FileNotFound("nope.seq".to_owned())),
            awg.execute(&Command::LoadFile {
                channel: OutputChannel::Ch1,
                file: "nope.seq".to_owned(),
            })
            .map(|_| ())
        );
        awg.store_file("notes.txt", b"hello".to_vec());
        assert_eq!(
            Err(EmulatorError::UnsupportedFile("notes.txt".to_owned())),
            awg.execute(&Command::LoadFile {
                channel: OutputChannel::Ch1,
                file: "notes.txt".to_owned(),
            })
            .map(|_| ())
        );
    }

    #[test]
    fn run_requires_a_sequence_in_enhanced_mode() -> anyhow::Result<()> {
        let mut awg = Awg520Emulator::new();
        awg.execute(&Command::RunMode(RunMode::Enhanced))?;
        assert_eq!(
            Err(EmulatorError::NoSequenceLoaded),
            awg.execute(&Command::Run).map(|_| ())
        );
        // continuous mode runs without one
        awg.execute(&Command::RunMode(RunMode::Continuous))?;
        awg.execute(&Command::Run)?;
        assert!(awg.is_running());
        Ok(())
    }

    #[test]
    fn run_arms_the_first_line() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        assert!(awg.is_running());
        assert_eq!(1, awg.current_line());
        assert!(awg.waiting_trigger());
        Ok(())
    }

    #[test]
    fn trigger_releases_an_infinite_line_in_place() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        awg.execute(&Command::Trigger)?;
        assert_eq!(1, awg.triggers());
        assert_eq!(1, awg.current_line());
        assert!(!awg.waiting_trigger());
        Ok(())
    }

    #[test]
    fn released_finite_line_falls_through_and_wraps() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        awg.execute(&Command::Trigger)?;
        awg.execute(&Command::SoftJump(2))?;
        assert_eq!(2, awg.current_line());
        assert!(awg.waiting_trigger());
        // line 2 repeats 100 times, then wraps to line 1 which waits again
        awg.execute(&Command::Trigger)?;
        assert_eq!(1, awg.current_line());
        assert!(awg.waiting_trigger());
        Ok(())
    }

    #[test]
    fn odmr_scan_cycle() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        for _ in 0..3 {
            awg.execute(&Command::Trigger)?;
            awg.execute(&Command::SoftJump(2))?;
            awg.execute(&Command::Trigger)?;
        }
        assert_eq!(6, awg.triggers());
        assert_eq!(3, awg.soft_jumps());
        assert_eq!(1, awg.current_line());
        Ok(())
    }

    #[rstest::rstest]
    #[test]
    #[case(0)]
    #[case(3)]
    fn jump_rejects_out_of_range_targets(#[case] target: u16) -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        assert_eq!(
            Err(EmulatorError::JumpOutOfRange { target, lines: 2 }),
            awg.execute(&Command::SoftJump(target)).map(|_| ())
        );
        assert_eq!(0, awg.soft_jumps());
        Ok(())
    }

    #[test]
    fn jump_requires_enhanced_running_software() -> anyhow::Result<()> {
        let mut awg = Awg520Emulator::new();
        assert_eq!(
            Err(EmulatorError::NotEnhancedMode),
            awg.execute(&Command::SoftJump(1)).map(|_| ())
        );

        let mut awg = loaded_emulator();
        assert_eq!(
            Err(EmulatorError::NotRunning),
            awg.execute(&Command::SoftJump(1)).map(|_| ())
        );

        let mut awg = loaded_emulator();
        let table = SequenceFile::new(trigger_table().entries().clone(), JumpMode::Table)?;
        awg.store_file("odmr_trigger.seq", table.encode());
        awg.execute(&Command::LoadFile {
            channel: OutputChannel::Ch1,
            file: "odmr_trigger.seq".to_owned(),
        })?;
        awg.execute(&Command::Run)?;
        assert_eq!(
            Err(EmulatorError::JumpModeNotSoftware),
            awg.execute(&Command::SoftJump(1)).map(|_| ())
        );
        Ok(())
    }

    #[test]
    fn stop_halts_output() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        awg.execute(&Command::Stop)?;
        assert!(!awg.is_running());
        Ok(())
    }

    #[test]
    fn marker_voltages_are_stored() -> anyhow::Result<()> {
        let mut awg = Awg520Emulator::new();
        assert_eq!(
            MarkerLevels {
                low: 0.0,
                high: 2.0,
            },
            awg.marker_levels(OutputChannel::Ch1, Marker::M1)
        );
        awg.execute(&Command::MarkerVoltage {
            channel: OutputChannel::Ch1,
            marker: Marker::M1,
            level: VoltageLevel::High,
            volts: 2.5,
        })?;
        awg.execute(&Command::MarkerVoltage {
            channel: OutputChannel::Ch1,
            marker: Marker::M1,
            level: VoltageLevel::Low,
            volts: -0.5,
        })?;
        assert_eq!(
            MarkerLevels {
                low: -0.5,
                high: 2.5,
            },
            awg.marker_levels(OutputChannel::Ch1, Marker::M1)
        );
        assert_eq!(
            MarkerLevels {
                low: 0.0,
                high: 2.0,
            },
            awg.marker_levels(OutputChannel::Ch2, Marker::M1)
        );
        Ok(())
    }

    #[test]
    fn execute_line_round_trips_the_grammar() -> anyhow::Result<()> {
        let mut awg = Awg520Emulator::new();
        assert_eq!(Some(IDN_REPLY.to_owned()), awg.execute_line("*IDN?\r\n")?);
        assert!(awg.execute_line("AWGC:NOPE").is_err());
        Ok(())
    }

    #[test]
    fn loading_rewinds_the_sequencer() -> anyhow::Result<()> {
        let mut awg = loaded_emulator();
        awg.execute(&Command::Run)?;
        awg.execute(&Command::Trigger)?;
        awg.execute(&Command::SoftJump(2))?;
        awg.execute(&Command::LoadFile {
            channel: OutputChannel::Ch2,
            file: "odmr_trigger.seq".to_owned(),
        })?;
        assert!(!awg.is_running());
        assert_eq!(1, awg.current_line());
        assert_eq!(
            Some("odmr_trigger.seq"),
            awg.loaded_file(OutputChannel::Ch2)
        );
        Ok(())
    }
}
