use core::time::Duration;

/// Number of analog output channels.
pub const OUTPUT_CHANNELS: usize = 2;
/// Waveform memory per channel, in samples.
pub const WFM_MEMORY_SAMPLES: usize = 1_048_512;
/// Maximum number of lines in a sequence table.
pub const SEQ_LINES_MAX: usize = 8_000;
/// Shortest sample period the instrument clock supports (1 GS/s).
pub const MIN_SAMPLE_PERIOD: Duration = Duration::from_nanos(1);
/// TCP port of the SCPI control interface.
pub const SCPI_PORT: u16 = 4000;
/// TCP port of the instrument's FTP server.
pub const FTP_PORT: u16 = 21;
/// Model name carried in the reply to `*IDN?`.
pub const IDN_MODEL: &str = "AWG520";

/// A physical output channel of the instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputChannel {
    /// Channel 1.
    Ch1,
    /// Channel 2.
    Ch2,
}

impl OutputChannel {
    /// Both channels, in channel order.
    pub const ALL: [OutputChannel; OUTPUT_CHANNELS] = [OutputChannel::Ch1, OutputChannel::Ch2];

    /// 1-based index used in file names and SCPI source addressing.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            OutputChannel::Ch1 => 1,
            OutputChannel::Ch2 => 2,
        }
    }
}

/// A marker line of an output channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Marker 1.
    M1,
    /// Marker 2.
    M2,
}

impl Marker {
    /// 1-based index used in SCPI marker addressing.
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Marker::M1 => 1,
            Marker::M2 => 2,
        }
    }
}
