//! The waveform (`.wfm`) file format: a `MAGIC 1000` header, an IEEE 488.2
//! definite-length block of 5-byte sample records, and a `CLOCK` trailer
//! naming the sample rate. Lines are CRLF-terminated ASCII.

use bit_vec::BitVec;
use getset::Getters;
use zerocopy::byteorder::{F32, LE};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::defined::WFM_MEMORY_SAMPLES;
use crate::error::FormatError;

const MAGIC: &[u8] = b"MAGIC 1000\r\n";

/// One sample point of the data block: the analog value followed by the
/// marker byte. Marker 1 is bit 0 and marker 2 is bit 1; the upper bits are
/// reserved.
#[derive(Clone, Copy, Debug, IntoBytes, FromBytes, Immutable, KnownLayout, Unaligned)]
#[repr(C)]
struct Record {
    sample: F32<LE>,
    marker: u8,
}

const MARKER_1: u8 = 1 << 0;
const MARKER_BITS: u8 = 0b11;

/// One channel's worth of playback data: an analog sample array and the
/// channel's marker line, always of equal length.
///
/// The driver emits the marker line on marker 1 and leaves marker 2 low.
#[derive(Clone, Debug, PartialEq, Getters)]
pub struct Waveform {
    /// Analog samples, nominally in `[-1.0, 1.0]`.
    #[getset(get = "pub")]
    samples: Vec<f32>,
    /// Marker bit per sample.
    #[getset(get = "pub")]
    markers: BitVec,
}

impl Waveform {
    /// A waveform from `samples` and `markers`, checking that both arrays are
    /// the same length, non-empty, and fit the instrument memory.
    pub fn new(samples: Vec<f32>, markers: BitVec) -> Result<Self, FormatError> {
        if samples.len() != markers.len() {
            return Err(FormatError::LengthMismatch {
                samples: samples.len(),
                markers: markers.len(),
            });
        }
        if samples.is_empty() {
            return Err(FormatError::EmptyWaveform);
        }
        if samples.len() > WFM_MEMORY_SAMPLES {
            return Err(FormatError::WaveformTooLong(samples.len()));
        }
        Ok(Self { samples, markers })
    }

    /// The number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always `false`; empty waveforms are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Serializes the waveform with the given sample clock.
    pub fn encode(&self, clock_hz: f64) -> Result<Vec<u8>, FormatError> {
        if !clock_hz.is_finite() || clock_hz <= 0.0 {
            return Err(FormatError::InvalidClock(clock_hz));
        }
        let records = self
            .samples
            .iter()
            .zip(self.markers.iter())
            .map(|(&sample, marker)| Record {
                sample: F32::new(sample),
                marker: if marker { MARKER_1 } else { 0 },
            })
            .collect::<Vec<_>>();
        let data = records.as_bytes();
        let count = data.len().to_string();
        let mut out = Vec::with_capacity(MAGIC.len() + 2 + count.len() + data.len() + 32);
        out.extend_from_slice(MAGIC);
        out.push(b'#');
        out.extend_from_slice(count.len().to_string().as_bytes());
        out.extend_from_slice(count.as_bytes());
        out.extend_from_slice(data);
        out.extend_from_slice(format!("CLOCK {}\r\n", render_clock(clock_hz)).as_bytes());
        Ok(out)
    }

    /// Parses an on-disk waveform file, returning the waveform and its sample
    /// clock in Hz.
    pub fn decode(data: &[u8]) -> Result<(Self, f64), FormatError> {
        let rest = data
            .strip_prefix(MAGIC)
            .ok_or_else(|| FormatError::malformed("waveform", "missing MAGIC 1000 header"))?;
        let rest = rest
            .strip_prefix(b"#")
            .ok_or_else(|| FormatError::malformed("waveform", "missing data block"))?;
        let (&digits, rest) = rest
            .split_first()
            .ok_or_else(|| FormatError::malformed("waveform", "truncated data block"))?;
        let digits = match digits {
            b'1'..=b'9' => usize::from(digits - b'0'),
            _ => return Err(FormatError::malformed("waveform", "bad block digit count")),
        };
        if rest.len() < digits {
            return Err(FormatError::malformed("waveform", "truncated data block"));
        }
        let (count, rest) = rest.split_at(digits);
        let count: usize = std::str::from_utf8(count)
            .ok()
            .and_then(|count| count.parse().ok())
            .ok_or_else(|| FormatError::malformed("waveform", "bad block byte count"))?;
        if count % size_of::<Record>() != 0 {
            return Err(FormatError::malformed(
                "waveform",
                format!("block length ({count}) is not a whole number of records"),
            ));
        }
        if rest.len() < count {
            return Err(FormatError::malformed("waveform", "truncated data block"));
        }
        let (data, trailer) = rest.split_at(count);
        let records = <[Record]>::ref_from_bytes(data)
            .map_err(|_| FormatError::malformed("waveform", "unreadable data block"))?;
        let clock_hz = parse_trailer(trailer)?;
        let samples = records
            .iter()
            .map(|record| record.sample.get())
            .collect::<Vec<_>>();
        let markers = records
            .iter()
            .map(|record| {
                if record.marker & !MARKER_BITS != 0 {
                    return Err(FormatError::malformed(
                        "waveform",
                        format!("reserved marker bits set: {:#04x}", record.marker),
                    ));
                }
                Ok(record.marker & MARKER_1 != 0)
            })
            .collect::<Result<BitVec, _>>()?;
        Ok((Self::new(samples, markers)?, clock_hz))
    }
}

fn parse_trailer(trailer: &[u8]) -> Result<f64, FormatError> {
    let clock_hz: f64 = std::str::from_utf8(trailer)
        .ok()
        .and_then(|line| line.strip_prefix("CLOCK "))
        .and_then(|line| line.strip_suffix("\r\n"))
        .and_then(|freq| freq.parse().ok())
        .ok_or_else(|| FormatError::malformed("waveform", "missing CLOCK trailer"))?;
    if !clock_hz.is_finite() || clock_hz <= 0.0 {
        return Err(FormatError::InvalidClock(clock_hz));
    }
    Ok(clock_hz)
}

/// Renders a frequency the way the instrument writes it: ten fractional
/// digits and a signed two-digit exponent, e.g. `1.0000000000E+07`.
fn render_clock(clock_hz: f64) -> String {
    let s = format!("{clock_hz:.10E}");
    match s.split_once('E') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{mantissa}E{sign}{digits:0>2}")
        }
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waveform(markers: &[bool]) -> Waveform {
        Waveform::new(vec![0.0; markers.len()], markers.iter().copied().collect())
            .expect("valid waveform")
    }

    #[rstest::rstest]
    #[test]
    #[case("1.0000000000E+07", 1e7)]
    #[case("2.5000000000E+06", 2.5e6)]
    #[case("1.0000000000E+00", 1.0)]
    #[case("5.0000000000E-01", 0.5)]
    #[case("1.0000000000E+10", 1e10)]
    fn clock_rendering(#[case] expected: &str, #[case] clock_hz: f64) {
        assert_eq!(expected, render_clock(clock_hz));
    }

    #[test]
    fn encode_layout() -> anyhow::Result<()> {
        let wfm = waveform(&[true, false]);
        let encoded = wfm.encode(1e7)?;
        let mut expected = b"MAGIC 1000\r\n#210".to_vec();
        expected.extend_from_slice(&0f32.to_le_bytes());
        expected.push(0x01);
        expected.extend_from_slice(&0f32.to_le_bytes());
        expected.push(0x00);
        expected.extend_from_slice(b"CLOCK 1.0000000000E+07\r\n");
        assert_eq!(expected, encoded);
        Ok(())
    }

    #[test]
    fn decode_round_trip() -> anyhow::Result<()> {
        let wfm = Waveform::new(
            vec![0.0, 0.5, -1.0, 1.0],
            [true, true, false, true].iter().copied().collect(),
        )?;
        let (decoded, clock_hz) = Waveform::decode(&wfm.encode(2.5e6)?)?;
        assert_eq!(wfm, decoded);
        assert_eq!(2.5e6, clock_hz);
        Ok(())
    }

    #[test]
    fn new_rejects_length_mismatch() {
        assert_eq!(
            Err(FormatError::LengthMismatch {
                samples: 2,
                markers: 3,
            }),
            Waveform::new(vec![0.0; 2], BitVec::from_elem(3, false)).map(|_| ())
        );
    }

    #[test]
    fn new_rejects_empty() {
        assert_eq!(
            Err(FormatError::EmptyWaveform),
            Waveform::new(vec![], BitVec::new()).map(|_| ())
        );
    }

    #[test]
    fn new_rejects_oversized() {
        let n = WFM_MEMORY_SAMPLES + 1;
        assert_eq!(
            Err(FormatError::WaveformTooLong(n)),
            Waveform::new(vec![0.0; n], BitVec::from_elem(n, false)).map(|_| ())
        );
    }

    #[rstest::rstest]
    #[test]
    #[case(0.0)]
    #[case(-1e7)]
    #[case(f64::NAN)]
    #[case(f64::INFINITY)]
    fn encode_rejects_bad_clock(#[case] clock_hz: f64) {
        assert!(matches!(
            waveform(&[true]).encode(clock_hz),
            Err(FormatError::InvalidClock(_))
        ));
    }

    #[rstest::rstest]
    #[test]
    #[case(b"MAGIC 2000\r\n".as_slice())]
    #[case(b"MAGIC 1000\r\n".as_slice())]
    #[case(b"MAGIC 1000\r\n15".as_slice())]
    #[case(b"MAGIC 1000\r\n#05".as_slice())]
    #[case(b"MAGIC 1000\r\n#15".as_slice())]
    #[case(b"MAGIC 1000\r\n#2x5".as_slice())]
    #[case(b"MAGIC 1000\r\n#14\x00\x00\x00\x00CLOCK 1.0000000000E+07\r\n".as_slice())]
    fn decode_rejects_malformed(#[case] data: &[u8]) {
        assert!(matches!(
            Waveform::decode(data),
            Err(FormatError::Malformed {
                kind: "waveform",
                ..
            })
        ));
    }

    #[test]
    fn decode_rejects_reserved_marker_bits() -> anyhow::Result<()> {
        let mut encoded = waveform(&[true]).encode(1e7)?;
        // the marker byte of the single record
        let marker_at = b"MAGIC 1000\r\n#15".len() + 4;
        encoded[marker_at] = 0x40;
        assert!(matches!(
            Waveform::decode(&encoded),
            Err(FormatError::Malformed {
                kind: "waveform",
                ..
            })
        ));
        Ok(())
    }

    #[rstest::rstest]
    #[test]
    #[case(b"".as_slice())]
    #[case(b"FREQ 1.0000000000E+07\r\n".as_slice())]
    #[case(b"CLOCK 1.0000000000E+07".as_slice())]
    #[case(b"CLOCK fast\r\n".as_slice())]
    fn decode_rejects_bad_trailer(#[case] trailer: &[u8]) -> anyhow::Result<()> {
        let mut data = b"MAGIC 1000\r\n#15".to_vec();
        data.extend_from_slice(&[0u8; 5]);
        data.extend_from_slice(trailer);
        assert!(matches!(
            Waveform::decode(&data),
            Err(FormatError::Malformed {
                kind: "waveform",
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn decode_rejects_nonpositive_clock() -> anyhow::Result<()> {
        let mut data = b"MAGIC 1000\r\n#15".to_vec();
        data.extend_from_slice(&[0u8; 5]);
        data.extend_from_slice(b"CLOCK -1.0000000000E+07\r\n");
        assert_eq!(
            Err(FormatError::InvalidClock(-1e7)),
            Waveform::decode(&data).map(|_| ())
        );
        Ok(())
    }

    #[test]
    fn decode_tolerates_marker_2() -> anyhow::Result<()> {
        // files written by other tools may drive marker 2; only marker 1 is
        // the channel's logical marker line
        let mut data = b"MAGIC 1000\r\n#15".to_vec();
        data.extend_from_slice(&1f32.to_le_bytes());
        data.push(0b10);
        data.extend_from_slice(b"CLOCK 1.0000000000E+07\r\n");
        let (wfm, _) = Waveform::decode(&data)?;
        assert!(!wfm.markers()[0]);
        Ok(())
    }
}
