//! Descriptor decoding.
//!
//! Locates the `WAVEDESC` block in a byte stream, selects the byte order and translates the
//! enumerated fields into their meanings.
use std::fmt::Display;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Serialize, Serializer};
use tracing::{debug, warn};

use crate::bytes::{read_section, Bytes};
use crate::prelude::*;
use crate::wavedesc::{ByteOrder, TriggerTime, WaveDesc, COMM_ORDER_OFFSET, DESCRIPTOR_LEN};

/// Token starting every descriptor block.
pub const MARKER: &[u8; 8] = b"WAVEDESC";

/// Generates an enumeration over a fixed code table. Every variant keeps its own code, so
/// codes sharing a label still round-trip.
macro_rules! code_enum {
    ($(#[$doc:meta])* $name:ident, $field:literal { $($variant:ident = $code:literal => $label:literal,)* }) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant,)*
        }

        impl $name {
            /// Raw code as stored in the descriptor.
            #[must_use]
            pub fn code(self) -> i16 {
                match self {
                    $($name::$variant => $code,)*
                }
            }

            /// Vendor label for this code.
            #[must_use]
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)*
                }
            }
        }

        impl TryFrom<i16> for $name {
            type Error = Error;

            fn try_from(code: i16) -> Result<Self> {
                match code {
                    $($code => Ok($name::$variant),)*
                    _ => Err(Error::InvalidCode { field: $field, code }),
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
                s.serialize_str(self.label())
            }
        }
    };
}

code_enum! {
    /// Kind of record stored in the file.
    RecordType, "record_type" {
        SingleSweep = 0 => "single_sweep",
        Interleaved = 1 => "interleaved",
        Histogram = 2 => "histogram",
        Graph = 3 => "graph",
        FilterCoefficient = 4 => "filter_coefficient",
        Complex = 5 => "complex",
        Extrema = 6 => "extrema",
        SequenceObsolete = 7 => "sequence_obsolete",
        CenteredRis = 8 => "centered_RIS",
        PeakDetect = 9 => "peak_detect",
    }
}

code_enum! {
    /// Processing applied to the samples.
    Processing, "processing_done" {
        NoProcessing = 0 => "no_processing",
        FirFilter = 1 => "fir_filter",
        Interpolated = 2 => "interpolated",
        Sparsed = 3 => "sparsed",
        Autoscaled = 4 => "autoscaled",
        NoResult = 5 => "no_result",
        Rolling = 6 => "rolling",
        Cumulative = 7 => "cumulative",
    }
}

code_enum! {
    /// Vertical input coupling. Codes 1 and 3 both mean ground.
    VertCoupling, "vert_coupling" {
        Dc50Ohm = 0 => "DC_50_Ohms",
        Ground = 1 => "ground",
        Dc1MOhm = 2 => "DC_1MOhm",
        GroundAlt = 3 => "ground",
        Ac1MOhm = 4 => "AC_1MOhm",
    }
}

const MAGNITUDES: [u16; 9] = [1, 2, 5, 10, 20, 50, 100, 200, 500];
const TIME_PREFIXES: [&str; 6] = ["p", "n", "µ", "m", "", "k"];
const GAIN_PREFIXES: [&str; 4] = ["µ", "m", "", "k"];

/// A per-division scale setting decoded from a magnitude/prefix code, where the magnitude
/// is selected by `code % 9` and the prefix by `code / 9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale {
    code: i16,
    pub magnitude: u16,
    pub prefix: &'static str,
    pub unit: &'static str,
}

impl Scale {
    fn decode(
        field: &'static str,
        code: i16,
        prefixes: &[&'static str],
        unit: &'static str,
    ) -> Result<Self> {
        let invalid = || Error::InvalidCode { field, code };
        let idx = usize::try_from(code).map_err(|_| invalid())?;
        let prefix = *prefixes.get(idx / MAGNITUDES.len()).ok_or_else(invalid)?;
        Ok(Scale {
            code,
            magnitude: MAGNITUDES[idx % MAGNITUDES.len()],
            prefix,
            unit,
        })
    }

    #[must_use]
    pub fn code(&self) -> i16 {
        self.code
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}{} / div", self.magnitude, self.prefix, self.unit)
    }
}

impl Serialize for Scale {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Horizontal time base setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBase {
    PerDiv(Scale),
    External,
}

impl TimeBase {
    /// Code used for an external time base.
    pub const EXTERNAL: i16 = 100;

    /// Decode a `time_base` code.
    ///
    /// # Errors
    /// [Error::InvalidCode] if the code is neither external nor within the per-division
    /// table.
    pub fn decode(code: i16) -> Result<Self> {
        if code == Self::EXTERNAL {
            return Ok(TimeBase::External);
        }
        Ok(TimeBase::PerDiv(Scale::decode(
            "time_base",
            code,
            &TIME_PREFIXES,
            "s",
        )?))
    }

    #[must_use]
    pub fn code(&self) -> i16 {
        match self {
            TimeBase::PerDiv(scale) => scale.code(),
            TimeBase::External => Self::EXTERNAL,
        }
    }
}

impl Display for TimeBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeBase::PerDiv(scale) => scale.fmt(f),
            TimeBase::External => f.write_str("external"),
        }
    }
}

impl Serialize for TimeBase {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

/// Decode a `fixed_vert_gain` code.
///
/// # Errors
/// [Error::InvalidCode] if the code is outside the gain table.
pub fn decode_vert_gain(code: i16) -> Result<Scale> {
    Scale::decode("fixed_vert_gain", code, &GAIN_PREFIXES, "V")
}

/// A decoded waveform descriptor.
///
/// Holds every raw field in [Descriptor::wavedesc] together with the byte order in effect
/// and the decoded enumerations. Constructed once per read and never modified.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub byte_order: ByteOrder,
    pub record_type: RecordType,
    pub processing_done: Processing,
    pub vert_coupling: VertCoupling,
    pub time_base: TimeBase,
    pub fixed_vert_gain: Scale,
    pub wavedesc: WaveDesc,
}

impl Descriptor {
    /// Decode a complete descriptor block starting with [MARKER].
    ///
    /// # Errors
    /// [Error::MissingMarker] if `buf` does not start with the marker,
    /// [Error::Format] if a text field is not ASCII, or [Error::InvalidCode] if an
    /// enumerated field is outside of its table.
    pub fn decode(buf: &[u8; DESCRIPTOR_LEN]) -> Result<Self> {
        if !buf.starts_with(MARKER) {
            return Err(Error::MissingMarker);
        }
        let byte_order = ByteOrder::from_comm_order([
            buf[COMM_ORDER_OFFSET],
            buf[COMM_ORDER_OFFSET + 1],
        ]);
        let wavedesc = WaveDesc::unpack(buf, byte_order)?;

        Ok(Descriptor {
            byte_order,
            record_type: RecordType::try_from(wavedesc.record_type)?,
            processing_done: Processing::try_from(wavedesc.processing_done)?,
            vert_coupling: VertCoupling::try_from(wavedesc.vert_coupling)?,
            time_base: TimeBase::decode(wavedesc.time_base)?,
            fixed_vert_gain: decode_vert_gain(wavedesc.fixed_vert_gain)?,
            wavedesc,
        })
    }

    /// Locate the marker in `bytes` and decode the descriptor block following it.
    pub(crate) fn scan<R: Read>(bytes: &mut Bytes<R>) -> Result<Self> {
        let offset = bytes.scan(MARKER)?;
        let rest = read_section(bytes, DESCRIPTOR_LEN - MARKER.len(), "descriptor")?;
        let mut buf = [0u8; DESCRIPTOR_LEN];
        buf[..MARKER.len()].copy_from_slice(MARKER);
        buf[MARKER.len()..].copy_from_slice(&rest);

        let desc = Self::decode(&buf)?;
        debug!(
            "descriptor at offset {offset}: byte_order={:?} comm_type={} segments={} samples={}",
            desc.byte_order,
            desc.wavedesc.comm_type,
            desc.wavedesc.subarray_count,
            desc.wavedesc.wave_array_count,
        );
        if let Ok(n) = desc.sample_bytes() {
            if usize::try_from(desc.wavedesc.wave_array_1).ok() != Some(n) {
                warn!(
                    "wave_array_1={} does not match {} samples of {} bytes",
                    desc.wavedesc.wave_array_1,
                    desc.wavedesc.wave_array_count,
                    desc.sample_width()
                );
            }
        }
        Ok(desc)
    }

    /// Read only the descriptor from `reader`, which may contain any number of bytes
    /// before the marker.
    ///
    /// # Errors
    /// [Error::MissingMarker] if no marker is found, [Error::Truncated] if the input ends
    /// inside the descriptor block, or any decode error.
    pub fn read<R: Read>(reader: R) -> Result<Self> {
        Self::scan(&mut Bytes::new(reader))
    }

    /// Read only the descriptor from the file at `path`.
    ///
    /// # Errors
    /// See [Descriptor::read].
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }

    /// Number of bytes per sample.
    #[must_use]
    pub fn sample_width(&self) -> usize {
        if self.wavedesc.comm_type == 0 {
            1
        } else {
            2
        }
    }

    /// True if this descriptor describes a sequence (segmented) acquisition.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.wavedesc.subarray_count > 1
    }

    /// Number of segments, 1 for a non-segmented acquisition.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        if self.is_sequence() {
            usize::try_from(self.wavedesc.subarray_count).unwrap_or(1)
        } else {
            1
        }
    }

    /// Length in bytes of the user text block.
    ///
    /// # Errors
    /// [Error::Format] if the stored length is negative.
    pub fn user_text_len(&self) -> Result<usize> {
        section_len("user_text", self.wavedesc.user_text)
    }

    /// Length in bytes of the trigger time array.
    ///
    /// # Errors
    /// [Error::Format] if the stored length is negative.
    pub fn trig_time_len(&self) -> Result<usize> {
        section_len("trig_time_array", self.wavedesc.trig_time_array)
    }

    /// Number of samples over all segments.
    ///
    /// # Errors
    /// [Error::Format] if the stored count is negative.
    pub fn sample_count(&self) -> Result<usize> {
        section_len("wave_array_count", self.wavedesc.wave_array_count)
    }

    /// Length in bytes of the sample array.
    ///
    /// # Errors
    /// [Error::Format] if the stored count is negative or the length overflows.
    pub fn sample_bytes(&self) -> Result<usize> {
        self.sample_count()?
            .checked_mul(self.sample_width())
            .ok_or_else(|| Error::Format("sample array length overflows".to_string()))
    }

    #[must_use]
    pub fn vertical_gain(&self) -> f64 {
        self.wavedesc.vertical_gain.into()
    }

    #[must_use]
    pub fn vertical_offset(&self) -> f64 {
        self.wavedesc.vertical_offset.into()
    }

    #[must_use]
    pub fn horiz_interval(&self) -> f64 {
        self.wavedesc.horiz_interval.into()
    }

    #[must_use]
    pub fn horiz_offset(&self) -> f64 {
        self.wavedesc.horiz_offset
    }

    #[must_use]
    pub fn trigger_time(&self) -> &TriggerTime {
        &self.wavedesc.trigger_time
    }
}

fn section_len(field: &str, len: i32) -> Result<usize> {
    usize::try_from(len).map_err(|_| Error::Format(format!("negative {field} length {len}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::sample_wavedesc;
    use test_case::test_case;

    #[test_case(0, "1 ps / div")]
    #[test_case(16, "200 ns / div")]
    #[test_case(22, "20 µs / div")]
    #[test_case(29, "5 ms / div")]
    #[test_case(44, "500 s / div")]
    #[test_case(53, "500 ks / div")]
    #[test_case(100, "external")]
    fn time_base(code: i16, expected: &str) {
        let tb = TimeBase::decode(code).unwrap();
        assert_eq!(tb.to_string(), expected);
        assert_eq!(tb.code(), code);
    }

    #[test_case(-1)]
    #[test_case(54)]
    #[test_case(99)]
    fn time_base_out_of_range(code: i16) {
        assert!(matches!(
            TimeBase::decode(code),
            Err(Error::InvalidCode {
                field: "time_base",
                ..
            })
        ));
    }

    #[test_case(0, "1 µV / div")]
    #[test_case(18, "1 V / div")]
    #[test_case(35, "500 kV / div")]
    fn vert_gain(code: i16, expected: &str) {
        assert_eq!(decode_vert_gain(code).unwrap().to_string(), expected);
    }

    #[test]
    fn vert_gain_out_of_range() {
        assert!(matches!(
            decode_vert_gain(36),
            Err(Error::InvalidCode {
                field: "fixed_vert_gain",
                code: 36
            })
        ));
    }

    #[test]
    fn coupling_ground_codes_are_distinct() {
        let a = VertCoupling::try_from(1).unwrap();
        let b = VertCoupling::try_from(3).unwrap();

        assert_eq!(a.label(), b.label());
        assert_ne!(a, b);
        assert_eq!(a.code(), 1);
        assert_eq!(b.code(), 3);
    }

    #[test]
    fn enum_tables() {
        assert_eq!(RecordType::try_from(9).unwrap(), RecordType::PeakDetect);
        assert!(RecordType::try_from(10).is_err());
        assert_eq!(Processing::try_from(7).unwrap().label(), "cumulative");
        assert!(Processing::try_from(8).is_err());
        assert!(VertCoupling::try_from(5).is_err());
    }

    #[test_case(ByteOrder::Big)]
    #[test_case(ByteOrder::Little)]
    fn decode_both_orders(order: ByteOrder) {
        let mut wd = sample_wavedesc();
        wd.comm_order = order.comm_order();
        let buf: [u8; DESCRIPTOR_LEN] = wd.pack(order).try_into().unwrap();

        let desc = Descriptor::decode(&buf).unwrap();

        assert_eq!(desc.byte_order, order);
        assert_eq!(desc.wavedesc, wd);
        assert_eq!(desc.time_base.to_string(), "200 ns / div");
        assert_eq!(desc.fixed_vert_gain.to_string(), "1 V / div");
        assert_eq!(desc.record_type, RecordType::SingleSweep);
        assert_eq!(desc.vert_coupling, VertCoupling::Dc50Ohm);
        assert_eq!(desc.segment_count(), 200);
        assert_eq!(desc.sample_bytes().unwrap(), 800_800);
    }

    #[test]
    fn decode_invalid_record_type() {
        let mut wd = sample_wavedesc();
        wd.record_type = 10;
        let buf: [u8; DESCRIPTOR_LEN] = wd.pack(ByteOrder::Little).try_into().unwrap();

        assert!(matches!(
            Descriptor::decode(&buf),
            Err(Error::InvalidCode {
                field: "record_type",
                code: 10
            })
        ));
    }

    #[test]
    fn read_with_preamble() {
        let wd = sample_wavedesc();
        let mut dat = b"C1:WF DAT1,#9000000000".to_vec();
        dat.extend(wd.pack(ByteOrder::Little));

        let desc = Descriptor::read(&dat[..]).unwrap();
        assert_eq!(desc.wavedesc, wd);
    }

    #[test]
    fn read_truncated_descriptor() {
        let wd = sample_wavedesc();
        let dat = wd.pack(ByteOrder::Little);

        let zult = Descriptor::read(&dat[..100]);
        assert!(
            matches!(
                zult,
                Err(Error::Truncated {
                    section: "descriptor",
                    expected: 338,
                    actual: 92
                })
            ),
            "got {zult:?}"
        );
    }

    #[test]
    fn read_missing_marker() {
        let dat = vec![0u8; 1024];
        assert!(matches!(Descriptor::read(&dat[..]), Err(Error::MissingMarker)));
    }

    #[test]
    fn negative_lengths() {
        let mut wd = sample_wavedesc();
        wd.user_text = -1;
        let buf: [u8; DESCRIPTOR_LEN] = wd.pack(ByteOrder::Little).try_into().unwrap();
        let desc = Descriptor::decode(&buf).unwrap();

        assert!(matches!(desc.user_text_len(), Err(Error::Format(_))));
    }
}
