//! The fixed `WAVEDESC` block.
//!
//! The block layout is given by [SCHEMA], an ordered list of field names and their binary
//! encodings. Field order defines byte offsets and never changes. The [WaveDesc] record is
//! generated from the same table so positional decoding and named access cannot drift apart.
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::prelude::*;

/// Byte order of every multi-byte value following the marker.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    Big,
    Little,
}

impl ByteOrder {
    /// Select the byte order from the raw bytes of the `comm_order` field.
    ///
    /// A value of 0 means big-endian (`HIFIRST`) and is 0 regardless of the order used
    /// to read it, so any other bit pattern selects little-endian (`LOFIRST`).
    #[must_use]
    pub fn from_comm_order(raw: [u8; 2]) -> Self {
        let big = i16::from_be_bytes(raw);
        let little = i16::from_le_bytes(raw);
        if big == 0 && little == 0 {
            ByteOrder::Big
        } else {
            ByteOrder::Little
        }
    }

    /// The `comm_order` value written for this byte order.
    #[must_use]
    pub fn comm_order(self) -> i16 {
        match self {
            ByteOrder::Big => 0,
            ByteOrder::Little => 1,
        }
    }
}

/// Binary encoding of a single descriptor field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Signed 16-bit integer
    Short,
    /// Signed 32-bit integer
    Long,
    /// 32-bit float
    Float,
    /// 64-bit float
    Double,
    /// NUL padded ASCII of the given length
    Text(usize),
    /// 64-bit float seconds, four 8-bit integers and two 16-bit integers
    TriggerTime,
}

impl Encoding {
    /// Width of the encoded value in bytes.
    #[must_use]
    pub const fn width(&self) -> usize {
        match self {
            Encoding::Short => 2,
            Encoding::Long | Encoding::Float => 4,
            Encoding::Double => 8,
            Encoding::Text(n) => *n,
            Encoding::TriggerTime => TriggerTime::LEN,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub encoding: Encoding,
}

/// A decoded field value, as returned by [WaveDesc::field].
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Text(String),
    Time(TriggerTime),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:e}"),
            Value::Text(v) => f.write_str(v),
            Value::Time(v) => match v.iso8601() {
                Some(s) => write!(f, "{s} (+{:.6}s)", v.subsec()),
                None => write!(f, "{v:?}"),
            },
        }
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(v.into())
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<TriggerTime> for Value {
    fn from(v: TriggerTime) -> Self {
        Value::Time(v)
    }
}

/// Trigger time stamp of the acquisition.
///
/// Stored on disk as seconds (f64), minutes, hours, days, months (i8 each), year and an
/// unused word (i16 each).
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct TriggerTime {
    pub seconds: f64,
    pub minutes: i8,
    pub hours: i8,
    pub days: i8,
    pub months: i8,
    pub year: i16,
    pub unused: i16,
}

impl TriggerTime {
    pub const LEN: usize = 16;

    /// Calendar time truncated to whole seconds, or `None` if the stored components do
    /// not form a valid date and time.
    ///
    /// The instrument records the seconds with sub-second resolution; that part is not
    /// included here, see [TriggerTime::subsec].
    #[must_use]
    pub fn datetime(&self) -> Option<NaiveDateTime> {
        if !self.seconds.is_finite() || self.seconds < 0.0 {
            return None;
        }
        let month = u32::try_from(self.months).ok()?;
        let day = u32::try_from(self.days).ok()?;
        let hour = u32::try_from(self.hours).ok()?;
        let min = u32::try_from(self.minutes).ok()?;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let sec = self.seconds.trunc() as u32;
        NaiveDate::from_ymd_opt(self.year.into(), month, day)?.and_hms_opt(hour, min, sec)
    }

    /// Fractional seconds dropped by [TriggerTime::datetime].
    #[must_use]
    pub fn subsec(&self) -> f64 {
        self.seconds.fract()
    }

    /// ISO-8601 representation with second precision.
    #[must_use]
    pub fn iso8601(&self) -> Option<String> {
        self.datetime()
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S").to_string())
    }
}

/// Reads fields from a complete descriptor block in schema order.
struct Unpacker<'a> {
    buf: &'a [u8; DESCRIPTOR_LEN],
    pos: usize,
    order: ByteOrder,
    // offset of the first text field holding non-ASCII bytes
    bad_text: Option<usize>,
}

impl<'a> Unpacker<'a> {
    fn new(buf: &'a [u8; DESCRIPTOR_LEN], order: ByteOrder) -> Self {
        Self {
            buf,
            pos: 0,
            order,
            bad_text: None,
        }
    }

    fn finish(self) -> Result<()> {
        match self.bad_text {
            Some(offset) => Err(Error::Format(format!(
                "text field at offset {offset} is not ASCII"
            ))),
            None => Ok(()),
        }
    }

    // Offsets are bounded by DESCRIPTOR_LEN, which is the sum of all schema widths.
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    fn i8(&mut self) -> i8 {
        i8::from_ne_bytes(self.take())
    }

    fn i16(&mut self) -> i16 {
        let raw = self.take();
        match self.order {
            ByteOrder::Big => i16::from_be_bytes(raw),
            ByteOrder::Little => i16::from_le_bytes(raw),
        }
    }

    fn i32(&mut self) -> i32 {
        let raw = self.take();
        match self.order {
            ByteOrder::Big => i32::from_be_bytes(raw),
            ByteOrder::Little => i32::from_le_bytes(raw),
        }
    }

    fn f32(&mut self) -> f32 {
        let raw = self.take();
        match self.order {
            ByteOrder::Big => f32::from_be_bytes(raw),
            ByteOrder::Little => f32::from_le_bytes(raw),
        }
    }

    fn f64(&mut self) -> f64 {
        let raw = self.take();
        match self.order {
            ByteOrder::Big => f64::from_be_bytes(raw),
            ByteOrder::Little => f64::from_le_bytes(raw),
        }
    }

    fn text(&mut self, len: usize) -> String {
        let raw = &self.buf[self.pos..self.pos + len];
        if !raw.is_ascii() && self.bad_text.is_none() {
            self.bad_text = Some(self.pos);
        }
        self.pos += len;
        String::from_utf8_lossy(raw).trim_matches('\0').to_string()
    }

    fn text16(&mut self) -> String {
        self.text(16)
    }

    fn text48(&mut self) -> String {
        self.text(48)
    }

    fn time(&mut self) -> TriggerTime {
        TriggerTime {
            seconds: self.f64(),
            minutes: self.i8(),
            hours: self.i8(),
            days: self.i8(),
            months: self.i8(),
            year: self.i16(),
            unused: self.i16(),
        }
    }
}

/// Writes fields in schema order.
struct Packer {
    out: Vec<u8>,
    order: ByteOrder,
}

impl Packer {
    fn i8(&mut self, v: i8) {
        self.out.extend(v.to_ne_bytes());
    }

    fn i16(&mut self, v: &i16) {
        match self.order {
            ByteOrder::Big => self.out.extend(v.to_be_bytes()),
            ByteOrder::Little => self.out.extend(v.to_le_bytes()),
        }
    }

    fn i32(&mut self, v: &i32) {
        match self.order {
            ByteOrder::Big => self.out.extend(v.to_be_bytes()),
            ByteOrder::Little => self.out.extend(v.to_le_bytes()),
        }
    }

    fn f32(&mut self, v: &f32) {
        match self.order {
            ByteOrder::Big => self.out.extend(v.to_be_bytes()),
            ByteOrder::Little => self.out.extend(v.to_le_bytes()),
        }
    }

    fn f64(&mut self, v: &f64) {
        match self.order {
            ByteOrder::Big => self.out.extend(v.to_be_bytes()),
            ByteOrder::Little => self.out.extend(v.to_le_bytes()),
        }
    }

    fn text(&mut self, v: &str, len: usize) {
        let mut raw = v.as_bytes().to_vec();
        raw.resize(len, 0);
        self.out.extend(raw);
    }

    fn text16(&mut self, v: &str) {
        self.text(v, 16);
    }

    fn text48(&mut self, v: &str) {
        self.text(v, 48);
    }

    fn time(&mut self, v: &TriggerTime) {
        self.f64(&v.seconds);
        self.i8(v.minutes);
        self.i8(v.hours);
        self.i8(v.days);
        self.i8(v.months);
        self.i16(&v.year);
        self.i16(&v.unused);
    }
}

macro_rules! field_type {
    (i16) => { i16 };
    (i32) => { i32 };
    (f32) => { f32 };
    (f64) => { f64 };
    (text16) => { String };
    (text48) => { String };
    (time) => { TriggerTime };
}

macro_rules! field_encoding {
    (i16) => { Encoding::Short };
    (i32) => { Encoding::Long };
    (f32) => { Encoding::Float };
    (f64) => { Encoding::Double };
    (text16) => { Encoding::Text(16) };
    (text48) => { Encoding::Text(48) };
    (time) => { Encoding::TriggerTime };
}

/// Generates [SCHEMA] and the [WaveDesc] record, including positional unpacking, packing
/// and access by name, from a single ordered field list.
macro_rules! wavedesc {
    ($($(#[$doc:meta])* $name:ident: $enc:ident,)*) => {
        /// Ordered `WAVEDESC` fields. Order defines byte offsets.
        pub const SCHEMA: &[Field] = &[
            $(Field { name: stringify!($name), encoding: field_encoding!($enc) },)*
        ];

        /// Every field of the fixed `WAVEDESC` block, undecoded beyond its binary
        /// encoding.
        #[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
        pub struct WaveDesc {
            $($(#[$doc])* pub $name: field_type!($enc),)*
        }

        impl WaveDesc {
            /// Unpack all fields from a descriptor block using `order`.
            ///
            /// # Errors
            /// [Error::Format] if a text field contains non-ASCII bytes.
            pub fn unpack(buf: &[u8; DESCRIPTOR_LEN], order: ByteOrder) -> Result<Self> {
                let mut u = Unpacker::new(buf, order);
                let wd = Self {
                    $($name: u.$enc(),)*
                };
                u.finish()?;
                Ok(wd)
            }

            /// Pack all fields into a descriptor block using `order`. Text longer than its
            /// field is truncated.
            #[must_use]
            pub fn pack(&self, order: ByteOrder) -> Vec<u8> {
                let mut p = Packer {
                    out: Vec::with_capacity(DESCRIPTOR_LEN),
                    order,
                };
                $(p.$enc(&self.$name);)*
                p.out
            }

            /// Lookup a field value by its schema name.
            #[must_use]
            pub fn field(&self, name: &str) -> Option<Value> {
                match name {
                    $(stringify!($name) => Some(Value::from(self.$name.clone())),)*
                    _ => None,
                }
            }
        }
    };
}

wavedesc! {
    /// Always `WAVEDESC`
    descriptor_name: text16,
    template_name: text16,
    /// 0 for 8-bit samples, 1 for 16-bit samples
    comm_type: i16,
    /// 0 for big-endian, 1 for little-endian
    comm_order: i16,
    /// Length in bytes of this block
    wave_descriptor: i32,
    /// Length in bytes of the user text block
    user_text: i32,
    res_desc1: i32,
    /// Length in bytes of the trigger time array
    trig_time_array: i32,
    ris_time_array: i32,
    res_array1: i32,
    /// Length in bytes of the first sample array
    wave_array_1: i32,
    wave_array_2: i32,
    res_array2: i32,
    res_array3: i32,
    instrument_name: text16,
    instrument_number: i32,
    trace_label: text16,
    reserved1: i16,
    reserved2: i16,
    /// Number of samples in the sample array
    wave_array_count: i32,
    points_per_screen: i32,
    first_valid_point: i32,
    last_valid_point: i32,
    first_point: i32,
    sparsing_factor: i32,
    segment_index: i32,
    /// Number of segments in a sequence acquisition
    subarray_count: i32,
    sweeps_per_acq: i32,
    points_per_pair: i16,
    pair_offset: i16,
    vertical_gain: f32,
    vertical_offset: f32,
    max_value: f32,
    min_value: f32,
    nominal_bits: i16,
    nom_subarray_count: i16,
    /// Sampling interval in seconds
    horiz_interval: f32,
    /// Time of the first sample relative to the trigger
    horiz_offset: f64,
    pixel_offset: f64,
    vert_unit: text48,
    horiz_unit: text48,
    horiz_uncertainty: f32,
    trigger_time: time,
    acq_duration: f32,
    record_type: i16,
    processing_done: i16,
    reserved5: i16,
    ris_sweeps: i16,
    time_base: i16,
    vert_coupling: i16,
    probe_att: f32,
    fixed_vert_gain: i16,
    bandwidth_limit: i16,
    vertical_vernier: f32,
    acq_vert_offset: f32,
    wave_source: i16,
}

const fn schema_len(schema: &[Field]) -> usize {
    let mut len = 0;
    let mut i = 0;
    while i < schema.len() {
        len += schema[i].encoding.width();
        i += 1;
    }
    len
}

/// Size in bytes of the fixed descriptor block, marker included.
pub const DESCRIPTOR_LEN: usize = schema_len(SCHEMA);

/// Offset of `comm_order` within the descriptor block.
pub(crate) const COMM_ORDER_OFFSET: usize = 34;

/// Byte offset of the named field within the descriptor block.
#[must_use]
pub fn offset_of(name: &str) -> Option<usize> {
    let mut offset = 0;
    for field in SCHEMA {
        if field.name == name {
            return Some(offset);
        }
        offset += field.encoding.width();
    }
    None
}

impl WaveDesc {
    /// All fields as `(name, value)` pairs in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, Value)> + '_ {
        SCHEMA
            .iter()
            .filter_map(|f| self.field(f.name).map(|v| (f.name, v)))
    }
}
