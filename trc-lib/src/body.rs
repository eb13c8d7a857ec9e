//! Decoding of the sections following the descriptor block.
use std::io::Read;

use ndarray::{Array1, Array2, ShapeBuilder};
use serde::Serialize;
use tracing::trace;

use crate::bytes::read_section;
use crate::descriptor::Descriptor;
use crate::prelude::*;
use crate::samples::Samples;
use crate::wavedesc::ByteOrder;

/// Raw ADC counts, in the sample width declared by the descriptor.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum RawSamples {
    Int8(Samples<i8>),
    Int16(Samples<i16>),
}

impl RawSamples {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            RawSamples::Int8(s) => s.len(),
            RawSamples::Int16(s) => s.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        match self {
            RawSamples::Int8(s) => s.shape(),
            RawSamples::Int16(s) => s.shape(),
        }
    }

    /// Apply the affine transform `x * gain + offset` to every sample.
    #[must_use]
    pub fn scale(&self, gain: f64, offset: f64) -> Samples<f64> {
        match self {
            RawSamples::Int8(s) => s.map(|x| f64::from(*x) * gain + offset),
            RawSamples::Int16(s) => s.map(|x| f64::from(*x) * gain + offset),
        }
    }
}

/// Arrays decoded from the sections following a descriptor.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Body {
    /// Shape (2, segments). Row 0 holds the trigger offset of each segment, row 1 the
    /// interval to the next trigger.
    pub trigger_times: Array2<f64>,
    pub samples: RawSamples,
}

impl Body {
    /// Zero length arrays of the types declared by `desc`.
    #[must_use]
    pub fn empty(desc: &Descriptor) -> Self {
        let samples = if desc.sample_width() == 1 {
            RawSamples::Int8(Samples::Single(Array1::zeros(0)))
        } else {
            RawSamples::Int16(Samples::Single(Array1::zeros(0)))
        };
        Body {
            trigger_times: Array2::zeros((2, 0)),
            samples,
        }
    }

    /// Read the user text, trigger time and sample sections described by `desc`.
    ///
    /// `reader` must be positioned immediately after the descriptor block. With
    /// `header_only` nothing is read and empty arrays are returned.
    ///
    /// # Errors
    /// [Error::Truncated] if any section is shorter than declared, [Error::Format] if the
    /// declared lengths cannot describe the arrays, or any IO error.
    pub fn read<R: Read>(reader: &mut R, desc: &Descriptor, header_only: bool) -> Result<Self> {
        if header_only {
            return Ok(Self::empty(desc));
        }

        let user_text = desc.user_text_len()?;
        if user_text != 0 {
            trace!("skipping {user_text} bytes of user text");
            read_section(reader, user_text, "user_text")?;
        }

        let buf = read_section(reader, desc.trig_time_len()?, "trig_time_array")?;
        let trigger_times = decode_trigger_times(&buf, desc.byte_order)?;
        trace!("decoded {} trigger times", trigger_times.ncols());

        let buf = read_section(reader, desc.sample_bytes()?, "wave_array")?;
        let samples = if desc.sample_width() == 1 {
            RawSamples::Int8(reshape(decode_i8(&buf), desc)?)
        } else {
            RawSamples::Int16(reshape(decode_i16(&buf, desc.byte_order), desc)?)
        };
        trace!("decoded samples with shape {:?}", samples.shape());

        Ok(Body {
            trigger_times,
            samples,
        })
    }
}

fn decode_f64(buf: &[u8], order: ByteOrder) -> Vec<f64> {
    buf.chunks_exact(8)
        .map(|c| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(c);
            match order {
                ByteOrder::Big => f64::from_be_bytes(raw),
                ByteOrder::Little => f64::from_le_bytes(raw),
            }
        })
        .collect()
}

fn decode_i8(buf: &[u8]) -> Vec<i8> {
    buf.iter().map(|b| i8::from_ne_bytes([*b])).collect()
}

fn decode_i16(buf: &[u8], order: ByteOrder) -> Vec<i16> {
    buf.chunks_exact(2)
        .map(|c| match order {
            ByteOrder::Big => i16::from_be_bytes([c[0], c[1]]),
            ByteOrder::Little => i16::from_le_bytes([c[0], c[1]]),
        })
        .collect()
}

/// Trigger times are stored as (offset, interval) pairs per segment.
fn decode_trigger_times(buf: &[u8], order: ByteOrder) -> Result<Array2<f64>> {
    if buf.len() % 16 != 0 {
        return Err(Error::Format(format!(
            "trig_time_array length {} is not a multiple of 16",
            buf.len()
        )));
    }
    let values = decode_f64(buf, order);
    let num = values.len() / 2;
    // pairs are contiguous, i.e., column-major for shape (2, num)
    Array2::from_shape_vec((2, num).f(), values).map_err(|e| Error::Format(e.to_string()))
}

fn reshape<T>(values: Vec<T>, desc: &Descriptor) -> Result<Samples<T>> {
    if !desc.is_sequence() {
        return Ok(Samples::Single(Array1::from_vec(values)));
    }
    let rows = desc.segment_count();
    if values.len() % rows != 0 {
        return Err(Error::Format(format!(
            "{} samples cannot be split into {rows} segments",
            values.len()
        )));
    }
    let cols = values.len() / rows;
    Array2::from_shape_vec((rows, cols), values)
        .map(Samples::Segmented)
        .map_err(|e| Error::Format(e.to_string()))
}
