#![doc = include_str!("../README.md")]

mod bytes;
mod error;

pub mod body;
pub mod columns;
pub mod descriptor;
pub mod group;
pub mod samples;
pub mod source;
pub mod trace;
pub mod wavedesc;

#[cfg(test)]
mod testutil;

/// Oscilloscope input channel number, starting at 1.
pub type Channel = u32;

pub use body::RawSamples;
pub use columns::Columns;
pub use descriptor::{Descriptor, Processing, RecordType, TimeBase, VertCoupling};
pub use error::{Error, Result};
pub use group::TraceGroup;
pub use samples::Samples;
pub use source::Source;
pub use trace::{ReadOptions, Trace};
pub use wavedesc::{ByteOrder, TriggerTime, WaveDesc};

mod prelude {
    pub(crate) use crate::error::{Error, Result};
}
