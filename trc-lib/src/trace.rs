use std::fs::File;
use std::io::{BufReader, Read};
use std::iter::FusedIterator;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ndarray::{Array1, Array2, ArrayView1};
use regex::Regex;
use tracing::debug;
use typed_builder::TypedBuilder;

use crate::body::{Body, RawSamples};
use crate::bytes::Bytes;
use crate::descriptor::Descriptor;
use crate::prelude::*;
use crate::samples::Samples;
use crate::Channel;

/// Options controlling how a [Trace] is read.
///
/// # Example
/// ```
/// use trc::ReadOptions;
///
/// let opts = ReadOptions::builder().header_only(true).channel(2).build();
/// assert_eq!(opts.channel, Some(2));
/// ```
#[derive(TypedBuilder, Debug, Clone, Default)]
pub struct ReadOptions {
    /// Only decode the descriptor; sample and trigger time arrays are left empty.
    #[builder(default)]
    pub header_only: bool,
    /// Channel number to assign, overriding any channel inferred from the input.
    #[builder(default, setter(strip_option))]
    pub channel: Option<Channel>,
}

/// A single decoded waveform scaled to physical units.
///
/// # Example
/// ```no_run
/// use trc::{ReadOptions, Trace};
///
/// let trace = Trace::from_path("C2Trace00001.trc", &ReadOptions::default()).unwrap();
/// assert_eq!(trace.channel(), Some(2));
/// for (time, voltage) in &trace {
///     println!("{} samples starting at {}s", voltage.len(), time[0]);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Trace {
    descriptor: Descriptor,
    raw: RawSamples,
    trigger_times: Array2<f64>,
    voltage: Samples<f64>,
    time: Array1<f64>,
    channel: Option<Channel>,
    serial: Option<u32>,
    source: Option<PathBuf>,
}

impl Trace {
    fn new(descriptor: Descriptor, body: Body) -> Self {
        let voltage = body
            .samples
            .scale(descriptor.vertical_gain(), descriptor.vertical_offset());
        let interval = descriptor.horiz_interval();
        let offset = descriptor.horiz_offset();
        #[allow(clippy::cast_precision_loss)]
        let time = Array1::from_iter((0..voltage.row_len()).map(|k| k as f64 * interval + offset));

        Trace {
            descriptor,
            raw: body.samples,
            trigger_times: body.trigger_times,
            voltage,
            time,
            channel: None,
            serial: None,
            source: None,
        }
    }

    /// Decode a trace from `reader`. Bytes before the descriptor marker are skipped; if
    /// they start with an instrument response prefix such as `C2:WF` the channel is taken
    /// from it, unless [ReadOptions::channel] is set.
    ///
    /// # Errors
    /// [Error::InvalidArgument] for a zero channel option, otherwise any error decoding
    /// the descriptor or body.
    pub fn read<R: Read>(reader: R, opts: &ReadOptions) -> Result<Self> {
        validate_channel(opts.channel)?;
        let mut bytes = Bytes::new(reader);
        let descriptor = Descriptor::scan(&mut bytes)?;
        let body = Body::read(&mut bytes, &descriptor, opts.header_only)?;

        let mut trace = Trace::new(descriptor, body);
        trace.channel = match opts.channel {
            Some(channel) => Some(channel),
            None => channel_from_prefix(bytes.preamble()),
        };
        debug!("read trace channel={:?}", trace.channel);
        Ok(trace)
    }

    /// Decode a trace from an in-memory buffer. See [Trace::read].
    ///
    /// # Errors
    /// See [Trace::read].
    pub fn from_bytes(dat: &[u8], opts: &ReadOptions) -> Result<Self> {
        Self::read(dat, opts)
    }

    /// Decode a trace from the file at `path`.
    ///
    /// Unless [ReadOptions::channel] is set, the channel and serial number are taken from
    /// file names of the form `C<channel>Trace<NNNNN>.<ext>`.
    ///
    /// # Errors
    /// See [Trace::read].
    pub fn from_path<P: AsRef<Path>>(path: P, opts: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        validate_channel(opts.channel)?;
        let parsed = parse_filename(path)?;

        let file = File::open(path)?;
        let mut bytes = Bytes::new(BufReader::new(file));
        let descriptor = Descriptor::scan(&mut bytes)?;
        let body = Body::read(&mut bytes, &descriptor, opts.header_only)?;

        let mut trace = Trace::new(descriptor, body);
        trace.source = Some(path.to_path_buf());
        trace.serial = parsed.map(|(_, serial)| serial);
        trace.channel = match opts.channel {
            Some(channel) => Some(channel),
            None => parsed.and_then(|(channel, _)| (channel > 0).then_some(channel)),
        };
        debug!("read trace {path:?} channel={:?}", trace.channel);
        Ok(trace)
    }

    #[must_use]
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Voltage in physical units, `raw * vertical_gain + vertical_offset`, with the same
    /// shape as the raw samples.
    #[must_use]
    pub fn voltage(&self) -> &Samples<f64> {
        &self.voltage
    }

    /// Time of each sample relative to the trigger, shared by all segments.
    #[must_use]
    pub fn time(&self) -> &Array1<f64> {
        &self.time
    }

    /// Alias for [Trace::time].
    #[must_use]
    pub fn x(&self) -> &Array1<f64> {
        &self.time
    }

    /// Alias for [Trace::voltage].
    #[must_use]
    pub fn y(&self) -> &Samples<f64> {
        &self.voltage
    }

    #[must_use]
    pub fn raw(&self) -> &RawSamples {
        &self.raw
    }

    /// Shape (2, segments); row 0 is the trigger offset, row 1 the interval to the next
    /// trigger.
    #[must_use]
    pub fn trigger_times(&self) -> &Array2<f64> {
        &self.trigger_times
    }

    #[must_use]
    pub fn channel(&self) -> Option<Channel> {
        self.channel
    }

    /// Assign the channel number.
    ///
    /// # Errors
    /// [Error::InvalidArgument] if `channel` is 0.
    pub fn set_channel(&mut self, channel: Channel) -> Result<()> {
        validate_channel(Some(channel))?;
        self.channel = Some(channel);
        Ok(())
    }

    /// Trace serial number parsed from the file name, if any.
    #[must_use]
    pub fn serial(&self) -> Option<u32> {
        self.serial
    }

    /// Path this trace was read from, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of segments; 1 unless this is a sequence acquisition.
    #[allow(clippy::len_without_is_empty)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptor.segment_count()
    }

    /// True if only the descriptor was decoded.
    #[must_use]
    pub fn header_only(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Iterate `(time, voltage)` pairs, one per segment. Always yields [Trace::len]
    /// pairs; for a header-only trace both arrays of every pair are empty.
    #[must_use]
    pub fn iter(&self) -> Segments<'_> {
        let count = if self.header_only() {
            self.len()
        } else {
            self.voltage.num_rows()
        };
        Segments {
            trace: self,
            idx: 0,
            count,
        }
    }
}

impl<'a> IntoIterator for &'a Trace {
    type Item = (&'a Array1<f64>, ArrayView1<'a, f64>);
    type IntoIter = Segments<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the segments of a [Trace].
pub struct Segments<'a> {
    trace: &'a Trace,
    idx: usize,
    count: usize,
}

impl<'a> Iterator for Segments<'a> {
    type Item = (&'a Array1<f64>, ArrayView1<'a, f64>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.idx >= self.count {
            return None;
        }
        let row = if self.trace.header_only() {
            let empty: &[f64] = &[];
            ArrayView1::from(empty)
        } else {
            self.trace.voltage.row(self.idx)?
        };
        self.idx += 1;
        Some((&self.trace.time, row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.count.saturating_sub(self.idx);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Segments<'_> {}
impl FusedIterator for Segments<'_> {}

fn validate_channel(channel: Option<Channel>) -> Result<()> {
    match channel {
        Some(0) => Err(Error::InvalidArgument(
            "channel number must be a positive integer (1, 2, 3, ...)".to_string(),
        )),
        _ => Ok(()),
    }
}

static FILENAME_RX: OnceLock<Regex> = OnceLock::new();
static PREFIX_RX: OnceLock<regex::bytes::Regex> = OnceLock::new();

/// Parse `(channel, serial)` from a file name like `C3Trace01021.trc`.
fn parse_filename(path: &Path) -> Result<Option<(Channel, u32)>> {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return Ok(None);
    };
    let rx = FILENAME_RX
        .get_or_init(|| Regex::new(r"^C(\d)Trace(\d{5})\.\w+$").expect("regex to compile"));
    let Some(cap) = rx.captures(name) else {
        return Ok(None);
    };
    let channel = cap[1]
        .parse::<Channel>()
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    let serial = cap[2]
        .parse::<u32>()
        .map_err(|e| Error::InvalidArgument(e.to_string()))?;
    Ok(Some((channel, serial)))
}

/// Parse the channel from an instrument response prefix like `C2:WF`.
fn channel_from_prefix(preamble: &[u8]) -> Option<Channel> {
    let rx = PREFIX_RX
        .get_or_init(|| regex::bytes::Regex::new(r"^C(\d):WF").expect("regex to compile"));
    let cap = rx.captures(preamble)?;
    let channel = Channel::from(cap[1][0] - b'0');
    (channel > 0).then_some(channel)
}
