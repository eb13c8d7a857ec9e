//! Traces from several channels recorded on the same trigger.
use std::collections::btree_map::{self, BTreeMap};
use std::ops::RangeBounds;

use ndarray::{Array1, Zip};
use tracing::{debug, warn};

use crate::prelude::*;
use crate::source::Source;
use crate::trace::{ReadOptions, Trace};
use crate::Channel;

/// Absolute tolerance used when comparing time axes.
pub const TIME_TOLERANCE: f64 = 1e-12;

/// [Trace]s keyed by channel number, ordered by ascending channel.
///
/// # Example
/// ```no_run
/// use trc::{ReadOptions, TraceGroup};
///
/// let group = TraceGroup::new(["run/C*Trace00001.trc"], &ReadOptions::default()).unwrap();
/// for (channel, trace) in &group {
///     println!("channel {channel}: {} segments", trace.len());
/// }
/// if let Some(time) = group.time() {
///     println!("{} samples per segment", time.len());
/// }
/// ```
#[derive(Debug, Clone)]
pub struct TraceGroup {
    traces: BTreeMap<Channel, Trace>,
    common_time: bool,
}

impl TraceGroup {
    /// Build a group from any mix of [Source]s. Patterns expand to zero or more files.
    ///
    /// # Errors
    /// [Error::MissingChannel] if a trace has no channel, [Error::DuplicateChannel] if
    /// two traces share one, [Error::EmptyGroup] if no traces result, or any error
    /// reading a source.
    pub fn new<I>(sources: I, opts: &ReadOptions) -> Result<Self>
    where
        I: IntoIterator,
        I::Item: Into<Source>,
    {
        let mut traces = Vec::default();
        for source in sources {
            traces.extend(source.into().into_traces(opts)?);
        }
        Self::from_traces(traces)
    }

    /// Build a group from already decoded traces.
    ///
    /// # Errors
    /// See [TraceGroup::new].
    pub fn from_traces<I>(traces: I) -> Result<Self>
    where
        I: IntoIterator<Item = Trace>,
    {
        let mut map = BTreeMap::default();
        for trace in traces {
            let channel = trace.channel().ok_or(Error::MissingChannel)?;
            match map.entry(channel) {
                btree_map::Entry::Occupied(_) => return Err(Error::DuplicateChannel(channel)),
                btree_map::Entry::Vacant(entry) => {
                    entry.insert(trace);
                }
            }
        }
        if map.is_empty() {
            return Err(Error::EmptyGroup);
        }

        let common_time = shares_time(&map);
        if !common_time {
            warn!("traces in group do not share a time axis");
        }
        debug!("created group with channels {:?}", map.keys().collect::<Vec<_>>());
        Ok(TraceGroup {
            traces: map,
            common_time,
        })
    }

    /// The trace for `channel`.
    ///
    /// # Errors
    /// [Error::ChannelNotFound] if the group has no such channel.
    pub fn get(&self, channel: Channel) -> Result<&Trace> {
        self.traces
            .get(&channel)
            .ok_or(Error::ChannelNotFound(channel))
    }

    #[must_use]
    pub fn contains(&self, channel: Channel) -> bool {
        self.traces.contains_key(&channel)
    }

    /// Number of traces; never 0.
    #[allow(clippy::len_without_is_empty)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.traces.len()
    }

    /// Channels in ascending order.
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.traces.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, Channel, Trace> {
        self.traces.iter()
    }

    pub fn traces(&self) -> impl Iterator<Item = &Trace> + '_ {
        self.traces.values()
    }

    /// New group from the traces at positions `range` in channel order.
    ///
    /// # Errors
    /// [Error::EmptyGroup] if `range` selects nothing.
    pub fn slice<R: RangeBounds<usize>>(&self, range: R) -> Result<Self> {
        let start = match range.start_bound() {
            std::ops::Bound::Included(n) => *n,
            std::ops::Bound::Excluded(n) => n.saturating_add(1),
            std::ops::Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            std::ops::Bound::Included(n) => n.saturating_add(1),
            std::ops::Bound::Excluded(n) => *n,
            std::ops::Bound::Unbounded => self.traces.len(),
        };
        let traces = self
            .traces
            .values()
            .skip(start)
            .take(end.saturating_sub(start))
            .cloned();
        Self::from_traces(traces)
    }

    /// The time axis shared by every trace, or `None` if any trace's axis differs from
    /// the first by more than [TIME_TOLERANCE] at any sample.
    #[must_use]
    pub fn time(&self) -> Option<&Array1<f64>> {
        if !self.common_time {
            return None;
        }
        self.traces.values().next().map(Trace::time)
    }

    /// Segment count shared by every trace, if they agree.
    #[must_use]
    pub fn segment_count(&self) -> Option<usize> {
        let mut counts = self.traces.values().map(Trace::len);
        let first = counts.next()?;
        counts.all(|n| n == first).then_some(first)
    }
}

impl<'a> IntoIterator for &'a TraceGroup {
    type Item = (&'a Channel, &'a Trace);
    type IntoIter = btree_map::Iter<'a, Channel, Trace>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn shares_time(traces: &BTreeMap<Channel, Trace>) -> bool {
    let mut times = traces.values().map(Trace::time);
    let Some(first) = times.next() else {
        return false;
    };
    times.all(|other| {
        other.len() == first.len()
            && Zip::from(first)
                .and(other)
                .all(|a, b| (a - b).abs() <= TIME_TOLERANCE)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use crate::wavedesc::ByteOrder;

    fn trace(channel: Channel, horiz_offset: f64) -> Trace {
        let fixture = Fixture::new(ByteOrder::Little, 1, 2, (0..8).collect());
        let mut wd = fixture.wavedesc();
        wd.horiz_offset = horiz_offset;
        let mut dat = wd.pack(ByteOrder::Little);
        dat.extend(fixture.body_bytes());
        Trace::from_bytes(&dat, &ReadOptions::builder().channel(channel).build()).unwrap()
    }

    #[test]
    fn sorted_by_channel() {
        let group =
            TraceGroup::from_traces([trace(3, 0.0), trace(1, 0.0), trace(2, 0.0)]).unwrap();

        assert_eq!(group.len(), 3);
        assert_eq!(group.channels().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(group.get(2).unwrap().channel(), Some(2));
        assert!(matches!(group.get(4), Err(Error::ChannelNotFound(4))));
        assert_eq!(group.segment_count(), Some(2));
    }

    #[test]
    fn duplicate_channel() {
        let zult = TraceGroup::from_traces([trace(2, 0.0), trace(2, 0.0)]);
        assert!(matches!(zult, Err(Error::DuplicateChannel(2))));
    }

    #[test]
    fn missing_channel() {
        let dat = Fixture::new(ByteOrder::Little, 1, 2, (0..8).collect()).to_bytes();
        let zult = TraceGroup::new([Source::Bytes(dat)], &ReadOptions::default());
        assert!(matches!(zult, Err(Error::MissingChannel)));
    }

    #[test]
    fn empty() {
        assert!(matches!(
            TraceGroup::from_traces(Vec::new()),
            Err(Error::EmptyGroup)
        ));
    }

    #[test]
    fn time_within_tolerance() {
        let group = TraceGroup::from_traces([trace(1, 0.0), trace(2, 5e-13)]).unwrap();
        assert!(group.time().is_some());

        let group = TraceGroup::from_traces([trace(1, 0.0), trace(2, 1e-9)]).unwrap();
        assert!(group.time().is_none());
    }

    #[test]
    fn slicing() {
        let group = TraceGroup::from_traces([
            trace(1, 0.0),
            trace(2, 0.0),
            trace(3, 0.0),
            trace(4, 1e-6),
        ])
        .unwrap();
        assert!(group.time().is_none());

        let sub = group.slice(1..3).unwrap();
        assert_eq!(sub.channels().collect::<Vec<_>>(), vec![2, 3]);
        assert!(sub.time().is_some());

        let sub = group.slice(2..).unwrap();
        assert_eq!(sub.channels().collect::<Vec<_>>(), vec![3, 4]);

        assert!(matches!(group.slice(4..), Err(Error::EmptyGroup)));
    }

    #[test]
    fn slice_extreme_bounds() {
        use std::ops::Bound;
        let group = TraceGroup::from_traces([trace(1, 0.0), trace(2, 0.0)]).unwrap();

        let all = group.slice(..=usize::MAX).unwrap();
        assert_eq!(all.channels().collect::<Vec<_>>(), vec![1, 2]);

        assert!(matches!(
            group.slice((Bound::Excluded(usize::MAX), Bound::Unbounded)),
            Err(Error::EmptyGroup)
        ));
        assert!(matches!(
            group.slice((Bound::Excluded(0), Bound::Included(usize::MAX))),
            Ok(g) if g.channels().collect::<Vec<_>>() == vec![2]
        ));
    }
}
