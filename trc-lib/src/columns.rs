use std::collections::BTreeMap;

use ndarray::{Array1, Array2};
use serde::Serialize;
use tracing::debug;

use crate::group::TraceGroup;
use crate::prelude::*;
use crate::Channel;

/// Column name used for the voltage of `channel`.
#[must_use]
pub fn channel_name(channel: Channel) -> String {
    format!("CH{channel}")
}

/// Definition of a single output column.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Branch {
    pub name: String,
    pub dtype: &'static str,
    /// Shape of one row, i.e., excluding the leading segment dimension.
    pub shape: Vec<usize>,
}

/// Column oriented view of a [TraceGroup] with one row per segment.
///
/// Every column has the same number of rows: the time axis and each channel's voltage are
/// segments x samples, and each annotation holds its value repeated once per segment.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Columns {
    pub time: Array2<f64>,
    pub channels: BTreeMap<String, Array2<f64>>,
    pub annotations: BTreeMap<String, Array1<f64>>,
}

impl Columns {
    /// # Errors
    /// [Error::NoCommonTime] if the traces do not share a time axis,
    /// [Error::SegmentMismatch] if they do not share a segment count.
    pub fn new(group: &TraceGroup, annotations: &BTreeMap<String, f64>) -> Result<Self> {
        let time = group.time().ok_or(Error::NoCommonTime)?;
        let segments = group.segment_count().ok_or(Error::SegmentMismatch)?;

        let mut channels = BTreeMap::default();
        for (channel, trace) in group {
            let voltage = trace.voltage().to_matrix();
            if voltage.nrows() != segments || voltage.ncols() != time.len() {
                return Err(Error::SegmentMismatch);
            }
            channels.insert(channel_name(*channel), voltage);
        }

        let time = time
            .broadcast((segments, time.len()))
            .ok_or(Error::SegmentMismatch)?
            .to_owned();
        let annotations = annotations
            .iter()
            .map(|(name, value)| (name.clone(), Array1::from_elem(segments, *value)))
            .collect();
        debug!(
            "built {} channel columns of {segments} rows",
            channels.len()
        );

        Ok(Columns {
            time,
            channels,
            annotations,
        })
    }

    /// Number of rows, i.e., segments.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.time.nrows()
    }

    /// Column definitions: time, then channels, then annotations, each in name order.
    #[must_use]
    pub fn branches(&self) -> Vec<Branch> {
        let mut branches = vec![Branch {
            name: "time".to_string(),
            dtype: "f64",
            shape: vec![self.time.ncols()],
        }];
        branches.extend(self.channels.iter().map(|(name, arr)| Branch {
            name: name.clone(),
            dtype: "f64",
            shape: vec![arr.ncols()],
        }));
        branches.extend(self.annotations.keys().map(|name| Branch {
            name: name.clone(),
            dtype: "f64",
            shape: Vec::new(),
        }));
        branches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::Fixture;
    use crate::trace::{ReadOptions, Trace};
    use crate::wavedesc::ByteOrder;

    fn trace(channel: Channel, segments: i32, samples: Vec<i16>) -> Trace {
        let dat = Fixture::new(ByteOrder::Big, 1, segments, samples).to_bytes();
        Trace::from_bytes(&dat, &ReadOptions::builder().channel(channel).build()).unwrap()
    }

    #[test]
    fn sequence() {
        let group = TraceGroup::from_traces([
            trace(2, 3, (0..12).collect()),
            trace(1, 3, (100..112).collect()),
        ])
        .unwrap();
        let annotations = BTreeMap::from([("run".to_string(), 7.0)]);

        let cols = Columns::new(&group, &annotations).unwrap();

        assert_eq!(cols.rows(), 3);
        assert_eq!(cols.time.shape(), &[3, 4]);
        assert_eq!(&cols.time.row(2), group.time().unwrap());
        assert_eq!(cols.channels.keys().collect::<Vec<_>>(), vec!["CH1", "CH2"]);
        assert_eq!(cols.channels["CH2"].shape(), &[3, 4]);
        assert_eq!(cols.annotations["run"].to_vec(), vec![7.0; 3]);

        let names: Vec<_> = cols.branches().into_iter().map(|b| b.name).collect();
        assert_eq!(names, vec!["time", "CH1", "CH2", "run"]);
    }

    #[test]
    fn single_segment_is_one_row() {
        let group = TraceGroup::from_traces([trace(1, 0, (0..5).collect())]).unwrap();

        let cols = Columns::new(&group, &BTreeMap::new()).unwrap();

        assert_eq!(cols.time.shape(), &[1, 5]);
        assert_eq!(cols.channels["CH1"].shape(), &[1, 5]);
    }

    #[test]
    fn segment_mismatch() {
        let group = TraceGroup::from_traces([
            trace(1, 2, (0..4).collect()),
            trace(2, 4, (0..8).collect()),
        ])
        .unwrap();

        assert!(matches!(
            Columns::new(&group, &BTreeMap::new()),
            Err(Error::SegmentMismatch)
        ));
    }

    #[test]
    fn no_common_time() {
        let group = TraceGroup::from_traces([
            trace(1, 2, (0..4).collect()),
            trace(2, 2, (0..6).collect()),
        ])
        .unwrap();

        assert!(matches!(
            Columns::new(&group, &BTreeMap::new()),
            Err(Error::NoCommonTime)
        ));
    }
}
