#![allow(dead_code)]
use std::path::{Path, PathBuf};

use trc::{ByteOrder, TriggerTime, WaveDesc};

/// Synthetic TRC file contents with 16-bit samples.
pub struct TrcFile {
    pub order: ByteOrder,
    pub segments: usize,
    pub samples_per_segment: usize,
    pub horiz_offset: f64,
    pub prefix: Vec<u8>,
    pub user_text: Vec<u8>,
}

impl TrcFile {
    pub fn new(segments: usize, samples_per_segment: usize) -> Self {
        TrcFile {
            order: ByteOrder::Little,
            segments,
            samples_per_segment,
            horiz_offset: -2.0e-7,
            prefix: Vec::new(),
            user_text: Vec::new(),
        }
    }

    pub fn wavedesc(&self) -> WaveDesc {
        let num_segments = self.segments.max(1);
        let count = num_segments * self.samples_per_segment;
        WaveDesc {
            descriptor_name: "WAVEDESC".to_string(),
            template_name: "LECROY_2_3".to_string(),
            comm_type: 1,
            comm_order: self.order.comm_order(),
            wave_descriptor: 346,
            user_text: i32::try_from(self.user_text.len()).unwrap(),
            trig_time_array: i32::try_from(num_segments * 16).unwrap(),
            wave_array_1: i32::try_from(count * 2).unwrap(),
            instrument_name: "LECROYWR64Xi-A".to_string(),
            wave_array_count: i32::try_from(count).unwrap(),
            subarray_count: i32::try_from(self.segments).unwrap(),
            nom_subarray_count: i16::try_from(self.segments).unwrap(),
            vertical_gain: 1.25e-4,
            vertical_offset: -0.95,
            horiz_interval: 1e-9,
            horiz_offset: self.horiz_offset,
            vert_unit: "V".to_string(),
            horiz_unit: "S".to_string(),
            trigger_time: TriggerTime {
                seconds: 38.5,
                minutes: 12,
                hours: 15,
                days: 3,
                months: 5,
                year: 2022,
                unused: 0,
            },
            time_base: 16,
            fixed_vert_gain: 18,
            ..Default::default()
        }
    }

    /// Sample `k` of segment `s` has the raw value `s * 100 + k % 100`.
    pub fn raw(&self, segment: usize, idx: usize) -> i16 {
        i16::try_from(segment * 100 + idx % 100).unwrap()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.prefix.clone();
        out.extend(self.wavedesc().pack(self.order));
        out.extend(&self.user_text);
        for s in 0..self.segments.max(1) {
            #[allow(clippy::cast_precision_loss)]
            for v in [s as f64 * 1e-3, 1e-3] {
                match self.order {
                    ByteOrder::Big => out.extend(v.to_be_bytes()),
                    ByteOrder::Little => out.extend(v.to_le_bytes()),
                }
            }
        }
        for s in 0..self.segments.max(1) {
            for k in 0..self.samples_per_segment {
                let v = self.raw(s, k);
                match self.order {
                    ByteOrder::Big => out.extend(v.to_be_bytes()),
                    ByteOrder::Little => out.extend(v.to_le_bytes()),
                }
            }
        }
        out
    }

    pub fn write(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.to_bytes()).expect("failed to write fixture");
        path
    }
}
