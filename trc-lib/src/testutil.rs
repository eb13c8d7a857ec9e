//! Synthetic TRC data for unit tests.
use crate::descriptor::Descriptor;
use crate::wavedesc::{ByteOrder, TriggerTime, WaveDesc, DESCRIPTOR_LEN};

/// Descriptor values resembling a 200 segment sequence recorded by a WaveRunner.
pub(crate) fn sample_wavedesc() -> WaveDesc {
    WaveDesc {
        descriptor_name: "WAVEDESC".to_string(),
        template_name: "LECROY_2_3".to_string(),
        comm_type: 1,
        comm_order: 1,
        wave_descriptor: 346,
        trig_time_array: 3200,
        wave_array_1: 800_800,
        instrument_name: "LECROYWR64Xi-A".to_string(),
        instrument_number: 50699,
        wave_array_count: 400_400,
        points_per_screen: 400_000,
        last_valid_point: 400_399,
        sparsing_factor: 1,
        subarray_count: 200,
        sweeps_per_acq: 1,
        vertical_gain: 0.000_124_995,
        vertical_offset: -0.95,
        max_value: 31745.0,
        min_value: -32001.0,
        nominal_bits: 8,
        nom_subarray_count: 200,
        horiz_interval: 1e-9,
        horiz_offset: -2.282_446_372_980_913_5e-7,
        pixel_offset: -2.28e-7,
        vert_unit: "V".to_string(),
        horiz_unit: "S".to_string(),
        horiz_uncertainty: 1e-12,
        trigger_time: TriggerTime {
            seconds: 38.475_715_12,
            minutes: 12,
            hours: 15,
            days: 3,
            months: 5,
            year: 2022,
            unused: 0,
        },
        ris_sweeps: 1,
        time_base: 16,
        probe_att: 1.0,
        fixed_vert_gain: 18,
        vertical_vernier: 1.0,
        acq_vert_offset: -0.95,
        wave_source: 1,
        ..Default::default()
    }
}

/// Builds a consistent descriptor and body from sample values.
pub(crate) struct Fixture {
    order: ByteOrder,
    comm_type: i16,
    segments: i32,
    user_text: Vec<u8>,
    trigger_times: Vec<(f64, f64)>,
    samples: Vec<i16>,
}

impl Fixture {
    /// Samples are truncated to 8 bits when `comm_type` is 0.
    pub fn new(order: ByteOrder, comm_type: i16, segments: i32, samples: Vec<i16>) -> Self {
        let num = usize::try_from(segments.max(1)).unwrap();
        let trigger_times = (0..num).map(|i| (i as f64 * 1e-3, 1e-3)).collect();
        Fixture {
            order,
            comm_type,
            segments,
            user_text: Vec::new(),
            trigger_times,
            samples,
        }
    }

    pub fn with_user_text(mut self, text: &[u8]) -> Self {
        self.user_text = text.to_vec();
        self
    }

    pub fn with_trigger_times(mut self, times: Vec<(f64, f64)>) -> Self {
        self.trigger_times = times;
        self
    }

    fn width(&self) -> usize {
        if self.comm_type == 0 {
            1
        } else {
            2
        }
    }

    pub fn wavedesc(&self) -> WaveDesc {
        let mut wd = sample_wavedesc();
        wd.comm_type = self.comm_type;
        wd.comm_order = self.order.comm_order();
        wd.user_text = i32::try_from(self.user_text.len()).unwrap();
        wd.trig_time_array = i32::try_from(self.trigger_times.len() * 16).unwrap();
        wd.wave_array_count = i32::try_from(self.samples.len()).unwrap();
        wd.wave_array_1 = i32::try_from(self.samples.len() * self.width()).unwrap();
        wd.subarray_count = self.segments;
        wd
    }

    pub fn descriptor(&self) -> Descriptor {
        let buf: [u8; DESCRIPTOR_LEN] = self.wavedesc().pack(self.order).try_into().unwrap();
        Descriptor::decode(&buf).unwrap()
    }

    pub fn body_bytes(&self) -> Vec<u8> {
        let mut out = self.user_text.clone();
        for (offset, interval) in &self.trigger_times {
            for v in [offset, interval] {
                match self.order {
                    ByteOrder::Big => out.extend(v.to_be_bytes()),
                    ByteOrder::Little => out.extend(v.to_le_bytes()),
                }
            }
        }
        for s in &self.samples {
            if self.comm_type == 0 {
                out.extend((*s as i8).to_ne_bytes());
            } else {
                match self.order {
                    ByteOrder::Big => out.extend(s.to_be_bytes()),
                    ByteOrder::Little => out.extend(s.to_le_bytes()),
                }
            }
        }
        out
    }

    /// Complete file contents, descriptor first.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.wavedesc().pack(self.order);
        out.extend(self.body_bytes());
        out
    }
}
