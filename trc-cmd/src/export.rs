use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};
use trc::columns::Branch;
use trc::{Columns, ReadOptions, Source, TraceGroup};

#[derive(Serialize)]
struct Export<'a> {
    sources: Vec<String>,
    branches: Vec<Branch>,
    #[serde(flatten)]
    columns: &'a Columns,
}

pub fn export(inputs: &[String], output: &Path, annotations: BTreeMap<String, f64>) -> Result<()> {
    let sources = inputs.iter().map(|s| Source::from(s.as_str()));
    let group = TraceGroup::new(sources, &ReadOptions::default())
        .context("reading traces")?;
    if group.time().is_none() {
        warn!("channels {:?} do not share a time axis", group.channels().collect::<Vec<_>>());
    }
    let columns = Columns::new(&group, &annotations).context("building columns")?;
    info!(
        "exporting {} rows for channels {:?}",
        columns.rows(),
        group.channels().collect::<Vec<_>>()
    );

    let export = Export {
        sources: group
            .traces()
            .filter_map(|t| t.source())
            .map(|p| p.to_string_lossy().to_string())
            .collect(),
        branches: columns.branches(),
        columns: &columns,
    };

    let dest =
        File::create(output).with_context(|| format!("failed to create output {output:?}"))?;
    let mut writer = BufWriter::new(dest);
    serde_json::to_writer(&mut writer, &export).context("serializing to json")?;
    writer.flush().context("writing output")
}

#[cfg(test)]
mod tests {
    use super::*;
    use trc::{ByteOrder, WaveDesc};

    fn write_trc(dir: &Path, name: &str) {
        let wd = WaveDesc {
            descriptor_name: "WAVEDESC".to_string(),
            comm_type: 0,
            comm_order: 1,
            trig_time_array: 32,
            wave_array_1: 8,
            wave_array_count: 8,
            subarray_count: 2,
            vertical_gain: 0.5,
            horiz_interval: 1e-9,
            time_base: 16,
            fixed_vert_gain: 18,
            ..Default::default()
        };
        let mut dat = wd.pack(ByteOrder::Little);
        dat.extend([0u8; 32]);
        dat.extend([1u8, 2, 3, 4, 5, 6, 7, 8]);
        std::fs::write(dir.join(name), dat).unwrap();
    }

    #[test]
    fn exports_json() {
        let tmp = tempfile::tempdir().unwrap();
        write_trc(tmp.path(), "C1Trace00001.trc");
        write_trc(tmp.path(), "C2Trace00001.trc");
        let pattern = tmp.path().join("C*Trace00001.trc");
        let output = tmp.path().join("out.json");

        export(
            &[pattern.to_string_lossy().to_string()],
            &output,
            BTreeMap::from([("run".to_string(), 3.0)]),
        )
        .unwrap();

        let zult: serde_json::Value =
            serde_json::from_reader(File::open(&output).unwrap()).unwrap();
        assert_eq!(zult["sources"].as_array().unwrap().len(), 2);
        assert_eq!(zult["branches"].as_array().unwrap().len(), 4);
        assert_eq!(zult["channels"]["CH2"]["dim"], serde_json::json!([2, 4]));
        assert_eq!(zult["annotations"]["run"]["data"], serde_json::json!([3.0, 3.0]));
    }

    #[test]
    fn empty_pattern() {
        let tmp = tempfile::tempdir().unwrap();
        let pattern = tmp.path().join("*.trc");

        let zult = export(
            &[pattern.to_string_lossy().to_string()],
            &tmp.path().join("out.json"),
            BTreeMap::new(),
        );
        assert!(zult.is_err());
    }
}
