use anyhow::{Context, Result};
use handlebars::handlebars_helper;
use serde::Serialize;
use std::{
    io::{stdout, Write},
    path::Path,
};
use trc::{Channel, Descriptor, ReadOptions, Trace};

#[derive(Debug, Clone)]
pub enum Format {
    Json,
    Text,
}

impl clap::ValueEnum for Format {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Json, Self::Text]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        match self {
            Self::Json => Some(clap::builder::PossibleValue::new("json")),
            Self::Text => Some(clap::builder::PossibleValue::new("text")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Field {
    name: &'static str,
    value: String,
}

#[derive(Debug, Clone, Serialize)]
struct Info<'a> {
    filename: String,
    channel: Option<Channel>,
    serial: Option<u32>,
    header_only: bool,
    segments: usize,
    samples: usize,
    trigger_time: Option<String>,
    descriptor: &'a Descriptor,
    fields: Vec<Field>,
}

fn summarize<'a>(fpath: &Path, trace: &'a Trace) -> Result<Info<'a>> {
    let desc = trace.descriptor();
    Ok(Info {
        filename: fpath.to_string_lossy().to_string(),
        channel: trace.channel(),
        serial: trace.serial(),
        header_only: trace.header_only(),
        segments: trace.len(),
        samples: desc.sample_count().context("invalid sample count")?,
        trigger_time: desc.trigger_time().iso8601(),
        descriptor: desc,
        fields: desc
            .wavedesc
            .fields()
            .map(|(name, value)| Field {
                name,
                value: value.to_string(),
            })
            .collect(),
    })
}

pub fn info(fpath: &Path, format: &Format, header_only: bool) -> Result<()> {
    let opts = ReadOptions::builder().header_only(header_only).build();
    let trace = Trace::from_path(fpath, &opts).context("reading trace")?;
    let info = summarize(fpath, &trace)?;

    match format {
        Format::Json => {
            serde_json::to_writer_pretty(stdout(), &info).context("serializing to json")
        }
        Format::Text => {
            let data = render_text(&info).context("serializing info")?;
            stdout()
                .write_all(str::as_bytes(&data))
                .context("writing to stdout")
        }
    }
}

fn render_text(info: &Info) -> Result<String> {
    handlebars_helper!(right_pad: |num: u64, v: Json| {
        let v = match v {
            serde_json::Value::String(s) => s.to_owned(),
            serde_json::Value::Null => String::new(),
            _ => v.to_string()
        };
        let num = usize::try_from(num).unwrap_or_default().max(v.len());
        format!("{v:<num$}")
    });
    let mut hb = handlebars::Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.register_helper("rpad", Box::new(right_pad));
    hb.register_template_string("info", TEXT_TEMPLATE)
        .context("compiling template")?;

    hb.render("info", &info).context("rendering text")
}

const TEXT_TEMPLATE: &str = r"{{ filename }}
===============================================================================================
Channel:     {{ channel }}
Serial:      {{ serial }}
Instrument:  {{ descriptor.wavedesc.instrument_name }}
Record:      {{ descriptor.record_type }}
Byte order:  {{ descriptor.byte_order }}
Segments:    {{ segments }}
Samples:     {{ samples }}
Trigger:     {{ trigger_time }}
Time base:   {{ descriptor.time_base }}
Vert gain:   {{ descriptor.fixed_vert_gain }}
Coupling:    {{ descriptor.vert_coupling }}
Header only: {{ header_only }}
-----------------------------------------------------------------------------------------------
Field                  Value
-----------------------------------------------------------------------------------------------
{{ #each fields }}{{ rpad 22 name }} {{ value }}
{{/each }}
";
