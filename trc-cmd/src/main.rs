mod export;
mod info;

use std::io::stderr;
use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the decoded descriptor of a TRC file.
    Info {
        /// Input TRC file
        input: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: info::Format,

        /// Only decode the descriptor block.
        ///
        /// The sample and trigger time sections are not read, so a file with a
        /// truncated body can still be inspected.
        #[arg(long, action)]
        header_only: bool,
    },
    /// Export traces recorded on the same trigger as JSON columns.
    ///
    /// Each channel becomes a segments x samples column named CH<n>, sharing a single
    /// time column. Inputs must resolve to distinct channels, either from file names
    /// of the form C<n>Trace<NNNNN>.trc or an instrument response prefix.
    Export {
        /// Add a constant column, repeated for every segment, e.g., --annotate bias=52.5
        #[arg(short, long, value_parser = parse_annotation, value_name = "key=value")]
        annotate: Vec<(String, f64)>,

        /// Delete output file if it already exists
        #[arg(long, action)]
        clobber: bool,

        /// Output file path.
        #[arg(short, long, default_value = "traces.json", value_name = "path")]
        output: PathBuf,

        /// Input TRC files or file name patterns, e.g., 'run1/C*Trace00042.trc'
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

fn parse_annotation(s: &str) -> Result<(String, f64), String> {
    let Some((key, value)) = s.split_once('=') else {
        return Err("expected <key>=<value>".to_string());
    };
    let key = key.trim();
    if key.is_empty() {
        return Err("annotation name cannot be empty".to_string());
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid value for {key}: {e}"))?;
    Ok((key.to_string(), value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(stderr)
        .with_ansi(false)
        .without_time()
        .with_env_filter(
            EnvFilter::try_from_env("TRC_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    debug!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Commands::Info {
            input,
            format,
            header_only,
        } => info::info(input, format, *header_only),
        Commands::Export {
            annotate,
            clobber,
            output,
            inputs,
        } => {
            if !clobber && output.exists() {
                bail!("{output:?} exists; use --clobber");
            }
            info!("exporting {inputs:?} to {output:?}");
            export::export(inputs, output, annotate.iter().cloned().collect())
        }
    }
}
