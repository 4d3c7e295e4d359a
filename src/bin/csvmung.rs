//! CLI tool to run a filter chain over delimited text.
//!
//! Usage:
//!   csvmung [OPTIONS] <FILTER>...
//!   csvmung -i in.csv -o out.csv split:1:- cols:0:2 uniq:0
//!
//! Reads stdin and writes stdout unless files are given.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use csvmung::{CsvSink, CsvSource, FilterChain, SinkConfig, SourceConfig, parse_delimiter, run};

#[derive(Parser)]
#[command(name = "csvmung")]
#[command(about = "Filter and reshape delimited rows through a chain of stages", long_about = None)]
struct Cli {
    /// Input file. Stdin is used if unspecified
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Output file. Stdout is used if unspecified
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Input separator
    #[arg(long = "is", value_name = "SEP", default_value = ",")]
    input_sep: String,

    /// Output separator
    #[arg(long = "os", value_name = "SEP", default_value = ",")]
    output_sep: String,

    /// Allow lazy quotes in input
    #[arg(long = "lazy-quote")]
    lazy_quote: bool,

    /// Treat rows of differing length as an error
    #[arg(long = "strict-len")]
    strict_len: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Filters, applied in order: cols:..., re:col:pattern, split:col:pattern, uniq:col
    #[arg(value_name = "FILTER")]
    filters: Vec<String>,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Stdout carries the data.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Validate everything before touching input or output.
    let chain = FilterChain::from_tokens(cli.filters.as_slice())?;
    let source_config = SourceConfig {
        delimiter: parse_delimiter(&cli.input_sep)?,
        lazy_quotes: cli.lazy_quote,
        strict_len: cli.strict_len,
    };
    let sink_config = SinkConfig {
        delimiter: parse_delimiter(&cli.output_sep)?,
    };

    let source = match &cli.input {
        Some(path) => CsvSource::from_path(path, &source_config)
            .with_context(|| format!("Error opening input file '{}'", path.display()))?,
        None => CsvSource::stdin(&source_config),
    };
    let mut sink = match &cli.output {
        Some(path) => CsvSink::create(path, &sink_config)
            .with_context(|| format!("Error creating output file '{}'", path.display()))?,
        None => CsvSink::stdout(&sink_config),
    };

    let summary = run(source, chain, &mut sink)?;
    for stage in &summary.stages {
        info!(
            stage = %stage.name,
            received = stage.received,
            emitted = stage.emitted,
            dropped = stage.dropped(),
            skipped = stage.skipped,
            "stage summary"
        );
    }
    info!(
        "Processed {} -> {} records",
        summary.rows_read, summary.rows_written
    );

    Ok(())
}
