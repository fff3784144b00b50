//! canbench command line entrypoint.
//!
//! - `canbench run` - trigger the simulation, fetch its log and analyze it
//! - `canbench analyze` - analyze a log that is already on disk
//! - `canbench decode` - decode a log to CSV

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};

use canbench::app::{self, BenchRun};
use canbench::config::BenchConfig;
use canbench::state::RunReport;

/// Exit code when at least one signal comparison failed
const EXIT_COMPARISON_FAILED: u8 = 2;

/// CAN bench test runner.
#[derive(Parser)]
#[command(name = "canbench")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON configuration file; built-in bench defaults when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline against the bench host.
    Run {
        /// Do not start the simulation, only fetch and analyze
        #[arg(long)]
        skip_trigger: bool,

        /// Analyze the local log without copying it from the host
        #[arg(long)]
        skip_fetch: bool,
    },

    /// Analyze a log that is already on disk.
    Analyze {
        #[arg(long)]
        log: PathBuf,

        /// CAPL test definition; repeat for several files
        #[arg(long = "capl")]
        capl: Vec<PathBuf>,

        /// Only compare frames with this id (decimal or 0x hex)
        #[arg(long, value_parser = parse_id)]
        message_id: Option<u32>,

        #[arg(long)]
        report_dir: Option<PathBuf>,
    },

    /// Decode a log to CSV.
    Decode {
        #[arg(long)]
        log: PathBuf,

        /// Output CSV, defaults to decoded.csv in the report directory
        #[arg(long)]
        out: Option<PathBuf>,

        #[arg(long)]
        max_frames: Option<usize>,
    },
}

fn parse_id(value: &str) -> Result<u32, String> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|e| format!("invalid message id {value:?}: {e}"))
}

fn finish(report: &RunReport) -> ExitCode {
    for row in &report.rows {
        println!(
            "{:<12} expected {}..{}  actual {}  {}",
            row.signal.to_string(),
            row.expected.min,
            row.expected.max,
            row.actual
                .map_or("missing".to_string(), |a| format!("{}..{}", a.min, a.max)),
            row.verdict
        );
    }
    println!("Report: {}", report.artifacts.report_html.display());

    if report.failed() {
        ExitCode::from(EXIT_COMPARISON_FAILED)
    } else {
        ExitCode::SUCCESS
    }
}

fn main() -> anyhow::Result<ExitCode> {
    // Logs go to stderr so stdout only carries results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = BenchConfig::load_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;

    match cli.command {
        Commands::Run {
            skip_trigger,
            skip_fetch,
        } => {
            let report = BenchRun::new(config)
                .execute(skip_trigger, skip_fetch)
                .context("bench run failed")?;
            Ok(finish(&report))
        }
        Commands::Analyze {
            log,
            capl,
            message_id,
            report_dir,
        } => {
            if !capl.is_empty() {
                config.analysis.capl_files = capl;
            }
            if message_id.is_some() {
                config.analysis.message_id = message_id;
            }
            if let Some(dir) = report_dir {
                config.paths.report_dir = dir;
            }
            let report = BenchRun::new(config)
                .analyze(&log)
                .with_context(|| format!("failed to analyze {}", log.display()))?;
            Ok(finish(&report))
        }
        Commands::Decode {
            log,
            out,
            max_frames,
        } => {
            let out = out.unwrap_or_else(|| app::default_decoded_csv(&config));
            let count = app::decode_to_csv(&log, &out, max_frames.or(config.analysis.max_frames))
                .with_context(|| format!("failed to decode {}", log.display()))?;
            println!("Decoded {} frames to {}", count, out.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}
