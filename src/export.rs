//! CSV and JSON export of decoded frames and signal statistics.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::compare::ComparisonRow;
use crate::error::BenchError;
use crate::parsers::Frame;
use crate::signals::{self, Signal, SignalStats};

/// Quote a CSV field when it contains a delimiter, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn create(path: &Path) -> Result<BufWriter<File>, BenchError> {
    let output_error = |source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(output_error)?;
    }
    File::create(path).map(BufWriter::new).map_err(output_error)
}

/// Write decoded frames with their signal values
pub fn write_frames_csv<W: Write>(mut out: W, frames: &[Frame]) -> io::Result<()> {
    let signal_columns: Vec<String> = Signal::ORDER.iter().map(|s| s.to_string()).collect();
    writeln!(
        out,
        "timestamp,id,dlc,is_fd,channel,direction,data,{}",
        signal_columns.join(",")
    )?;

    for frame in frames {
        let values = signals::decode_frame(frame).map(optional);
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            frame.timestamp,
            frame.id_hex(),
            frame.dlc,
            frame.is_fd,
            frame.channel,
            frame.direction,
            csv_field(&frame.data_hex()),
            values.join(",")
        )?;
    }
    out.flush()
}

/// Write actual Min/Max/Mid per signal, empty cells when a signal never appeared
pub fn write_analysis_csv<W: Write>(
    mut out: W,
    stats: &[(Signal, Option<SignalStats>)],
) -> io::Result<()> {
    writeln!(out, "Signal,Min,Max,Mid")?;
    for (signal, stats) in stats {
        writeln!(
            out,
            "{},{},{},{}",
            signal,
            optional(stats.map(|s| s.min)),
            optional(stats.map(|s| s.max)),
            optional(stats.map(|s| s.mid)),
        )?;
    }
    out.flush()
}

/// Actual statistics for every bench signal
pub fn analysis_stats(frames: &[Frame], id: Option<u32>) -> Vec<(Signal, Option<SignalStats>)> {
    Signal::ORDER
        .iter()
        .map(|signal| (*signal, SignalStats::from_frames(*signal, frames, id)))
        .collect()
}

pub fn save_frames_csv(path: &Path, frames: &[Frame]) -> Result<(), BenchError> {
    write_frames_csv(create(path)?, frames).map_err(|source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Wrote {} frames to {}", frames.len(), path.display());
    Ok(())
}

pub fn save_analysis_csv(
    path: &Path,
    stats: &[(Signal, Option<SignalStats>)],
) -> Result<(), BenchError> {
    write_analysis_csv(create(path)?, stats).map_err(|source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!("Wrote signal analysis to {}", path.display());
    Ok(())
}

/// Comparison rows as pretty JSON
pub fn save_summary_json(path: &Path, rows: &[ComparisonRow]) -> Result<(), BenchError> {
    let summary = serde_json::json!({
        "passed": !crate::compare::any_failed(rows),
        "rows": rows,
    });
    let mut out = create(path)?;
    serde_json::to_writer_pretty(&mut out, &summary)?;
    out.flush().map_err(|source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    })
}
