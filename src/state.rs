//! Core run types and constants.
//!
//! Default locations of the fetched log and the generated artifacts, and the
//! result of a bench run.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compare::{self, ComparisonRow};

// ============================================================================
// Constants
// ============================================================================

/// Where the fetched log lands unless configured otherwise
pub const DEFAULT_LOCAL_LOG: &str = "./logs/SignalReport.blf";

/// Directory for CSV, HTML and JSON outputs
pub const DEFAULT_REPORT_DIR: &str = "./reports";

/// Decoded frames shown in the HTML report
pub const DEFAULT_SAMPLE_ROWS: usize = 20;

pub const DECODED_CSV: &str = "decoded.csv";
pub const ANALYSIS_CSV: &str = "signal_analysis.csv";
pub const REPORT_HTML: &str = "report.html";
pub const SUMMARY_JSON: &str = "summary.json";

// ============================================================================
// Core Types
// ============================================================================

/// Files written by a run
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Artifacts {
    pub decoded_csv: PathBuf,
    pub analysis_csv: PathBuf,
    pub report_html: PathBuf,
    pub summary_json: PathBuf,
}

impl Artifacts {
    /// Standard file names inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            decoded_csv: dir.join(DECODED_CSV),
            analysis_csv: dir.join(ANALYSIS_CSV),
            report_html: dir.join(REPORT_HTML),
            summary_json: dir.join(SUMMARY_JSON),
        }
    }
}

/// Outcome of analyzing one log
#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub log_path: PathBuf,
    pub frame_count: usize,
    pub rows: Vec<ComparisonRow>,
    pub artifacts: Artifacts,
}

impl RunReport {
    pub fn failed(&self) -> bool {
        compare::any_failed(&self.rows)
    }
}
