//! Bench run orchestration.
//!
//! Trigger, fixed wait, fetch, decode, compare, render. Every stage runs on
//! the calling thread, in order.

use std::path::{Path, PathBuf};
use std::thread;

use chrono::Local;

use crate::compare;
use crate::config::BenchConfig;
use crate::error::BenchError;
use crate::export;
use crate::parsers::{self, capl, ReadOptions};
use crate::remote::{CommandRunner, RemoteSession, SystemRunner};
use crate::report::{self, ReportContext};
use crate::state::{Artifacts, RunReport};

/// A configured bench run
pub struct BenchRun<R: CommandRunner> {
    config: BenchConfig,
    runner: R,
}

impl BenchRun<SystemRunner> {
    pub fn new(config: BenchConfig) -> Self {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: CommandRunner> BenchRun<R> {
    pub fn with_runner(config: BenchConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn session(&self) -> RemoteSession<'_, &R> {
        RemoteSession::new(&self.config.remote, &self.runner)
    }

    fn read_options(&self) -> ReadOptions {
        ReadOptions {
            max_frames: self.config.analysis.max_frames,
        }
    }

    /// Full pipeline against the bench host
    pub fn execute(&self, skip_trigger: bool, skip_fetch: bool) -> Result<RunReport, BenchError> {
        let session = self.session();
        let local_log = &self.config.paths.local_log;

        if skip_trigger {
            tracing::info!("Skipping simulation trigger");
        } else {
            session.launch_simulation()?;
            let wait = self.config.timing.wait_duration();
            tracing::info!("Waiting {:.1}s for the simulation to finish", wait.as_secs_f64());
            thread::sleep(wait);
        }

        if skip_fetch {
            tracing::info!("Skipping fetch, using {}", local_log.display());
        } else {
            session.fetch_log(local_log)?;
        }

        self.analyze(local_log)
    }

    /// Decode a local log, compare it against the test definitions and
    /// write every artifact to the report directory
    pub fn analyze(&self, log_path: &Path) -> Result<RunReport, BenchError> {
        let analysis = &self.config.analysis;
        let artifacts = Artifacts::in_dir(&self.config.paths.report_dir);

        let log = parsers::decode_file(log_path, &self.read_options())?;
        if let Some((start, end)) = log.time_range() {
            tracing::info!(
                "Decoded {} frames ({:.3}s to {:.3}s) from {}",
                log.frames.len(),
                start,
                end,
                log_path.display()
            );
        }
        export::save_frames_csv(&artifacts.decoded_csv, &log.frames)?;

        let expected = capl::extract_expected(&analysis.capl_files, &analysis.variables)?;
        let rows = compare::compare(&expected.stats(), &log.frames, analysis.message_id);

        let actual = export::analysis_stats(&log.frames, analysis.message_id);
        export::save_analysis_csv(&artifacts.analysis_csv, &actual)?;

        report::save_html(
            &artifacts.report_html,
            &ReportContext {
                log_path,
                log: &log,
                expected: &expected,
                rows: &rows,
                message_id: analysis.message_id,
                sample_rows: analysis.sample_rows,
                generated_at: Local::now().naive_local(),
            },
        )?;
        export::save_summary_json(&artifacts.summary_json, &rows)?;

        let run = RunReport {
            log_path: log_path.to_path_buf(),
            frame_count: log.frames.len(),
            rows,
            artifacts,
        };
        if run.failed() {
            tracing::warn!("Signal comparison failed");
        } else {
            tracing::info!("Signal comparison passed ({} signals)", run.rows.len());
        }
        Ok(run)
    }
}

/// Decode a log straight to CSV, returning the frame count
pub fn decode_to_csv(
    log_path: &Path,
    out: &Path,
    max_frames: Option<usize>,
) -> Result<usize, BenchError> {
    let log = parsers::decode_file(log_path, &ReadOptions { max_frames })?;
    export::save_frames_csv(out, &log.frames)?;
    Ok(log.frames.len())
}

/// Default CSV path next to the report directory's other outputs
pub fn default_decoded_csv(config: &BenchConfig) -> PathBuf {
    Artifacts::in_dir(&config.paths.report_dir).decoded_csv
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::compare::Verdict;
    use crate::config::{Launcher, TimingConfig};
    use crate::error::{DecodeError, RemoteError};
    use crate::parsers::blf::testing;
    use crate::remote::testing::RecordingRunner;
    use crate::signals::Signal;

    fn payload(speed: u16, torque: u16, temp: u8) -> Vec<u8> {
        let mut data = speed.to_be_bytes().to_vec();
        data.extend_from_slice(&torque.to_be_bytes());
        data.push(temp);
        data.extend_from_slice(&[0, 0, 0]);
        data
    }

    struct Bench {
        dir: tempfile::TempDir,
        config: BenchConfig,
    }

    fn bench(capl: &str) -> Bench {
        let dir = tempfile::tempdir().unwrap();
        let low = payload(800, 10, 20);
        let high = payload(6500, 420, 115);
        let other = payload(9999, 9999, 255);
        let blf = testing::simple_file(&[
            (0, 0x100, low.as_slice()),
            (10_000_000, 0x200, other.as_slice()),
            (20_000_000, 0x100, high.as_slice()),
        ]);
        let log_path = dir.path().join("logs/SignalReport.blf");
        fs::create_dir_all(log_path.parent().unwrap()).unwrap();
        fs::write(&log_path, blf).unwrap();

        let capl_path = dir.path().join("TC_Signals.can");
        fs::write(&capl_path, capl).unwrap();

        let mut config = BenchConfig::default();
        config.remote.launcher = Launcher::Ssh;
        config.remote.host = "bench-07".to_string();
        config.timing = TimingConfig {
            cycles: 0,
            delay_ms: 0,
            settle_secs: 0.0,
        };
        config.paths.local_log = log_path;
        config.paths.report_dir = dir.path().join("reports");
        config.analysis.capl_files = vec![capl_path];
        config.analysis.message_id = Some(0x100);
        Bench { dir, config }
    }

    const MATCHING: &str = r#"
        testcase TC_Low() {
          engineSpeed = 800; torque = 10; coolantTemp = 20;
        }
        testcase TC_High() {
          engineSpeed = 6500; torque = 420; coolantTemp = 115;
        }
    "#;

    #[test]
    fn test_analyze_passes_and_writes_artifacts() {
        let bench = bench(MATCHING);
        let run = BenchRun::with_runner(bench.config.clone(), RecordingRunner::default());
        let report = run.analyze(&bench.config.paths.local_log).unwrap();

        assert_eq!(report.frame_count, 3);
        assert_eq!(report.rows.len(), 3);
        assert!(report.rows.iter().all(|r| r.verdict == Verdict::Pass));
        assert!(!report.failed());

        assert!(report.artifacts.decoded_csv.is_file());
        assert!(report.artifacts.analysis_csv.is_file());
        assert!(report.artifacts.report_html.is_file());
        assert!(report.artifacts.summary_json.is_file());
        assert!(report.artifacts.decoded_csv.starts_with(bench.dir.path()));

        let analysis = fs::read_to_string(&report.artifacts.analysis_csv).unwrap();
        assert!(analysis.contains("EngineSpeed,800,6500,3650"));
    }

    #[test]
    fn test_analyze_reports_mismatch() {
        let bench = bench("engineSpeed = 801; torque = 10; coolantTemp = 20;");
        let run = BenchRun::with_runner(bench.config.clone(), RecordingRunner::default());
        let report = run.analyze(&bench.config.paths.local_log).unwrap();

        assert!(report.failed());
        let speed = report
            .rows
            .iter()
            .find(|r| r.signal == Signal::EngineSpeed)
            .unwrap();
        assert_eq!(speed.verdict, Verdict::Fail);
    }

    #[test]
    fn test_execute_triggers_then_fetches() {
        let bench = bench(MATCHING);
        let run = BenchRun::with_runner(bench.config.clone(), RecordingRunner::default());
        let report = run.execute(false, false).unwrap();
        assert!(!report.failed());

        let calls = run.runner.calls.borrow();
        let programs: Vec<&str> = calls.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(programs, vec!["ssh", "scp"]);
    }

    #[test]
    fn test_execute_skips_remote_steps() {
        let bench = bench(MATCHING);
        let run = BenchRun::with_runner(bench.config.clone(), RecordingRunner::default());
        run.execute(true, true).unwrap();
        assert!(run.runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_trigger_failure_stops_run() {
        let bench = bench(MATCHING);
        let runner = RecordingRunner {
            fail_on: Some("ssh".to_string()),
            ..Default::default()
        };
        let run = BenchRun::with_runner(bench.config.clone(), runner);
        let err = run.execute(false, false).unwrap_err();
        assert!(matches!(err, BenchError::Remote(RemoteError::Failed { .. })));
        assert_eq!(run.runner.calls.borrow().len(), 1);
        assert!(!bench.config.paths.report_dir.exists());
    }

    #[test]
    fn test_missing_log() {
        let bench = bench(MATCHING);
        let run = BenchRun::with_runner(bench.config.clone(), RecordingRunner::default());
        let err = run.analyze(&bench.dir.path().join("missing.blf")).unwrap_err();
        assert!(matches!(err, BenchError::Decode(DecodeError::NotFound(_))));
    }

    #[test]
    fn test_decode_to_csv() {
        let bench = bench(MATCHING);
        let out = bench.dir.path().join("out/frames.csv");
        let count = decode_to_csv(&bench.config.paths.local_log, &out, Some(2)).unwrap();
        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(&out).unwrap().lines().count(), 3);
        assert_eq!(
            default_decoded_csv(&bench.config),
            bench.dir.path().join("reports/decoded.csv")
        );
    }
}
