//! Run configuration.
//!
//! Loaded from an optional JSON file; every field has a default matching the
//! standard bench setup so an empty `{}` is a valid config. The password is
//! never stored in the file, only the name of the environment variable that
//! holds it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::BenchError;
use crate::state::{DEFAULT_LOCAL_LOG, DEFAULT_REPORT_DIR, DEFAULT_SAMPLE_ROWS};

/// How the simulation is started on the bench host
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    #[default]
    PsExec,
    Ssh,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub host: String,
    pub user: String,
    /// Environment variable holding the password
    pub password_env: String,
    pub launcher: Launcher,
    pub psexec_path: PathBuf,
    /// Batch script that runs the simulation
    pub script: String,
    /// Log written by the simulation
    pub log_path: String,
    pub connect_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: "10.210.53.161".to_string(),
            user: String::new(),
            password_env: "CANBENCH_PASSWORD".to_string(),
            launcher: Launcher::PsExec,
            psexec_path: PathBuf::from("PsExec.exe"),
            script: r"C:\Users\Public\Documents\Vector\CANoe\Projects\CAN_500kBaud_2ch\bat\canoe_simulation.bat".to_string(),
            log_path: "C:/Users/Public/Documents/Vector/CANoe/Projects/CAN_500kBaud_2ch/Logs/SignalReport.blf".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl RemoteConfig {
    /// Password from the configured environment variable
    pub fn password(&self) -> Option<String> {
        std::env::var(&self.password_env).ok().filter(|p| !p.is_empty())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Test cycles the simulation runs
    pub cycles: u32,
    /// Delay between cycles
    pub delay_ms: u64,
    /// Extra time for the simulation to start and flush its log
    pub settle_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            cycles: 20,
            delay_ms: 200,
            settle_secs: 5.0,
        }
    }
}

impl TimingConfig {
    /// Blind wait between launching the simulation and fetching its log
    pub fn wait_duration(&self) -> Duration {
        let secs = self.cycles as f64 * self.delay_ms as f64 / 1000.0 + self.settle_secs;
        Duration::from_secs_f64(secs.max(0.0))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Where the fetched log is stored
    pub local_log: PathBuf,
    pub report_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            local_log: PathBuf::from(DEFAULT_LOCAL_LOG),
            report_dir: PathBuf::from(DEFAULT_REPORT_DIR),
        }
    }
}

/// CAPL variable assigned for each signal in test definitions
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalVariables {
    pub engine_speed: String,
    pub torque: String,
    pub coolant_temp: String,
}

impl Default for SignalVariables {
    fn default() -> Self {
        Self {
            engine_speed: "engineSpeed".to_string(),
            torque: "torque".to_string(),
            coolant_temp: "coolantTemp".to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// CAPL test definitions holding the expected values
    pub capl_files: Vec<PathBuf>,
    /// Only frames with this id contribute to actual values
    pub message_id: Option<u32>,
    /// Decoded frames shown in the report
    pub sample_rows: usize,
    pub max_frames: Option<usize>,
    pub variables: SignalVariables,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            capl_files: Vec::new(),
            message_id: None,
            sample_rows: DEFAULT_SAMPLE_ROWS,
            max_frames: None,
            variables: SignalVariables::default(),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub remote: RemoteConfig,
    pub timing: TimingConfig,
    pub paths: PathsConfig,
    pub analysis: AnalysisConfig,
}

impl BenchConfig {
    pub fn load(path: &Path) -> Result<Self, BenchError> {
        let text = fs::read_to_string(path).map_err(|source| BenchError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| BenchError::Config {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Config file if given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, BenchError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}
