//! Bench host access: start the simulation and copy its log back.
//!
//! Everything shells out to the standard tools (`PsExec`, `ssh`, `scp`), so
//! their own authentication and host-key handling apply.

use std::fs;
use std::path::Path;
use std::process::Command;

use crate::config::{Launcher, RemoteConfig};
use crate::error::RemoteError;

const PASSWORD_MASK: &str = "********";

/// Runs an external program to completion
pub trait CommandRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), RemoteError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[String]) -> Result<(), RemoteError> {
        (**self).run(program, args)
    }
}

/// Runs commands on the local machine, inheriting stdout and stderr
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<(), RemoteError> {
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| RemoteError::Spawn {
                program: program.to_string(),
                source,
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(RemoteError::Failed {
                program: program.to_string(),
                status: status.to_string(),
            })
        }
    }
}

/// One bench host and the runner used to reach it
pub struct RemoteSession<'a, R: CommandRunner> {
    config: &'a RemoteConfig,
    runner: R,
}

impl<'a, R: CommandRunner> RemoteSession<'a, R> {
    pub fn new(config: &'a RemoteConfig, runner: R) -> Self {
        Self { config, runner }
    }

    fn target(&self) -> String {
        if self.config.user.is_empty() {
            self.config.host.clone()
        } else {
            format!("{}@{}", self.config.user, self.config.host)
        }
    }

    fn ssh_options(&self) -> Vec<String> {
        vec![
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ]
    }

    /// Program and arguments that start the simulation
    fn launch_command(&self) -> Result<(String, Vec<String>), RemoteError> {
        match self.config.launcher {
            Launcher::PsExec => {
                let mut args = vec![format!(r"\\{}", self.config.host)];
                // without a user PsExec runs under the caller's credentials
                if !self.config.user.is_empty() {
                    let password = self.config.password().ok_or_else(|| {
                        RemoteError::MissingPassword(self.config.password_env.clone())
                    })?;
                    args.extend([
                        "-u".to_string(),
                        self.config.user.clone(),
                        "-p".to_string(),
                        password,
                    ]);
                }
                args.push("-i".to_string());
                args.push(self.config.script.clone());
                Ok((self.config.psexec_path.display().to_string(), args))
            }
            Launcher::Ssh => {
                let mut args = self.ssh_options();
                args.push(self.target());
                args.push(self.config.script.clone());
                Ok(("ssh".to_string(), args))
            }
        }
    }

    fn run_logged(&self, program: &str, args: &[String]) -> Result<(), RemoteError> {
        let password = self.config.password();
        let shown: Vec<&str> = args
            .iter()
            .map(|arg| match &password {
                Some(p) if arg == p => PASSWORD_MASK,
                _ => arg.as_str(),
            })
            .collect();
        tracing::info!("Running {} {}", program, shown.join(" "));
        self.runner.run(program, args)
    }

    /// Start the simulation on the bench host
    pub fn launch_simulation(&self) -> Result<(), RemoteError> {
        let (program, args) = self.launch_command()?;
        self.run_logged(&program, &args)?;
        tracing::info!("Simulation started on {}", self.config.host);
        Ok(())
    }

    /// Copy `remote` from the bench host to `local`
    pub fn fetch(&self, remote: &str, local: &Path) -> Result<(), RemoteError> {
        if let Some(parent) = local.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| RemoteError::LocalPath {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut args = self.ssh_options();
        args.push(format!("{}:{}", self.target(), remote));
        args.push(local.display().to_string());
        self.run_logged("scp", &args)?;
        tracing::info!("Fetched {} to {}", remote, local.display());
        Ok(())
    }

    /// Fetch the configured simulation log
    pub fn fetch_log(&self, local: &Path) -> Result<(), RemoteError> {
        self.fetch(&self.config.log_path, local)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingRunner;
    use super::*;

    fn ssh_config() -> RemoteConfig {
        RemoteConfig {
            host: "bench-07".to_string(),
            user: "tester".to_string(),
            launcher: Launcher::Ssh,
            script: "/opt/bench/run_simulation.sh".to_string(),
            log_path: "/opt/bench/logs/SignalReport.blf".to_string(),
            connect_timeout_secs: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_ssh_launch() {
        let config = ssh_config();
        let session = RemoteSession::new(&config, RecordingRunner::default());
        session.launch_simulation().unwrap();

        let calls = session.runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ssh");
        assert_eq!(
            calls[0].1,
            vec![
                "-o",
                "ConnectTimeout=5",
                "-o",
                "BatchMode=yes",
                "tester@bench-07",
                "/opt/bench/run_simulation.sh"
            ]
        );
    }

    #[test]
    fn test_psexec_requires_password() {
        let config = RemoteConfig {
            user: "bench".to_string(),
            password_env: "CANBENCH_TEST_PSEXEC_UNSET".to_string(),
            ..Default::default()
        };
        let session = RemoteSession::new(&config, RecordingRunner::default());
        let err = session.launch_simulation().unwrap_err();
        assert!(matches!(err, RemoteError::MissingPassword(ref var) if var == "CANBENCH_TEST_PSEXEC_UNSET"));
        assert!(session.runner.calls.borrow().is_empty());
    }

    #[test]
    fn test_psexec_without_user_uses_current_credentials() {
        let config = RemoteConfig {
            password_env: "CANBENCH_TEST_PSEXEC_NO_USER".to_string(),
            script: r"C:\bench\run.bat".to_string(),
            ..Default::default()
        };
        assert!(config.user.is_empty());
        let session = RemoteSession::new(&config, RecordingRunner::default());
        session.launch_simulation().unwrap();

        let calls = session.runner.calls.borrow();
        assert_eq!(calls[0].0, "PsExec.exe");
        assert_eq!(calls[0].1, vec![r"\\10.210.53.161", "-i", r"C:\bench\run.bat"]);
    }

    #[test]
    fn test_psexec_launch() {
        std::env::set_var("CANBENCH_TEST_PSEXEC_PASSWORD", "s3cret");
        let config = RemoteConfig {
            host: "10.0.0.5".to_string(),
            user: "bench".to_string(),
            password_env: "CANBENCH_TEST_PSEXEC_PASSWORD".to_string(),
            script: r"C:\bench\run.bat".to_string(),
            ..Default::default()
        };
        let session = RemoteSession::new(&config, RecordingRunner::default());
        session.launch_simulation().unwrap();

        let calls = session.runner.calls.borrow();
        assert_eq!(calls[0].0, "PsExec.exe");
        assert_eq!(
            calls[0].1,
            vec![r"\\10.0.0.5", "-u", "bench", "-p", "s3cret", "-i", r"C:\bench\run.bat"]
        );
    }

    #[test]
    fn test_fetch_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("logs/SignalReport.blf");
        let config = ssh_config();
        let session = RemoteSession::new(&config, RecordingRunner::default());
        session.fetch_log(&local).unwrap();

        assert!(dir.path().join("logs").is_dir());
        let calls = session.runner.calls.borrow();
        assert_eq!(calls[0].0, "scp");
        assert_eq!(
            calls[0].1[4],
            "tester@bench-07:/opt/bench/logs/SignalReport.blf"
        );
        assert_eq!(calls[0].1[5], local.display().to_string());
    }

    #[test]
    fn test_failure_is_reported() {
        let config = ssh_config();
        let runner = RecordingRunner {
            fail_on: Some("scp".to_string()),
            ..Default::default()
        };
        let session = RemoteSession::new(&config, runner);
        let err = session.fetch("/tmp/x.blf", Path::new("x.blf")).unwrap_err();
        assert!(matches!(err, RemoteError::Failed { ref program, .. } if program == "scp"));
    }

    #[test]
    fn test_host_without_user() {
        let config = RemoteConfig {
            user: String::new(),
            ..ssh_config()
        };
        let session = RemoteSession::new(&config, RecordingRunner::default());
        session.launch_simulation().unwrap();
        assert_eq!(session.runner.calls.borrow()[0].1[4], "bench-07");
    }

    #[test]
    fn test_system_runner_spawn_error() {
        let err = SystemRunner
            .run("canbench-no-such-program", &[])
            .unwrap_err();
        assert!(matches!(err, RemoteError::Spawn { .. }));
    }
}
