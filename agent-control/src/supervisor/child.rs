//! Collector child process management: spawn, stream stdout/stderr into
//! `tracing`, and shut down with a SIGTERM-then-SIGKILL grace period.
//!
//! Generalizes the conventional
//! `sub_agent/on_host/command/{command_os,shutdown}.rs` (there, a fixed
//! supervised binary with a `CommandOSNotStarted`/`CommandOSStarted` state
//! pair) to the collector binary path and arguments this agent's CLI
//! configures, and drops the file-logging side-channel since collector
//! stdout/stderr flow straight into this process's own `tracing`
//! subscriber at `info`/`warn` rather than to a side log file.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use super::error::SupervisorError;
use super::restart_policy::ExitOutcome;
use crate::utils::threads::spawn_named_thread;

/// The collector binary invocation, produced once at startup from CLI
/// arguments and held constant across every `ApplyConfig` (only the
/// `--config` path's *contents* change between generations).
#[derive(Debug, Clone)]
pub struct ExecutableData {
    pub bin: PathBuf,
    pub args: Vec<String>,
}

impl ExecutableData {
    pub fn new(bin: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            args,
        }
    }
}

/// A running collector child process.
pub struct ChildProcess {
    pid: u32,
    started_at: Instant,
    process: Child,
}

impl ChildProcess {
    /// Spawns the collector, wiring stdout/stderr into `tracing` on
    /// dedicated threads the way `command_os.rs::stream` does.
    pub fn spawn(exec: &ExecutableData) -> Result<Self, SupervisorError> {
        let mut command = Command::new(&exec.bin);
        command
            .args(&exec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut process = command
            .spawn()
            .map_err(|err| SupervisorError::Spawn(err.to_string()))?;

        let pid = process.id();

        if let Some(stdout) = process.stdout.take() {
            spawn_log_reader(stdout, pid, false);
        }
        if let Some(stderr) = process.stderr.take() {
            spawn_log_reader(stderr, pid, true);
        }

        Ok(Self {
            pid,
            started_at: Instant::now(),
            process,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Non-blocking liveness check. Reaps the process if it has already
    /// exited, returning its outcome.
    pub fn poll_exit(&mut self) -> Option<ExitOutcome> {
        match self.process.try_wait() {
            Ok(Some(status)) => Some(exit_outcome(status)),
            _ => None,
        }
    }

    /// Blocks until the child exits.
    pub fn wait(mut self) -> Result<ExitOutcome, SupervisorError> {
        let status = self.process.wait().map_err(SupervisorError::Io)?;
        Ok(exit_outcome(status))
    }

    /// Sends the platform-appropriate reload signal (`spec.md` §9: "a
    /// platform-appropriate in-place reload signal"; conventionally
    /// SIGHUP on Unix, isolated to this one call site).
    #[cfg(target_family = "unix")]
    pub fn reload(&self) -> Result<(), SupervisorError> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;
        signal::kill(Pid::from_raw(self.pid as i32), Signal::SIGHUP)
            .map_err(|err| SupervisorError::Signal(err.to_string()))
    }

    #[cfg(not(target_family = "unix"))]
    pub fn reload(&self) -> Result<(), SupervisorError> {
        Err(SupervisorError::Signal(
            "in-place reload is only supported on unix".to_string(),
        ))
    }

    /// SIGTERM, then SIGKILL if the process has not exited within `grace`.
    #[cfg(target_family = "unix")]
    pub fn shutdown(mut self, grace: Duration) -> Result<ExitOutcome, SupervisorError> {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        let pid = Pid::from_raw(self.pid as i32);
        let term_result = signal::kill(pid, Signal::SIGTERM);

        if term_result.is_ok() && !self.exited_within(grace) {
            // still running after the grace period; escalate.
            let _ = self.process.kill();
        } else if term_result.is_err() {
            let _ = self.process.kill();
        }

        self.wait()
    }

    #[cfg(not(target_family = "unix"))]
    pub fn shutdown(mut self, _grace: Duration) -> Result<ExitOutcome, SupervisorError> {
        let _ = self.process.kill();
        self.wait()
    }

    fn exited_within(&mut self, timeout: Duration) -> bool {
        const POLL_INTERVAL: Duration = Duration::from_millis(50);
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.poll_exit().is_some() {
                return true;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        false
    }
}

#[cfg(target_family = "unix")]
fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    use std::os::unix::process::ExitStatusExt;
    ExitOutcome {
        code: status.code(),
        signal: status.signal(),
    }
}

#[cfg(not(target_family = "unix"))]
fn exit_outcome(status: ExitStatus) -> ExitOutcome {
    ExitOutcome {
        code: status.code(),
        signal: None,
    }
}

fn spawn_log_reader(stream: impl std::io::Read + Send + 'static, pid: u32, is_stderr: bool) {
    let thread_name = format!("collector-log-{pid}");
    spawn_named_thread(thread_name, move || {
        let reader = BufReader::new(stream);
        for line in reader.lines().map_while(Result::ok) {
            if is_stderr {
                warn!(collector_pid = pid, "{line}");
            } else {
                info!(collector_pid = pid, "{line}");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawns_and_waits_for_a_short_lived_process() {
        let exec = ExecutableData::new("true", vec![]);
        let child = ChildProcess::spawn(&exec).unwrap();
        let outcome = child.wait().unwrap();
        assert!(outcome.success());
    }

    #[test]
    fn reports_nonzero_exit_code() {
        let exec = ExecutableData::new("false", vec![]);
        let child = ChildProcess::spawn(&exec).unwrap();
        let outcome = child.wait().unwrap();
        assert!(!outcome.success());
        assert_eq!(outcome.code, Some(1));
    }

    #[test]
    fn shutdown_terminates_a_long_running_process() {
        let exec = ExecutableData::new("sleep", vec!["10".to_string()]);
        let child = ChildProcess::spawn(&exec).unwrap();
        let start = Instant::now();
        let outcome = child.shutdown(Duration::from_secs(2)).unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert!(!outcome.success());
    }
}
