//! The Supervisor (`spec.md` §4.2, §5): owns the collector child process
//! lifecycle behind a single-writer thread, so "at most one outstanding
//! lifecycle transition" holds without an explicit lock. Generalizes the
//! teacher's `sub_agent/on_host/supervisor.rs` writer-thread shape (a
//! `Context`-cancellable loop reading a request channel, restart-policy
//! integration, `EventPublisher` fanout) to this agent's `ApplyConfig`
//! atomic-swap-with-rollback algorithm, which a process supervisor
//! (one fixed sub-agent binary, no in-place reload) does not need.

pub mod child;
pub mod command;
pub mod config_swap;
pub mod error;
pub mod readiness;
pub mod restart_policy;
pub mod state;

pub use command::{ApplyOptions, ApplyResult, ApplyStrategy, Applied, DryRunResult};
pub use error::{RollbackOutcome, SupervisorError};
pub use restart_policy::{BackoffParams, RestartPolicy};
pub use state::{CollectorState, CollectorStatus, HealthStatus};

use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use fs::file::LocalFile;
use tracing::warn;

use self::child::{ChildProcess, ExecutableData};
use self::command::{SupervisorCommand, SupervisorResponse};
use self::readiness::{probe_until_ready, LivenessCheck, ProbeOutcome};
use self::restart_policy::RestartDecision;
use crate::config::{diff, ConfigDiff, RenderedConfig};
use crate::event::channel::{pub_sub, request_channel, EventConsumer, EventPublisher, RequestReceiver, RequestSender};
use crate::event::Event;
use crate::utils::threads::spawn_named_thread;

/// How often the writer thread wakes on its own, in between commands, to
/// poll the child for an unexpected exit, check a pending backoff delay,
/// and check the "has this run held `Running` for 60s" threshold.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// `spec.md` §4.2: a run counts as successful once it has held `Running`
/// for this long, resetting `OnFailure`'s backoff after three of them.
const SUCCESSFUL_RUN_THRESHOLD: Duration = Duration::from_secs(60);

/// Everything the Supervisor needs to know once, at construction, to
/// manage the collector child (`spec.md` §3, §4.2).
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub exec: ExecutableData,
    pub config_path: PathBuf,
    pub health_url: String,
    pub restart_policy: RestartPolicy,
    pub reload_probe_budget: Duration,
    pub rollback_probe_budget: Duration,
    pub stop_grace: Duration,
}

impl SupervisorConfig {
    pub fn new(
        exec: ExecutableData,
        config_path: impl Into<PathBuf>,
        health_url: impl Into<String>,
        restart_policy: RestartPolicy,
    ) -> Self {
        Self {
            exec,
            config_path: config_path.into(),
            health_url: health_url.into(),
            restart_policy,
            reload_probe_budget: Duration::from_secs(30),
            rollback_probe_budget: Duration::from_secs(10),
            stop_grace: Duration::from_secs(10),
        }
    }
}

/// A cheaply cloneable handle to a running Supervisor. Every call is a
/// blocking round-trip through the writer thread's request channel
/// (`spec.md` §5).
#[derive(Clone)]
pub struct SupervisorHandle {
    commands: RequestSender<SupervisorCommand, SupervisorResponse>,
}

impl SupervisorHandle {
    fn call(&self, request: SupervisorCommand) -> Result<SupervisorResponse, SupervisorError> {
        self.commands
            .call(request)
            .map_err(|_| SupervisorError::WriterUnavailable)
    }

    pub fn apply_config(
        &self,
        rendered: RenderedConfig,
        options: ApplyOptions,
    ) -> Result<ApplyResult, SupervisorError> {
        match self.call(SupervisorCommand::ApplyConfig { rendered, options })? {
            SupervisorResponse::Apply(result) => result,
            _ => unreachable!("ApplyConfig always answers with Apply"),
        }
    }

    pub fn start(&self) -> Result<(), SupervisorError> {
        match self.call(SupervisorCommand::Start)? {
            SupervisorResponse::Unit(result) => result,
            _ => unreachable!("Start always answers with Unit"),
        }
    }

    pub fn stop(&self, timeout: Duration) -> Result<(), SupervisorError> {
        match self.call(SupervisorCommand::Stop { timeout })? {
            SupervisorResponse::Unit(result) => result,
            _ => unreachable!("Stop always answers with Unit"),
        }
    }

    pub fn restart(&self) -> Result<(), SupervisorError> {
        match self.call(SupervisorCommand::Restart)? {
            SupervisorResponse::Unit(result) => result,
            _ => unreachable!("Restart always answers with Unit"),
        }
    }

    pub fn status(&self) -> Result<CollectorStatus, SupervisorError> {
        match self.call(SupervisorCommand::Status)? {
            SupervisorResponse::Status(status) => Ok(*status),
            _ => unreachable!("Status always answers with Status"),
        }
    }

    pub fn subscribe(&self) -> Result<EventConsumer<Event>, SupervisorError> {
        match self.call(SupervisorCommand::Subscribe)? {
            SupervisorResponse::Subscribed(consumer) => Ok(consumer),
            _ => unreachable!("Subscribe always answers with Subscribed"),
        }
    }

    /// Stops the child (if any) and winds down the writer thread. Further
    /// calls on any clone of this handle will fail with
    /// `SupervisorError::WriterUnavailable`.
    pub fn shutdown(&self) -> Result<(), SupervisorError> {
        match self.call(SupervisorCommand::Shutdown)? {
            SupervisorResponse::Unit(result) => result,
            _ => unreachable!("Shutdown always answers with Unit"),
        }
    }
}

/// Spawns the writer thread and returns a handle to it. The child process
/// is not started: callers apply a configuration first (`spec.md` §8,
/// "the collector does not start until the first accepted generation").
pub fn spawn(config: SupervisorConfig) -> SupervisorHandle {
    let (commands_tx, commands_rx) = request_channel();
    spawn_named_thread("supervisor-writer", move || {
        run(Writer::new(config), commands_rx)
    });
    SupervisorHandle {
        commands: commands_tx,
    }
}

struct PidLiveness {
    pid: u32,
}

impl LivenessCheck for PidLiveness {
    #[cfg(target_family = "unix")]
    fn is_alive(&self) -> bool {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;
        kill(Pid::from_raw(self.pid as i32), None).is_ok()
    }

    #[cfg(not(target_family = "unix"))]
    fn is_alive(&self) -> bool {
        true
    }
}

/// The writer thread's private state. Never shared: every field is only
/// ever touched from inside `run`.
struct Writer {
    config: SupervisorConfig,
    child: Option<ChildProcess>,
    status: CollectorStatus,
    current_rendered: Option<RenderedConfig>,
    /// Set around an intentional stop/restart so `poll_child_exit` does not
    /// mistake it for a crash and hand it to the restart policy.
    expected_transition: bool,
    running_since: Option<Instant>,
    success_recorded: bool,
    restart_at: Option<Instant>,
    subscribers: Vec<EventPublisher<Event>>,
}

impl Writer {
    fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            child: None,
            status: CollectorStatus::default(),
            current_rendered: None,
            expected_transition: false,
            running_since: None,
            success_recorded: false,
            restart_at: None,
            subscribers: Vec::new(),
        }
    }

    fn current_generation_u64(&self) -> u64 {
        self.status.current_generation.map(|g| g.0).unwrap_or(0)
    }

    fn emit(&self, event: Event) {
        for subscriber in &self.subscribers {
            let _ = subscriber.publish(event.clone());
        }
    }

    fn handle_command(&mut self, cmd: SupervisorCommand) -> SupervisorResponse {
        match cmd {
            SupervisorCommand::ApplyConfig { rendered, options } => {
                SupervisorResponse::Apply(self.apply_config(rendered, options))
            }
            SupervisorCommand::Start => SupervisorResponse::Unit(self.start()),
            SupervisorCommand::Stop { timeout } => SupervisorResponse::Unit(self.stop_child(timeout)),
            SupervisorCommand::Restart => SupervisorResponse::Unit(self.restart()),
            SupervisorCommand::Status => SupervisorResponse::Status(Box::new(self.status.clone())),
            SupervisorCommand::Subscribe => {
                let (publisher, consumer) = pub_sub();
                self.subscribers.push(publisher);
                SupervisorResponse::Subscribed(consumer)
            }
            SupervisorCommand::Shutdown => SupervisorResponse::Unit(self.handle_shutdown()),
        }
    }

    // -- ApplyConfig (spec.md §4.2) -----------------------------------

    fn apply_config(
        &mut self,
        rendered: RenderedConfig,
        options: ApplyOptions,
    ) -> Result<ApplyResult, SupervisorError> {
        let config_diff = diff(self.current_rendered.as_ref(), &rendered);

        if options.dry_run {
            return Ok(ApplyResult::DryRun(DryRunResult {
                would_apply: config_diff,
                rendered,
            }));
        }

        if let Some(current) = &self.current_rendered {
            if current.same_content_as(&rendered) {
                return Ok(ApplyResult::NoOp);
            }
        }

        match options.strategy {
            ApplyStrategy::Reload => self.apply_via_reload(rendered, config_diff),
            ApplyStrategy::Restart => self.apply_via_restart(rendered, config_diff),
        }
    }

    fn apply_via_reload(
        &mut self,
        rendered: RenderedConfig,
        config_diff: ConfigDiff,
    ) -> Result<ApplyResult, SupervisorError> {
        config_swap::swap_in(&LocalFile, &LocalFile, &self.config.config_path, &rendered)?;

        if self.child.is_none() {
            self.current_rendered = Some(rendered.clone());
            self.start_child()?;
            return Ok(ApplyResult::Applied(self.commit(rendered, config_diff)));
        }

        self.status.state = CollectorState::Reloading;
        let pid = self.status.pid.expect("a running child has a pid");
        if let Some(child) = self.child.as_ref() {
            child.reload()?;
        }

        let liveness = PidLiveness { pid };
        match probe_until_ready(&self.config.health_url, &liveness, self.config.reload_probe_budget) {
            ProbeOutcome::Ready => {
                self.status.state = CollectorState::Running;
                self.current_rendered = Some(rendered.clone());
                let applied = self.commit(rendered, config_diff);
                self.emit(Event::ReloadSucceeded {
                    generation: applied.generation.0,
                    at: SystemTime::now(),
                });
                Ok(ApplyResult::Applied(applied))
            }
            outcome => {
                let reason = format!("reload did not become ready: {outcome:?}");
                self.emit(Event::ReloadFailed {
                    generation: self.current_generation_u64(),
                    reason: reason.clone(),
                    at: SystemTime::now(),
                });
                self.rollback_reload(reason)
            }
        }
    }

    /// `spec.md` §4.2, step 7: rename `.prev` back into place, try to
    /// reload the child back onto it, and if that does not recover within
    /// `rollback_probe_budget` either, escalate to a full restart on the
    /// rolled-back config.
    fn rollback_reload(&mut self, reason: String) -> Result<ApplyResult, SupervisorError> {
        if config_swap::rollback(&LocalFile, &self.config.config_path).is_err() {
            self.status.state = CollectorState::Failed;
            self.status.last_error = Some(reason.clone());
            return Err(SupervisorError::ReloadFailed {
                step: reason,
                rollback: RollbackOutcome::RolledBackFailed,
            });
        }

        if let Some(child) = self.child.as_ref() {
            let pid = child.pid();
            if child.reload().is_ok() {
                let liveness = PidLiveness { pid };
                if probe_until_ready(&self.config.health_url, &liveness, self.config.rollback_probe_budget)
                    .is_ready()
                {
                    self.status.state = CollectorState::Running;
                    return Err(SupervisorError::ReloadFailed {
                        step: reason,
                        rollback: RollbackOutcome::RolledBackOk,
                    });
                }
            }
        }

        self.expected_transition = true;
        if let Some(child) = self.child.take() {
            let _ = child.shutdown(self.config.stop_grace);
        }
        self.expected_transition = false;
        self.running_since = None;

        if self.start_child().is_err() {
            self.status.state = CollectorState::Failed;
            self.status.last_error = Some(reason.clone());
        }
        Err(SupervisorError::ReloadFailed {
            step: reason,
            rollback: RollbackOutcome::EscalatedToRestart,
        })
    }

    fn apply_via_restart(
        &mut self,
        rendered: RenderedConfig,
        config_diff: ConfigDiff,
    ) -> Result<ApplyResult, SupervisorError> {
        config_swap::swap_in(&LocalFile, &LocalFile, &self.config.config_path, &rendered)?;

        self.expected_transition = true;
        if let Some(child) = self.child.take() {
            let _ = child.shutdown(self.config.stop_grace);
        }
        self.expected_transition = false;
        self.running_since = None;

        self.current_rendered = Some(rendered.clone());
        self.start_child()?;
        Ok(ApplyResult::Applied(self.commit(rendered, config_diff)))
    }

    fn commit(&mut self, rendered: RenderedConfig, config_diff: ConfigDiff) -> Applied {
        let generation = rendered.generation;
        let fingerprint = rendered.fingerprint.clone();
        self.status.current_generation = Some(generation);
        self.status.current_fingerprint = Some(fingerprint.clone());
        self.status.current_source = rendered.source.clone();
        self.status.last_applied_at = Some(SystemTime::now());
        self.emit(Event::ConfigAccepted {
            fingerprint: fingerprint.clone(),
            generation: generation.0,
            at: SystemTime::now(),
        });
        Applied {
            generation,
            fingerprint,
            diff: config_diff,
        }
    }

    // -- Start / Stop / Restart ----------------------------------------

    fn start(&mut self) -> Result<(), SupervisorError> {
        if self.child.is_some() {
            return Ok(());
        }
        if self.current_rendered.is_none() {
            return Err(SupervisorError::ApplyRejected(
                "no configuration has been applied yet".to_string(),
            ));
        }
        self.start_child()
    }

    fn stop_child(&mut self, timeout: Duration) -> Result<(), SupervisorError> {
        let Some(child) = self.child.take() else {
            return Err(SupervisorError::NotRunning);
        };

        self.expected_transition = true;
        self.status.state = CollectorState::Stopping;
        let outcome = child.shutdown(timeout)?;
        self.expected_transition = false;
        self.running_since = None;

        self.status.state = CollectorState::Stopped;
        self.status.pid = None;
        self.status.last_exit_code = outcome.code;
        self.status.last_exit_signal = outcome.signal;
        self.emit(Event::ChildExited {
            generation: self.current_generation_u64(),
            exit_code: outcome.code,
            exit_signal: outcome.signal,
            at: SystemTime::now(),
        });
        Ok(())
    }

    fn restart(&mut self) -> Result<(), SupervisorError> {
        if self.child.is_some() {
            self.stop_child(self.config.stop_grace)?;
        }
        self.start()
    }

    fn handle_shutdown(&mut self) -> Result<(), SupervisorError> {
        if self.child.is_some() {
            self.stop_child(self.config.stop_grace)?;
        }
        Ok(())
    }

    fn start_child(&mut self) -> Result<(), SupervisorError> {
        let child = ChildProcess::spawn(&self.config.exec)?;
        let pid = child.pid();
        self.child = Some(child);
        self.status.state = CollectorState::Starting;
        self.status.pid = Some(pid);
        self.status.started_at = Some(SystemTime::now());
        self.status.last_error = None;
        self.emit(Event::ChildStarted {
            pid,
            generation: self.current_generation_u64(),
            at: SystemTime::now(),
        });

        let liveness = PidLiveness { pid };
        match probe_until_ready(&self.config.health_url, &liveness, self.config.reload_probe_budget) {
            ProbeOutcome::Ready => {
                self.status.state = CollectorState::Running;
                self.running_since = Some(Instant::now());
                self.success_recorded = false;
                Ok(())
            }
            outcome => {
                self.status.state = CollectorState::Failed;
                self.status.last_error = Some(format!("collector did not become ready: {outcome:?}"));
                Err(SupervisorError::Timeout(self.config.reload_probe_budget))
            }
        }
    }

    // -- Background ticking: unexpected exit, backoff, success ---------

    fn tick(&mut self) {
        self.poll_child_exit();
        self.maybe_start_after_backoff();
        self.maybe_record_successful_run();
    }

    fn poll_child_exit(&mut self) {
        if self.expected_transition {
            return;
        }
        let Some(child) = self.child.as_mut() else {
            return;
        };
        let Some(outcome) = child.poll_exit() else {
            return;
        };

        self.child = None;
        self.running_since = None;
        self.status.pid = None;
        self.status.last_exit_code = outcome.code;
        self.status.last_exit_signal = outcome.signal;
        self.emit(Event::ChildExited {
            generation: self.current_generation_u64(),
            exit_code: outcome.code,
            exit_signal: outcome.signal,
            at: SystemTime::now(),
        });

        match self.config.restart_policy.on_unexpected_exit(outcome) {
            RestartDecision::Stop => {
                self.status.state = CollectorState::Stopped;
            }
            RestartDecision::RetryAfter(delay) => {
                self.status.state = CollectorState::Starting;
                self.restart_at = Some(Instant::now() + delay);
            }
            RestartDecision::GiveUp => {
                self.status.state = CollectorState::Failed;
                self.status.last_error = Some("restart policy exhausted max_retries".to_string());
            }
        }
    }

    fn maybe_start_after_backoff(&mut self) {
        let Some(at) = self.restart_at else {
            return;
        };
        if Instant::now() < at {
            return;
        }
        self.restart_at = None;
        if let Err(err) = self.start_child() {
            warn!(error = %err, "scheduled restart attempt failed");
        }
    }

    fn maybe_record_successful_run(&mut self) {
        let Some(since) = self.running_since else {
            return;
        };
        if self.success_recorded || since.elapsed() < SUCCESSFUL_RUN_THRESHOLD {
            return;
        }
        self.config.restart_policy.record_successful_run();
        self.success_recorded = true;
    }
}

fn run(mut writer: Writer, commands: RequestReceiver<SupervisorCommand, SupervisorResponse>) {
    loop {
        match commands.recv_timeout(POLL_INTERVAL) {
            Ok(envelope) => {
                let (request, reply) = envelope.into_parts();
                let shutting_down = matches!(request, SupervisorCommand::Shutdown);
                let response = writer.handle_command(request);
                let _ = reply.send(response);
                if shutting_down {
                    return;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return,
        }
        writer.tick();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exec(bin: &str, args: Vec<&str>) -> ExecutableData {
        ExecutableData::new(bin, args.into_iter().map(str::to_string).collect())
    }

    fn handle_with_no_collector() -> SupervisorHandle {
        // "true" exits 0 immediately, so any readiness probe against it
        // times out; these tests only exercise state that does not depend
        // on the collector ever becoming ready.
        let config = SupervisorConfig::new(
            exec("true", vec![]),
            "/tmp/does-not-matter.yaml",
            "http://127.0.0.1:0/health",
            RestartPolicy::Never,
        );
        spawn(config)
    }

    #[test]
    fn status_before_any_apply_is_stopped() {
        let handle = handle_with_no_collector();
        let status = handle.status().unwrap();
        assert_eq!(status.state, CollectorState::Stopped);
        assert!(status.current_generation.is_none());
        handle.shutdown().unwrap();
    }

    #[test]
    fn start_without_a_prior_apply_is_rejected() {
        let handle = handle_with_no_collector();
        let err = handle.start().unwrap_err();
        assert!(matches!(err, SupervisorError::ApplyRejected(_)));
        handle.shutdown().unwrap();
    }

    #[test]
    fn stop_without_a_running_child_reports_not_running() {
        let handle = handle_with_no_collector();
        let err = handle.stop(Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, SupervisorError::NotRunning));
        handle.shutdown().unwrap();
    }

    #[test]
    fn subscribe_receives_events_published_by_later_commands() {
        // No collector ever becomes ready against this health url, so the
        // apply itself fails, but ChildStarted must still have been
        // published before the readiness probe is attempted.
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("collector.yaml");
        let rendered = RenderedConfig::new(crate::config::Generation::initial(), "receivers: {}\n".to_string());

        let mut config = SupervisorConfig::new(
            exec("sleep", vec!["5"]),
            config_path,
            "http://127.0.0.1:0/health",
            RestartPolicy::Never,
        );
        config.reload_probe_budget = Duration::from_millis(200);
        let handle = spawn(config);
        let events = handle.subscribe().unwrap();
        let _ = handle.apply_config(rendered, ApplyOptions::default());

        let event = events.recv().unwrap();
        assert!(matches!(event, Event::ChildStarted { .. }));
        handle.shutdown().unwrap();
    }
}
