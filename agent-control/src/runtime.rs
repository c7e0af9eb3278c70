//! Process startup, shutdown and signal handling — the thin layer tying
//! the Config Engine, Supervisor and API Server together (`SPEC_FULL.md`
//! §2, "Agent Runtime"). Follows the conventional
//! `agent_control::run::AgentControlRunner` + `bin/main.rs` split: a
//! [`Runtime`] assembled once at startup, driven from `main` by a
//! SIGINT/SIGTERM handler that cancels a shared [`Context`] rather than
//! touching process state directly from inside the signal handler.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::config::ServerConfig;
use crate::api::runner::{Runner as ApiRunner, StartedApiServer};
use crate::api::state::AppState;
use crate::cli::Cli;
use crate::config::{ConfigEngine, ConfigError};
use crate::context::Context;
use crate::supervisor::child::ExecutableData;
use crate::supervisor::restart_policy::BackoffParams;
use crate::supervisor::{ApplyOptions, RestartPolicy, SupervisorConfig, SupervisorError, SupervisorHandle};

/// How often the main loop wakes up to check for a pending SIGHUP while
/// waiting on shutdown (`SPEC_FULL.md` §5: "all waits are subject to
/// cancellation").
const SIGNAL_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// `spec.md` §5: "Supervisor: child-grace + 5s" is the shutdown drain
/// budget; `child-grace` itself is this constant, handed to
/// `SupervisorConfig::stop_grace`.
const CHILD_STOP_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] crate::logging::LoggingError),
    #[error("failed to start the API server: {0}")]
    ApiServer(#[from] crate::api::error::ApiServerError),
    #[error("failed to install signal handler: {0}")]
    SignalHandler(String),
    #[error("supervisor failure: {0}")]
    Supervisor(#[from] SupervisorError),
}

impl RuntimeError {
    /// Exit codes per `spec.md` §6: 0 normal, 1 startup failure, 2
    /// unrecoverable supervisor failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Supervisor(_) => 2,
            _ => 1,
        }
    }
}

/// SIGHUP sets this flag (`spec.md` §6: "SIGHUP -> re-read user config
/// file and apply"); the main loop clears it after acting on it. A plain
/// atomic, not a channel, because the signal handler itself must not
/// allocate or block.
static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_sighup(_signum: i32) {
    RELOAD_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(target_family = "unix")]
fn install_sighup_handler() -> Result<(), RuntimeError> {
    use nix::sys::signal::{signal, SigHandler, Signal};
    // SAFETY: `on_sighup` only performs an atomic store, which is
    // signal-safe.
    unsafe { signal(Signal::SIGHUP, SigHandler::Handler(on_sighup)) }
        .map_err(|err| RuntimeError::SignalHandler(err.to_string()))?;
    Ok(())
}

#[cfg(not(target_family = "unix"))]
fn install_sighup_handler() -> Result<(), RuntimeError> {
    Ok(())
}

/// Builds the collector child's invocation from CLI flags
/// (`SPEC_FULL.md` §4.2: "the configurable collector binary path + args
/// produced by the Config Engine").
fn executable_data(cli: &Cli) -> ExecutableData {
    let mut args = vec![
        "--config".to_string(),
        cli.collector_config.display().to_string(),
    ];
    args.extend(cli.collector_arg.iter().cloned());
    ExecutableData::new(cli.collector_bin.clone(), args)
}

/// Everything assembled at startup, kept alive for the process lifetime.
/// Fields are dropped in declaration order: the API server stops first
/// (it only borrows the Supervisor), then the Supervisor's writer thread
/// shuts the collector down cleanly.
pub struct Runtime {
    api_server: StartedApiServer,
    supervisor: SupervisorHandle,
    config_engine: Arc<Mutex<ConfigEngine>>,
    user_config_path: PathBuf,
}

impl Runtime {
    /// Performs the full startup sequence: load + validate + render the
    /// user configuration, spawn the Supervisor, apply the first
    /// generation, and bring the API server up (`spec.md` §2: "Control
    /// flow: user edits configuration file -> Config Engine validates ->
    /// Supervisor performs atomic apply").
    pub fn start(cli: &Cli) -> Result<Self, RuntimeError> {
        let config_engine = Arc::new(Mutex::new(ConfigEngine::new(&cli.config)));
        let rendered = config_engine
            .lock()
            .expect("config engine mutex poisoned")
            .load_and_render()?;

        let restart_policy = RestartPolicy::on_failure(BackoffParams {
            max_retries: cli.max_restarts,
            ..BackoffParams::default()
        });

        let mut supervisor_config = SupervisorConfig::new(
            executable_data(cli),
            &cli.collector_config,
            cli.collector_health_url.clone(),
            restart_policy,
        );
        supervisor_config.stop_grace = CHILD_STOP_GRACE;

        let supervisor = crate::supervisor::spawn(supervisor_config);

        info!(
            generation = rendered.generation.0,
            fingerprint = %rendered.fingerprint,
            "applying initial configuration"
        );
        supervisor.apply_config(rendered, ApplyOptions::default())?;

        let state = AppState::with_shared_config_engine(
            supervisor.clone(),
            config_engine.clone(),
            &cli.config,
            cli.read_only,
        );
        let server_config = ServerConfig {
            host: cli.api_host(),
            port: cli.api_port(),
            read_only: cli.read_only,
        };
        let api_server = ApiRunner::new(server_config, state).start()?;

        install_sighup_handler()?;

        Ok(Self {
            api_server,
            supervisor,
            config_engine,
            user_config_path: cli.config.clone(),
        })
    }

    /// Blocks until `shutdown` is cancelled (SIGINT/SIGTERM), servicing
    /// SIGHUP reload requests in between (`spec.md` §6, §5). Returns once
    /// the Supervisor and API server have both drained.
    pub fn run_until_shutdown(&self, shutdown: &Context<bool>) -> Result<(), RuntimeError> {
        while !shutdown.wait_timeout(SIGNAL_POLL_INTERVAL) {
            if RELOAD_REQUESTED.swap(false, Ordering::SeqCst) {
                self.reload_from_disk();
            }
        }
        info!("shutdown requested, draining subsystems");
        Ok(())
    }

    /// Re-reads the user configuration file and applies it
    /// (`spec.md` §6: "SIGHUP -> re-read user config file and apply"),
    /// the same operation `POST /v1/reload` performs, and from the same
    /// `ConfigEngine` (shared via `Arc<Mutex<_>>` with `AppState`) so
    /// generation numbers stay monotonic across both paths. Errors are
    /// logged, not propagated: a bad on-disk edit must not bring the agent
    /// down.
    fn reload_from_disk(&self) {
        info!(path = %self.user_config_path.display(), "SIGHUP received, reloading configuration");
        let rendered = {
            let mut engine = self.config_engine.lock().expect("config engine mutex poisoned");
            engine.load_and_render()
        };
        match rendered {
            Ok(rendered) => match self.supervisor.apply_config(rendered, ApplyOptions::default()) {
                Ok(_) => info!("reload-on-SIGHUP completed"),
                Err(err) => warn!(error = %err, "reload-on-SIGHUP failed"),
            },
            Err(err) => warn!(error = %err, "could not render configuration for SIGHUP reload"),
        }
    }
}

/// Installs the SIGINT/SIGTERM handler that cancels `shutdown`
/// (`spec.md` §6). Follows the conventional
/// `create_shutdown_signal_handler`, generalized from publishing an
/// `ApplicationEvent` onto a pub/sub channel to cancelling this crate's
/// `Context` primitive directly.
pub fn install_shutdown_handler(shutdown: Context<bool>) -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(move || {
        info!("received shutdown signal");
        if let Err(err) = shutdown.cancel_all(true) {
            error!(error = %err, "failed to propagate shutdown signal");
        }
    })
}

impl Drop for Runtime {
    fn drop(&mut self) {
        if let Err(err) = self.supervisor.shutdown() {
            warn!(error = %err, "supervisor did not shut down cleanly");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reload_requested_flag_round_trips() {
        RELOAD_REQUESTED.store(false, Ordering::SeqCst);
        on_sighup(1);
        assert!(RELOAD_REQUESTED.swap(false, Ordering::SeqCst));
        assert!(!RELOAD_REQUESTED.load(Ordering::SeqCst));
    }

    #[test]
    fn executable_data_includes_config_flag_and_extra_args() {
        let cli = Cli {
            config: PathBuf::from("/etc/nrdot/config.yaml"),
            collector_config: PathBuf::from("/etc/nrdot/collector.yaml"),
            collector_bin: PathBuf::from("/usr/bin/otelcol"),
            collector_arg: vec!["--feature-gates=foo".to_string()],
            collector_health_url: "http://127.0.0.1:13133/health".to_string(),
            api_host: "127.0.0.1".to_string(),
            api_port: 49590,
            read_only: false,
            helper_socket: PathBuf::from("/run/nrdot/helper.sock"),
            max_restarts: 5,
        };
        let exec = executable_data(&cli);
        assert_eq!(exec.args[0], "--config");
        assert_eq!(exec.args[1], "/etc/nrdot/collector.yaml");
        assert_eq!(exec.args[2], "--feature-gates=foo");
    }

    #[test]
    fn exit_codes_follow_the_spec_taxonomy() {
        let config_err = RuntimeError::Config(ConfigError::Parse("bad yaml".to_string()));
        assert_eq!(config_err.exit_code(), 1);

        let supervisor_err = RuntimeError::Supervisor(SupervisorError::NotRunning);
        assert_eq!(supervisor_err.exit_code(), 2);
    }
}
