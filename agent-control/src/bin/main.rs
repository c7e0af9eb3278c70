//! The agent control process entry point. Follows the conventional
//! `bin/main.rs`: parse CLI flags, initialize logging as early as
//! possible, install the shutdown signal handler, hand off to the
//! assembled [`Runtime`], and map its result onto the exit codes `spec.md`
//! §6 promises (0 normal, 1 startup failure, 2 unrecoverable supervisor
//! failure).

use std::process::exit;

use fs::file::reader::FileReader;
use fs::file::LocalFile;
use nrdot_agent_control::cli::Cli;
use nrdot_agent_control::context::Context;
use nrdot_agent_control::runtime::{install_shutdown_handler, Runtime};
use tracing::{error, info};

fn main() {
    let cli = Cli::parse_args();

    if let Err(err) = init_logging(&cli) {
        // Logging itself failed to start; fall back to eprintln so the
        // operator sees *something* before we exit.
        eprintln!("failed to initialize logging: {err}");
        exit(1);
    }

    info!(config = %cli.config.display(), "starting nrdot-agent-control");

    let shutdown: Context<bool> = Context::new();
    if let Err(err) = install_shutdown_handler(shutdown.clone()) {
        error!(error = %err, "failed to install shutdown signal handler");
        exit(1);
    }

    let runtime = match Runtime::start(&cli) {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "startup failed");
            exit(err.exit_code());
        }
    };

    if let Err(err) = runtime.run_until_shutdown(&shutdown) {
        error!(error = %err, "runtime exited with an error");
        exit(err.exit_code());
    }

    drop(runtime);
    info!("exited gracefully");
}

/// Reads and parses the user configuration document once, solely to pull
/// its `logging { level, format }` section, so the global `tracing`
/// subscriber is installed before [`Runtime::start`] does anything else
/// worth logging. `Runtime::start` re-reads and re-renders the same file
/// through the `ConfigEngine` immediately afterwards — the redundant read
/// is cheap and keeps logging setup independent of the Supervisor/Config
/// Engine wiring.
fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let yaml = LocalFile.read(&cli.config)?;
    let config = nrdot_agent_control::config::parse_and_validate(&yaml)?;
    config.logging.try_init()?;
    Ok(())
}
