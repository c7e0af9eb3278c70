//! The privileged helper binary (`spec.md` §4.4): invoked via `sudo`,
//! opens its listening socket, drops root privileges to the invoking
//! user, then serves the closed set of allow-listed read operations until
//! killed. Deliberately tiny: all the logic lives in
//! `nrdot_agent_control::helper`.

use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use nrdot_agent_control::logging::LoggingConfig;
use tracing::error;

/// Command line arguments for the privileged helper process.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct HelperCli {
    /// Unix-domain socket path the helper listens on. The containing
    /// directory must already exist with `0750` permissions and
    /// `root:nrdot` ownership (`spec.md` §4.4).
    #[arg(long, default_value = "/run/nrdot/helper.sock")]
    socket: PathBuf,
}

fn main() {
    let cli = HelperCli::parse();

    if let Err(err) = LoggingConfig::default().try_init() {
        eprintln!("failed to initialize logging: {err}");
        exit(1);
    }

    if let Err(err) = nrdot_agent_control::helper::server::run(&cli.socket) {
        error!(error = %err, socket = %cli.socket.display(), "privileged helper exited with an error");
        exit(1);
    }
}
