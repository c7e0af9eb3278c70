//! Command line interface for the agent control process.
//!
//! Parses arguments with [`clap`] into a [`Cli`], the conventional
//! `cli.rs` does, generalized to this spec's collector-binary and
//! API-server flags instead of a fleet-management agent's flags.

use std::path::PathBuf;

use clap::Parser;

use crate::api::config::{Host, Port};

/// Command line arguments for the NRDOT-HOST agent control process.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the operator-authored user configuration document
    /// (`spec.md` §6).
    #[arg(long, default_value = "/etc/nrdot/config.yaml")]
    pub config: PathBuf,

    /// Path the rendered collector configuration is written to
    /// (`spec.md` §6: "a file written at a well-known path, convention
    /// `/etc/nrdot/collector.yaml`").
    #[arg(long, default_value = "/etc/nrdot/collector.yaml")]
    pub collector_config: PathBuf,

    /// The collector binary to supervise.
    #[arg(long, default_value = "/usr/bin/otelcol")]
    pub collector_bin: PathBuf,

    /// Extra arguments passed to the collector binary, after `--config
    /// <collector-config>`.
    #[arg(long)]
    pub collector_arg: Vec<String>,

    /// The collector's health endpoint, polled by the readiness probe
    /// (`spec.md` §4.2).
    #[arg(long, default_value = "http://127.0.0.1:13133/health")]
    pub collector_health_url: String,

    /// Loopback host the API server binds to (`spec.md` §4.3).
    #[arg(long, default_value = "127.0.0.1")]
    pub api_host: String,

    /// Port the API server binds to.
    #[arg(long, default_value_t = 49590)]
    pub api_port: u16,

    /// Run the API server in read-only mode: mutating endpoints return 403
    /// without contacting the Supervisor (`spec.md` §4.3).
    #[arg(long)]
    pub read_only: bool,

    /// Path to the privileged helper's unix-domain socket, used by
    /// `HelperClient` for self-observation reads (`spec.md` §4.4).
    #[arg(long, default_value = "/run/nrdot/helper.sock")]
    pub helper_socket: PathBuf,

    /// Maximum number of consecutive failed restarts before the restart
    /// policy gives up and the Supervisor settles into `Failed`
    /// (`spec.md` §4.2).
    #[arg(long, default_value_t = 5)]
    pub max_restarts: u32,
}

impl Cli {
    /// Parses `argv`. Kept separate from `main` so integration tests can
    /// call it with an explicit argument list.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn api_host(&self) -> Host {
        Host(self.api_host.clone())
    }

    pub fn api_port(&self) -> Port {
        Port(self.api_port)
    }
}
