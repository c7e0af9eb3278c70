//! The Supervisor's error taxonomy (`spec.md` §7): `ApplyRejected`,
//! `ReloadFailed` (with rollback outcome attached), `ChildCrashed`,
//! `Timeout`, plus the I/O and process-management failures that don't have
//! their own named variant but still need to be represented.

use thiserror::Error;

/// What happened to the rollback attempt after a failed reload/restart
/// (`spec.md` §7, `ReloadFailed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    RolledBackOk,
    RolledBackFailed,
    EscalatedToRestart,
}

impl std::fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RollbackOutcome::RolledBackOk => "rolled_back_ok",
            RollbackOutcome::RolledBackFailed => "rolled_back_failed",
            RollbackOutcome::EscalatedToRestart => "escalated_to_restart",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("apply rejected: {0}")]
    ApplyRejected(String),

    #[error("reload failed ({step}); rollback outcome: {rollback}")]
    ReloadFailed {
        step: String,
        rollback: RollbackOutcome,
    },

    #[error("collector crashed unexpectedly: {0}")]
    ChildCrashed(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("no child process is currently running")]
    NotRunning,

    #[error("I/O error writing collector configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    ConfigWrite(#[from] fs::file::writer::WriteError),

    #[error("could not spawn collector process: {0}")]
    Spawn(String),

    #[error("could not signal collector process: {0}")]
    Signal(String),

    #[error("the supervisor's writer thread is not responding")]
    WriterUnavailable,
}
