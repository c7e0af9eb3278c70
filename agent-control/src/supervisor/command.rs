//! Messages sent to the Supervisor's single-writer thread (`spec.md` §5),
//! and the public operation signatures (`spec.md` §4.2: `ApplyConfig`,
//! `Start`/`Stop`/`Restart`, `Status`).

use super::error::SupervisorError;
use super::state::CollectorStatus;
use crate::config::{ConfigDiff, RenderedConfig};
use crate::event::Event;
use std::time::Duration;

/// Which mechanism `ApplyConfig` should use to bring the child onto the
/// new generation. Reload is preferred; restart is used when reload is
/// disallowed or when reload's own rollback has escalated (`spec.md`
/// §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyStrategy {
    #[default]
    Reload,
    Restart,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    pub dry_run: bool,
    pub strategy: ApplyStrategy,
}

/// The outcome of a non-dry-run `ApplyConfig` call that reached the child.
#[derive(Debug, Clone)]
pub struct Applied {
    pub generation: crate::config::Generation,
    pub fingerprint: crate::config::Fingerprint,
    pub diff: ConfigDiff,
}

/// The outcome of a dry-run `ApplyConfig` call: validation/render already
/// happened by the time the Supervisor is asked, so this just carries the
/// diff against the current generation back to the caller.
#[derive(Debug, Clone)]
pub struct DryRunResult {
    pub would_apply: ConfigDiff,
    pub rendered: RenderedConfig,
}

#[derive(Debug, Clone)]
pub enum ApplyResult {
    Applied(Applied),
    DryRun(DryRunResult),
    /// The rendered bytes are identical to the current generation; nothing
    /// was sent to the child (`spec.md` §8, idempotent re-apply).
    NoOp,
}

pub(super) enum SupervisorCommand {
    ApplyConfig {
        rendered: RenderedConfig,
        options: ApplyOptions,
    },
    Start,
    Stop {
        timeout: Duration,
    },
    Restart,
    Status,
    Subscribe,
    Shutdown,
}

pub(super) enum SupervisorResponse {
    Apply(Result<ApplyResult, SupervisorError>),
    Unit(Result<(), SupervisorError>),
    Status(Box<CollectorStatus>),
    Subscribed(crate::event::channel::EventConsumer<Event>),
}
