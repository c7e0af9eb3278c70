//! The internal pub/sub event system (`spec.md` §3, `Event`).
//!
//! [`channel`] provides the broadcast primitive used for `Event`
//! distribution to subscribers (logging, the API's status cache), and the
//! request/reply primitive the Supervisor uses to serialize lifecycle
//! mutations behind its single-writer thread (`spec.md` §5).

pub mod channel;

use crate::config::Fingerprint;
use crate::supervisor::state::CollectorState;
use std::time::SystemTime;

/// A state-transition record emitted by a component. Consumers: structured
/// logging and the status cache the API server reads from.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    ConfigAccepted {
        fingerprint: Fingerprint,
        generation: u64,
        at: SystemTime,
    },
    ChildStarted {
        pid: u32,
        generation: u64,
        at: SystemTime,
    },
    ChildExited {
        generation: u64,
        exit_code: Option<i32>,
        exit_signal: Option<i32>,
        at: SystemTime,
    },
    ReloadSucceeded {
        generation: u64,
        at: SystemTime,
    },
    ReloadFailed {
        generation: u64,
        reason: String,
        at: SystemTime,
    },
    StateChanged {
        state: CollectorState,
        at: SystemTime,
    },
}
