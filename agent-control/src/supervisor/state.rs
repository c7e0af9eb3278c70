//! Observed lifecycle state of the collector child process (`spec.md` §3,
//! `CollectorState`) and the derived `HealthStatus` composite (`spec.md`
//! §3: "Derived, not stored: computed on each request").

use crate::config::{Fingerprint, Generation, UserConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::SystemTime;

/// `spec.md` §3, `CollectorState`. At most one child PID exists at any
/// time; `Running` implies that PID is live; `Failed` is terminal only
/// from the restart strategy's point of view — `ApplyConfig` can still
/// move a `Failed` supervisor back to `Starting`/`Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectorState {
    Stopped,
    Starting,
    Running,
    Reloading,
    Stopping,
    Failed,
}

/// A point-in-time snapshot of everything the API's `GET /v1/status`
/// reports (`spec.md` §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectorStatus {
    pub state: CollectorState,
    pub pid: Option<u32>,
    pub started_at: Option<SystemTime>,
    pub last_exit_code: Option<i32>,
    pub last_exit_signal: Option<i32>,
    pub last_error: Option<String>,
    pub current_generation: Option<Generation>,
    pub current_fingerprint: Option<Fingerprint>,
    pub last_applied_at: Option<SystemTime>,
    /// The `UserConfig` document the current generation was rendered from,
    /// so `GET /v1/config` can serve it back without re-reading the
    /// operator's file (`spec.md` §3, §4.3). Not serialized as part of the
    /// status response — callers that need it use this field directly.
    #[serde(skip)]
    pub current_source: Option<Arc<UserConfig>>,
}

impl Default for CollectorStatus {
    fn default() -> Self {
        Self {
            state: CollectorState::Stopped,
            pid: None,
            started_at: None,
            last_exit_code: None,
            last_exit_signal: None,
            last_error: None,
            current_generation: None,
            current_fingerprint: None,
            last_applied_at: None,
            current_source: None,
        }
    }
}

/// `spec.md` §3, `HealthStatus`: an overall tag plus a per-component
/// breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthTag {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub tag: HealthTag,
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            tag: HealthTag::Healthy,
            message: None,
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            tag: HealthTag::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            tag: HealthTag::Unhealthy,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub overall: HealthTag,
    pub components: BTreeMap<String, ComponentHealth>,
}

impl HealthStatus {
    /// The overall tag is the worst tag among the components: a single
    /// `Unhealthy` component makes the whole agent `Unhealthy`, matching
    /// the API's "200 when Healthy, 503 otherwise" contract (`spec.md`
    /// §4.3).
    pub fn from_components(components: BTreeMap<String, ComponentHealth>) -> Self {
        let overall = components
            .values()
            .map(|c| c.tag)
            .max()
            .unwrap_or(HealthTag::Healthy);
        Self { overall, components }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall == HealthTag::Healthy
    }
}

/// Derives the `collector` component of overall agent health from the
/// supervisor's current status.
pub fn collector_component_health(status: &CollectorStatus) -> ComponentHealth {
    match status.state {
        CollectorState::Running => ComponentHealth::healthy(),
        CollectorState::Starting | CollectorState::Reloading => {
            ComponentHealth::degraded("collector is starting up")
        }
        CollectorState::Stopping => ComponentHealth::degraded("collector is shutting down"),
        CollectorState::Stopped => ComponentHealth::degraded("collector is stopped"),
        CollectorState::Failed => ComponentHealth::unhealthy(
            status
                .last_error
                .clone()
                .unwrap_or_else(|| "collector failed".to_string()),
        ),
    }
}
