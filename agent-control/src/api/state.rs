//! Shared, read-only application state handed to every handler
//! (`spec.md` §3: "the API Server borrows, never mutates, references to
//! [Supervisor state] through read-only provider interfaces").

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use crate::config::ConfigEngine;
use crate::supervisor::SupervisorHandle;

/// Cloned into every worker via `actix_web::web::Data`. `supervisor` is
/// already a cheap, thread-safe handle (`spec.md` §5); `config_engine` is
/// shared behind an `Arc<Mutex<_>>` rather than owned outright, so the
/// runtime's SIGHUP handler and `POST /v1/reload` allocate generations
/// from the same counter instead of two independently-numbered ones.
pub struct AppState {
    pub supervisor: SupervisorHandle,
    pub config_engine: Arc<Mutex<ConfigEngine>>,
    pub user_config_path: PathBuf,
    pub read_only: bool,
}

impl AppState {
    /// Wraps a freshly constructed `ConfigEngine` for exclusive use by the
    /// API server (its generation counter is not shared with anything
    /// else).
    pub fn new(
        supervisor: SupervisorHandle,
        config_engine: ConfigEngine,
        user_config_path: impl Into<PathBuf>,
        read_only: bool,
    ) -> Self {
        Self::with_shared_config_engine(
            supervisor,
            Arc::new(Mutex::new(config_engine)),
            user_config_path,
            read_only,
        )
    }

    /// Shares an existing `Arc<Mutex<ConfigEngine>>` with the caller, so
    /// generations allocated by `POST /v1/config`/`POST /v1/reload` and by
    /// a SIGHUP reload outside the API layer come from the same counter
    /// (`runtime::Runtime::start`).
    pub fn with_shared_config_engine(
        supervisor: SupervisorHandle,
        config_engine: Arc<Mutex<ConfigEngine>>,
        user_config_path: impl Into<PathBuf>,
        read_only: bool,
    ) -> Self {
        Self {
            supervisor,
            config_engine,
            user_config_path: user_config_path.into(),
            read_only,
        }
    }
}
