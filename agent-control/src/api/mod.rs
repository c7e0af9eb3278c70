//! The API Server (`spec.md` §4.3): a loopback-only REST surface over the
//! Supervisor and Config Engine, generalized from a single
//! read-only `/status` endpoint (`agent_control/http_server`) into the
//! full status/health/config/reload/metrics table this spec requires,
//! keeping the conventional "bind before announcing startup, stop
//! gracefully on drop" shape.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod runner;
pub mod server;
pub mod state;

pub use config::{ensure_loopback, Host, NotLoopback, Port, ServerConfig};
pub use error::{ApiError, ApiServerError};
pub use runner::{Runner, StartedApiServer};
pub use state::AppState;
