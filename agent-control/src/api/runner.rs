//! Spawns the API server's OS thread and owns its lifetime. Grounded in
//! a synchronous-bootstrap `Runner`/`StartedApiServer`
//! pair: a dedicated thread running a current-thread tokio runtime,
//! startup failure reported synchronously before `start()` returns, and
//! graceful shutdown on drop.

use std::sync::mpsc;
use std::time::Duration;

use actix_web::web;
use tracing::{debug, error, info};

use super::config::{ensure_loopback, ServerConfig};
use super::error::ApiServerError;
use super::server::run_server;
use super::state::AppState;
use crate::utils::threads::spawn_named_thread;

const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// Everything needed to bring the API server up.
pub struct Runner {
    config: ServerConfig,
    state: AppState,
}

/// Owns the server's OS thread. Dropping it stops the server and waits
/// for the thread to exit.
pub struct StartedApiServer {
    handle: Option<actix_web::dev::ServerHandle>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Runner {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Binds and starts the server on its own thread, blocking the caller
    /// until the bind has either succeeded or failed.
    pub fn start(self) -> Result<StartedApiServer, ApiServerError> {
        ensure_loopback(&self.config.host)?;

        let (server_handle_publisher, server_handle_consumer) = mpsc::channel();
        let (startup_publisher, startup_consumer) = mpsc::channel();

        let config = self.config;
        let state = web::Data::new(self.state);

        let thread = spawn_named_thread("api-server", move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(error = %err, "failed to build API server's tokio runtime");
                    let _ = startup_publisher.send(Err(err.to_string()));
                    return;
                }
            };

            let result = runtime.block_on(run_server(config, state, server_handle_publisher, startup_publisher));
            if let Err(err) = result {
                error!(error = %err, "API server exited with an error");
            }
        });

        let startup_result = startup_consumer.recv_timeout(STARTUP_TIMEOUT).map_err(|err| match err {
            mpsc::RecvTimeoutError::Timeout => ApiServerError::StartupTimeout(STARTUP_TIMEOUT),
            mpsc::RecvTimeoutError::Disconnected => ApiServerError::StartupChannelClosed,
        })?;
        startup_result.map_err(ApiServerError::BindError)?;

        let handle = server_handle_consumer.recv().ok();

        Ok(StartedApiServer {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for StartedApiServer {
    fn drop(&mut self) {
        info!("stopping API server");

        if let Some(handle) = self.handle.take() {
            // `stop(true)` waits for in-flight requests; the handle's async
            // stop is driven from the server's own runtime, so this call
            // only needs to hand off the request, not block on it.
            let handle = handle.clone();
            std::thread::spawn(move || {
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build shutdown runtime")
                    .block_on(handle.stop(true));
            })
            .join()
            .ok();
        }

        if let Some(thread) = self.thread.take() {
            let _ = thread.join().inspect_err(|_| error!("API server thread panicked"));
            debug!("API server thread stopped");
        }
    }
}
