//! Builds and runs the `actix-web` server itself. Grounded in the
//! teacher's `agent_control/http_server/server.rs`: binds before
//! announcing startup, reports a bind failure back over a
//! `std::sync::mpsc` channel instead of panicking, and hands the
//! `ServerHandle` back to the runner so it can stop the server on drop.

use std::sync::mpsc;

use actix_web::{web, App, HttpServer};
use tracing::{error, info};

use super::config::ServerConfig;
use super::handlers;
use super::middleware::{LoopbackGate, RequestId, RequestLogging};
use super::state::AppState;

const DEFAULT_WORKERS: usize = 2;

/// Runs the API server to completion. Returns once the server's
/// `ServerHandle::stop` has been called by the runner, or immediately if
/// the bind fails (in which case `startup_publisher` carries the error).
pub async fn run_server(
    config: ServerConfig,
    state: web::Data<AppState>,
    server_handle_publisher: mpsc::Sender<actix_web::dev::ServerHandle>,
    startup_publisher: mpsc::Sender<Result<(), String>>,
) -> std::io::Result<()> {
    info!(host = %config.host, port = %config.port, "starting API server");

    let server = match HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(RequestLogging)
            .wrap(LoopbackGate)
            .wrap(RequestId)
            .service(
                web::scope("/v1")
                    .route("/status", web::get().to(handlers::status_handler))
                    .route("/health", web::get().to(handlers::health_handler))
                    .route("/config", web::get().to(handlers::get_config_handler))
                    .route("/config", web::post().to(handlers::post_config_handler))
                    .route("/reload", web::post().to(handlers::reload_handler))
                    .route("/metrics", web::get().to(handlers::metrics_handler)),
            )
    })
    .workers(DEFAULT_WORKERS)
    .bind((config.host.0.as_str(), config.port.0))
    {
        Ok(server) => server,
        Err(err) => {
            error!(error = %err, "failed to bind API server");
            let _ = startup_publisher.send(Err(err.to_string()));
            return Err(err);
        }
    };

    let server = server.run();
    let _ = server_handle_publisher.send(server.handle());
    let _ = startup_publisher.send(Ok(()));

    server.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigEngine;
    use crate::supervisor::child::ExecutableData;
    use crate::supervisor::{RestartPolicy, SupervisorConfig};

    #[test]
    fn server_reports_bind_failure_over_the_startup_channel() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        let supervisor = crate::supervisor::spawn(SupervisorConfig::new(
            ExecutableData::new("true", vec![]),
            "/tmp/does-not-matter.yaml",
            "http://127.0.0.1:1/healthz",
            RestartPolicy::Never,
        ));
        let state = web::Data::new(AppState::new(
            supervisor,
            ConfigEngine::new("/tmp/does-not-matter.yaml"),
            "/tmp/does-not-matter.yaml",
            false,
        ));

        let config = ServerConfig {
            host: super::super::config::Host("127.0.0.1".to_string()),
            port: super::super::config::Port(port),
            read_only: false,
        };

        let (server_handle_publisher, _server_handle_consumer) = mpsc::channel();
        let (startup_publisher, startup_consumer) = mpsc::channel();

        runtime.block_on(async {
            let _ = run_server(config, state, server_handle_publisher, startup_publisher).await;
        });

        drop(listener);
        assert!(startup_consumer.recv().unwrap().is_err());
    }
}
