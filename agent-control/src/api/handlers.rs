//! Request handlers for the versioned REST surface (`spec.md` §4.3). Each
//! handler is a short function turning the request into a Supervisor/Config
//! Engine call, kept thin and delegating, generalized
//! from a single read-only `/status` endpoint to this
//! full status/health/config-get/config-put/reload/metrics table.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::ApiError;
use super::state::AppState;
use crate::config::{self, ConfigError, UserConfig};
use crate::supervisor::{state::collector_component_health, ApplyOptions, ApplyResult, ApplyStrategy, HealthStatus};
use fs::file::reader::FileReader;
use fs::file::writer::FileWriter;
use fs::file::LocalFile;

pub async fn status_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let status = web::block(move || state.supervisor.status())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    Ok(HttpResponse::Ok().json(status))
}

pub async fn health_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let status = web::block(move || state.supervisor.status())
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;

    let mut components = BTreeMap::new();
    components.insert("collector".to_string(), collector_component_health(&status));
    let health = HealthStatus::from_components(components);

    let code = if health.is_healthy() {
        actix_web::http::StatusCode::OK
    } else {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(HttpResponse::build(code).json(health))
}

#[derive(Serialize)]
struct GetConfigResponse {
    config: UserConfig,
    generation: Option<u64>,
    fingerprint: Option<String>,
}

pub async fn get_config_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let status = web::block({
        let state = state.clone();
        move || state.supervisor.status()
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))??;

    // Once a generation has been accepted, serve back the exact document it
    // was rendered from. Before the first apply there is nothing to derive
    // it from, so fall back to whatever is currently on disk.
    let user_config = match &status.current_source {
        Some(source) => source.as_ref().clone(),
        None => {
            let path = state.user_config_path.clone();
            let yaml = web::block(move || LocalFile.read(&path))
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))?
                .map_err(|err| ApiError::Internal(err.to_string()))?;
            config::parse_and_validate(&yaml)?
        }
    };

    Ok(HttpResponse::Ok().json(GetConfigResponse {
        config: user_config,
        generation: status.current_generation.map(|g| g.0),
        fingerprint: status.current_fingerprint.map(|f| f.to_string()),
    }))
}

#[derive(Deserialize)]
pub struct ApplyQuery {
    #[serde(default)]
    pub dry_run: bool,
}

pub async fn post_config_handler(
    state: web::Data<AppState>,
    body: web::Json<UserConfig>,
    query: web::Query<ApplyQuery>,
) -> Result<HttpResponse, ApiError> {
    if state.read_only {
        return Err(ApiError::Forbidden(
            "the API server is running in read-only mode".to_string(),
        ));
    }

    let user_config = body.into_inner();
    let dry_run = query.dry_run;
    let path = state.user_config_path.clone();

    let result = web::block({
        let state = state.clone();
        move || -> Result<ApplyResult, ApiError> {
            config::validate::validate(&user_config).map_err(ConfigError::validation)?;

            let rendered = {
                let mut engine = state.config_engine.lock().expect("config engine mutex poisoned");
                let generation = engine.allocate_generation();
                config::render::render(&user_config, generation)?
            };

            let options = ApplyOptions {
                dry_run,
                strategy: ApplyStrategy::Reload,
            };
            let result = state.supervisor.apply_config(rendered.clone(), options)?;

            if !dry_run && matches!(result, ApplyResult::Applied(_)) {
                LocalFile
                    .write(&path, rendered.yaml.clone())
                    .map_err(|err| ApiError::Internal(err.to_string()))?;
            }
            Ok(result)
        }
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    super::metrics::metrics()
        .config_applies_total
        .with_label_values(&[apply_outcome_label(&result)])
        .inc();

    Ok(HttpResponse::Ok().json(ApplyResponseBody::from(result?)))
}

fn apply_outcome_label(result: &Result<ApplyResult, ApiError>) -> &'static str {
    match result {
        Ok(ApplyResult::Applied(_)) => "applied",
        Ok(ApplyResult::DryRun(_)) => "dry_run",
        Ok(ApplyResult::NoOp) => "no_op",
        Err(_) => "error",
    }
}

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum ApplyResponseBody {
    Applied {
        generation: u64,
        fingerprint: String,
        diff: crate::config::ConfigDiff,
    },
    DryRun {
        would_apply: crate::config::ConfigDiff,
    },
    NoOp,
}

impl From<ApplyResult> for ApplyResponseBody {
    fn from(result: ApplyResult) -> Self {
        match result {
            ApplyResult::Applied(applied) => ApplyResponseBody::Applied {
                generation: applied.generation.0,
                fingerprint: applied.fingerprint.to_string(),
                diff: applied.diff,
            },
            ApplyResult::DryRun(dry_run) => ApplyResponseBody::DryRun {
                would_apply: dry_run.would_apply,
            },
            ApplyResult::NoOp => ApplyResponseBody::NoOp,
        }
    }
}

pub async fn reload_handler(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    if state.read_only {
        return Err(ApiError::Forbidden(
            "the API server is running in read-only mode".to_string(),
        ));
    }

    let result = web::block({
        let state = state.clone();
        move || -> Result<ApplyResult, ApiError> {
            let rendered = {
                let mut engine = state.config_engine.lock().expect("config engine mutex poisoned");
                engine.load_and_render()?
            };
            Ok(state.supervisor.apply_config(rendered, ApplyOptions::default())?)
        }
    })
    .await
    .map_err(|err| ApiError::Internal(err.to_string()))?;

    super::metrics::metrics()
        .config_reloads_total
        .with_label_values(&[apply_outcome_label(&result)])
        .inc();

    Ok(HttpResponse::Ok().json(ApplyResponseBody::from(result?)))
}

pub async fn metrics_handler() -> Result<HttpResponse, ApiError> {
    use prometheus::{Encoder, TextEncoder};

    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, App};
    use serde_json::json;

    use crate::config::ConfigEngine;
    use crate::supervisor::child::ExecutableData;
    use crate::supervisor::{RestartPolicy, SupervisorConfig};

    fn test_state() -> web::Data<AppState> {
        let supervisor = crate::supervisor::spawn(SupervisorConfig::new(
            ExecutableData::new("true", vec![]),
            "/tmp/does-not-matter.yaml",
            "http://127.0.0.1:0/health",
            RestartPolicy::Never,
        ));
        web::Data::new(AppState::new(
            supervisor,
            ConfigEngine::new("/tmp/does-not-matter.yaml"),
            "/tmp/does-not-matter.yaml",
            false,
        ))
    }

    // spec.md §8 Scenario 2: "Invalid config rejected" — missing
    // `license_key` must be rejected with 400 `ConfigValidationError`
    // referencing `license_key`, and the current generation must stay
    // unchanged. This covers the `render`-without-`validate` regression on
    // the `POST /v1/config` path.
    #[actix_web::test]
    async fn post_config_rejects_missing_license_key_without_applying() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/v1/config", web::post().to(post_config_handler)),
        )
        .await;

        let body = json!({
            "service": {"name": "checkout"},
            "export": {"endpoint": "https://otlp.nr-data.net:4317"},
        });
        let req = test::TestRequest::post().uri("/v1/config").set_json(&body).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
        let payload: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(payload["error"]["kind"], "ConfigValidationError");
        assert!(payload["error"]["message"].as_str().unwrap().contains("license_key"));

        let status = state.supervisor.status().unwrap();
        assert!(status.current_generation.is_none());
    }

    // Same invalid document, but with `dry_run=true`: spec.md §4.3 still
    // requires validation to run before any diff/render is returned.
    #[actix_web::test]
    async fn post_config_dry_run_also_validates_before_rendering() {
        let state = test_state();
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .route("/v1/config", web::post().to(post_config_handler)),
        )
        .await;

        let body = json!({
            "service": {"name": ""},
            "export": {"endpoint": "https://otlp.nr-data.net:4317"},
        });
        let req = test::TestRequest::post()
            .uri("/v1/config?dry_run=true")
            .set_json(&body)
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), actix_web::http::StatusCode::BAD_REQUEST);
    }
}
