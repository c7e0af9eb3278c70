//! The API layer's error envelope (`spec.md` §6, §7): flattens
//! `config::ConfigError` and `supervisor::SupervisorError` into the stable
//! `kind` taxonomy the API contract promises, and maps each kind onto an
//! HTTP status, via a layered `thiserror` + `#[from]`
//! composition in `agent_control/error.rs`, generalized to also implement
//! `actix_web::ResponseError` for this spec's JSON envelope.

use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config::ConfigError;
use crate::supervisor::{RollbackOutcome, SupervisorError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    ConfigParseError(String),

    #[error("{0}")]
    ConfigValidationError(String),

    #[error("{0}")]
    RenderError(String),

    #[error("{0}")]
    ApplyRejected(String),

    #[error("{message}")]
    ReloadFailed {
        message: String,
        rollback: RollbackOutcome,
    },

    #[error("{0}")]
    ChildCrashed(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    HelperUnavailable(String),

    #[error("{0}")]
    Timeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// The stable string appearing in the API envelope's `error.kind`
    /// (`spec.md` §7).
    fn kind(&self) -> &'static str {
        match self {
            ApiError::ConfigParseError(_) => "ConfigParseError",
            ApiError::ConfigValidationError(_) => "ConfigValidationError",
            ApiError::RenderError(_) => "RenderError",
            ApiError::ApplyRejected(_) => "ApplyRejected",
            ApiError::ReloadFailed { .. } => "ReloadFailed",
            ApiError::ChildCrashed(_) => "ChildCrashed",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::HelperUnavailable(_) => "HelperUnavailable",
            ApiError::Timeout(_) => "Timeout",
            ApiError::Internal(_) => "Internal",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::ReloadFailed { rollback, .. } => {
                Some(Value::String(rollback.to_string()))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorEnvelope,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    kind: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> actix_web::http::StatusCode {
        use actix_web::http::StatusCode;
        match self {
            ApiError::ConfigParseError(_)
            | ApiError::ConfigValidationError(_)
            | ApiError::RenderError(_) => StatusCode::BAD_REQUEST,
            ApiError::ApplyRejected(_) => StatusCode::BAD_REQUEST,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::ReloadFailed { .. } | ApiError::ChildCrashed(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::HelperUnavailable(_) | ApiError::Timeout(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: ErrorEnvelope {
                kind: self.kind(),
                message: self.to_string(),
                details: self.details(),
            },
        })
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Parse(msg) => ApiError::ConfigParseError(msg),
            ConfigError::Validation(errors) => ApiError::ConfigValidationError(
                errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
            ),
            ConfigError::Render(msg) => ApiError::RenderError(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SupervisorError> for ApiError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::ApplyRejected(msg) => ApiError::ApplyRejected(msg),
            SupervisorError::ReloadFailed { step, rollback } => ApiError::ReloadFailed {
                message: step,
                rollback,
            },
            SupervisorError::ChildCrashed(msg) => ApiError::ChildCrashed(msg),
            SupervisorError::Timeout(budget) => {
                ApiError::Timeout(format!("operation timed out after {budget:?}"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Errors that can occur while bringing the API server's own thread up,
/// as distinct from [`ApiError`]'s per-request errors. Grounded in the
/// teacher's `StatusServerError`.
#[derive(Debug, Error)]
pub enum ApiServerError {
    #[error("refusing to start the API server: {0}")]
    NotLoopback(#[from] super::config::NotLoopback),
    #[error("failed to bind the API server: {0}")]
    BindError(String),
    #[error("API server startup timed out after {0:?}")]
    StartupTimeout(std::time::Duration),
    #[error("API server thread closed before reporting startup")]
    StartupChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn validation_errors_map_to_400() {
        let err = ApiError::ConfigValidationError("license_key: must not be empty".to_string());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let err = ApiError::Forbidden("read-only mode".to_string());
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn reload_failed_carries_rollback_outcome_in_details() {
        let err = ApiError::ReloadFailed {
            message: "probe timed out".to_string(),
            rollback: RollbackOutcome::RolledBackOk,
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            err.details(),
            Some(Value::String("rolled_back_ok".to_string()))
        );
    }

    #[test]
    fn helper_unavailable_maps_to_503() {
        let err = ApiError::HelperUnavailable("socket unreachable".to_string());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
