use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt::Display;
use thiserror::Error;
use tracing::{error, info, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {}", join_fields(.0))]
    Validation(Vec<FieldError>),

    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    #[error("{resource}: {message}")]
    Conflict {
        resource: &'static str,
        message: String,
    },

    #[error("external service unavailable: {service}")]
    ExternalService { service: &'static str },

    #[error("internal error: {0}")]
    Internal(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden")]
    Forbidden,
}

fn join_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(resource: &'static str) -> Self {
        Self::NotFound { resource }
    }

    pub fn conflict(resource: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            resource,
            message: message.into(),
        }
    }

    pub fn external(service: &'static str) -> Self {
        Self::ExternalService { service }
    }

    pub fn internal<E: Display>(error: E) -> Self {
        Self::Internal(error.to_string())
    }

    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn forbidden() -> Self {
        Self::Forbidden
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::ExternalService { .. } => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "ValidationError",
            AppError::NotFound { .. } => "NotFoundError",
            AppError::Conflict { .. } => "ConflictError",
            AppError::ExternalService { .. } => "ExternalServiceError",
            AppError::Internal(_) => "InternalServerError",
            AppError::Unauthorized => "UnauthorizedError",
            AppError::Forbidden => "ForbiddenError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_type = self.error_type();

        let message = match &self {
            AppError::Validation(fields) => {
                warn!(fields = %join_fields(fields), "request failed validation");
                "validation failed".to_string()
            }
            AppError::Internal(detail) => {
                error!(error = %detail, "internal server error");
                "internal server error".to_string()
            }
            AppError::ExternalService { service } => {
                error!(service = *service, "external service failure");
                self.to_string()
            }
            AppError::Conflict { .. } => {
                info!(error = %self, "conflict");
                self.to_string()
            }
            other => other.to_string(),
        };

        let fields = match self {
            AppError::Validation(fields) => fields,
            _ => Vec::new(),
        };

        let body = Json(ErrorResponse {
            status: "error",
            error_type,
            message,
            fields,
        });
        (status, body).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    status: &'static str,
    error_type: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<FieldError>,
}

impl From<diesel::result::Error> for AppError {
    fn from(value: diesel::result::Error) -> Self {
        match value {
            diesel::result::Error::NotFound => AppError::not_found("record"),
            diesel::result::Error::DatabaseError(
                diesel::result::DatabaseErrorKind::UniqueViolation,
                info,
            ) => AppError::conflict("record", info.message().to_string()),
            _ => AppError::internal(value),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(value: anyhow::Error) -> Self {
        AppError::internal(format!("{value:#}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::internal(value)
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(value: tokio::task::JoinError) -> Self {
        AppError::internal(format!("blocking task failed: {value}"))
    }
}
