//! Sistema de manejo de errores
//!
//! Este módulo define la taxonomía de errores del motor de despacho
//! y su conversión a respuestas HTTP apropiadas.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// SQLSTATE de fallos de serialización y deadlock en PostgreSQL
const PG_SERIALIZATION_FAILURE: &str = "40001";
const PG_DEADLOCK_DETECTED: &str = "40P01";

/// Errores principales de la aplicación
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// Fallo transitorio del store (conexión, serialización, deadlock)
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Sólo los fallos transitorios del store se reintentan
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Unavailable(_))
    }

    /// Código estable para respuestas y métricas
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::InvalidArgument(_) | AppError::Validation(_) => "INVALID_ARGUMENT",
            AppError::Unavailable(_) => "UNAVAILABLE",
            AppError::Database(_) => "DB_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,
            AppError::InvalidArgument(_) | AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) => {
                let code = db_err.code();
                let code = code.as_deref();
                if code == Some(PG_SERIALIZATION_FAILURE) || code == Some(PG_DEADLOCK_DETECTED) {
                    AppError::Unavailable(db_err.message().to_string())
                } else if db_err.is_unique_violation() {
                    AppError::Conflict(db_err.message().to_string())
                } else {
                    AppError::Database(db_err.message().to_string())
                }
            }
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => AppError::Unavailable(err.to_string()),
            _ => AppError::Database(err.to_string()),
        }
    }
}

/// Respuesta de error para la API
#[derive(Debug, serde::Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code().to_string();

        let error_response = match self {
            AppError::Validation(e) => {
                warn!("Validation error: {}", e);
                ErrorResponse {
                    error: "Invalid Argument".to_string(),
                    message: "The provided data is invalid".to_string(),
                    details: Some(json!(e)),
                    code,
                }
            }
            AppError::Database(msg) => {
                error!("Database error: {}", msg);
                ErrorResponse {
                    error: "Database Error".to_string(),
                    message: "An error occurred while accessing the database".to_string(),
                    details: None,
                    code,
                }
            }
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                ErrorResponse {
                    error: "Internal Server Error".to_string(),
                    message: "An unexpected error occurred".to_string(),
                    details: None,
                    code,
                }
            }
            other => {
                let error = match &other {
                    AppError::NotFound(_) => "Not Found",
                    AppError::Conflict(_) => "Conflict",
                    AppError::InvalidState(_) => "Invalid State",
                    AppError::InvalidArgument(_) => "Invalid Argument",
                    _ => "Service Unavailable",
                };
                let message = match other {
                    AppError::NotFound(msg)
                    | AppError::Conflict(msg)
                    | AppError::InvalidState(msg)
                    | AppError::InvalidArgument(msg)
                    | AppError::Unavailable(msg) => msg,
                    _ => String::new(),
                };
                warn!("{}: {}", error, message);
                ErrorResponse {
                    error: error.to_string(),
                    message,
                    details: None,
                    code,
                }
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Resultado tipado para operaciones que pueden fallar
pub type AppResult<T> = Result<T, AppError>;

/// Función helper para crear errores de recurso no encontrado
pub fn not_found_error(resource: &str, id: &uuid::Uuid) -> AppError {
    AppError::NotFound(format!("{} with id '{}' not found", resource, id))
}
