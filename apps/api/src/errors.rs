use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Uploaded file is not a PDF")]
    InvalidFileType,

    #[error("Uploaded file exceeds the {limit} byte limit")]
    FileTooLarge { limit: usize },

    #[error("No extractable text in PDF: {0}")]
    UnextractableText(String),

    #[error("Analysis timed out")]
    AnalysisTimeout,

    #[error("Analysis service error: {0}")]
    AnalysisService(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden")]
    Forbidden,

    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidFileType => "INVALID_FILE_TYPE",
            AppError::FileTooLarge { .. } => "FILE_TOO_LARGE",
            AppError::UnextractableText(_) => "UNEXTRACTABLE_TEXT",
            AppError::AnalysisTimeout => "ANALYSIS_TIMEOUT",
            AppError::AnalysisService(_) => "ANALYSIS_SERVICE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden => "FORBIDDEN",
            AppError::DuplicateId(_) => "DUPLICATE_ID",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Cache(_) => "CACHE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidFileType => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnextractableText(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::AnalysisTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::AnalysisService(_) => StatusCode::BAD_GATEWAY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::DuplicateId(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::InvalidFileType => "Only PDF files are accepted".to_string(),
            AppError::FileTooLarge { limit } => {
                format!("File exceeds the maximum size of {limit} bytes")
            }
            AppError::UnextractableText(_) => {
                "No readable text could be extracted from the PDF".to_string()
            }
            AppError::AnalysisTimeout => {
                "The analysis service did not respond in time".to_string()
            }
            AppError::AnalysisService(msg) => {
                tracing::error!("Analysis service error: {msg}");
                "The analysis service failed to analyze the contract".to_string()
            }
            AppError::NotFound(msg) | AppError::DuplicateId(msg) | AppError::Validation(msg) => {
                msg.clone()
            }
            // Same message whether or not the resource exists.
            AppError::Forbidden => "Access denied".to_string(),
            AppError::Unauthorized => "Authentication required".to_string(),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                "A database error occurred".to_string()
            }
            AppError::Storage(msg) => {
                tracing::error!("Storage error: {msg}");
                "A storage error occurred".to_string()
            }
            AppError::Cache(e) => {
                tracing::error!("Cache error: {e}");
                "A cache error occurred".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
        };

        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}
