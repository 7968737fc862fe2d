use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::auth::BASIC_CHALLENGE;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("blocking store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("corrupt row {id}: {reason}")]
    CorruptRow { id: i64, reason: String },
}

#[derive(Error, Debug)]
pub enum DeskError {
    #[error("{0}")]
    Validation(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Too many requests, retry in {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("CSV export failed: {0}")]
    Export(String),
}

impl DeskError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_ARGUMENT",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Export(_) => "EXPORT_FAILED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) | Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DeskError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Storage(err) => {
                error!("Admin request failed on storage: {err}");
                "Internal storage error, please retry.".to_string()
            }
            Self::Export(err) => {
                error!("CSV export failed: {err}");
                "Export failed, please retry.".to_string()
            }
            other => other.to_string(),
        };

        let mut response = (
            self.status(),
            Json(json!({
                "error": {
                    "code": self.code(),
                    "message": message
                }
            })),
        )
            .into_response();

        match self {
            Self::Unauthorized => {
                response.headers_mut().insert(
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static(BASIC_CHALLENGE),
                );
            }
            Self::RateLimited {
                retry_after_seconds,
            } => {
                if let Ok(value) = HeaderValue::from_str(&retry_after_seconds.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
            }
            _ => {}
        }

        response
    }
}
