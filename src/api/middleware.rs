//! Shared API state and the JSON error envelope

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::feed::FeedRenderer;
use crate::config::BlogConfig;
use crate::services::{Blog, BlogError, CommentService, CommentServiceError};

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub blog: Arc<Blog>,
    pub comment_service: Arc<CommentService>,
    pub site: Arc<BlogConfig>,
    pub feed: Arc<FeedRenderer>,
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<BlogError> for ApiError {
    fn from(err: BlogError) -> Self {
        match err {
            BlogError::NotFound(what) => Self::not_found(format!("Not found: {}", what)),
            other => {
                tracing::error!(error = %other, "Repository error while serving request");
                Self::internal_error(other.to_string())
            }
        }
    }
}

impl From<CommentServiceError> for ApiError {
    fn from(err: CommentServiceError) -> Self {
        match err {
            CommentServiceError::Validation(fields) => Self::with_details(
                "VALIDATION_ERROR",
                "Comment form is invalid",
                serde_json::to_value(&fields).unwrap_or_default(),
            ),
            CommentServiceError::CommentsClosed => Self::forbidden(err.to_string()),
            CommentServiceError::ChallengeFailed => Self::validation_error(err.to_string()),
            CommentServiceError::Blog(inner) => inner.into(),
        }
    }
}
