use axum::extract::multipart::MultipartError;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::relay::RelayError;

pub const FALLBACK_ERROR_MESSAGE: &str = "Internal error.";

/// JSON body of the text-only endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextQuery {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Relay(#[from] RelayError),

    /// The HTTP layer refused the body before it reached a relay.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        // Buffering errors such as an oversized body keep their own status
        let status = match &rejection {
            JsonRejection::JsonDataError(_)
            | JsonRejection::JsonSyntaxError(_)
            | JsonRejection::MissingJsonContentType(_) => StatusCode::BAD_REQUEST,
            other => other.status(),
        };

        ApiError::Rejected {
            status,
            message: rejection.body_text(),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Relay(RelayError::Validation(_)) | ApiError::Relay(RelayError::Archive(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Relay(RelayError::Provider(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Rejected { status, .. } => *status,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        match &self {
            ApiError::Relay(RelayError::Provider(e)) => error!(
                "Request failed ({}), upstream status {:?}: {}",
                status,
                e.upstream_status(),
                message
            ),
            _ => error!("Request failed ({}): {}", status, message),
        }

        let body = if message.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            message
        };

        (status, body).into_response()
    }
}
