//! Error responses shared by the content API handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

/// Content API errors
#[derive(Debug)]
pub enum ApiError {
    /// Content type in the URL is not registered
    UnknownContentType(String),
    /// Malformed query parameter (directive, filters, depth)
    InvalidInput(String),
    /// Planning or store failure
    Internal(String),
}

impl From<cdp_common::Error> for ApiError {
    fn from(err: cdp_common::Error) -> Self {
        match err {
            cdp_common::Error::InvalidInput(msg) => ApiError::InvalidInput(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::UnknownContentType(uid) => {
                (StatusCode::NOT_FOUND, format!("Unknown content type: {}", uid))
            }
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                error!("Content query failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::UnknownContentType("x".into()), StatusCode::NOT_FOUND),
            (ApiError::from(cdp_common::Error::InvalidInput("bad".into())), StatusCode::BAD_REQUEST),
            (
                ApiError::from(cdp_common::Error::SchemaResolution("missing".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
