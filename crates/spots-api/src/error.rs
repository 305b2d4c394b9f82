//! HTTP error mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Error returned by handlers, rendered as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Database(spots_core::Error),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<spots_core::Error> for ApiError {
    fn from(err: spots_core::Error) -> Self {
        use spots_core::Error;
        match err {
            Error::SpotNotFound(_) => ApiError::NotFound("Not found.".to_string()),
            Error::InvalidGeometry(msg) => ApiError::BadRequest(msg),
            other => ApiError::Database(other),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("JSON parse error - {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Database(err) = &self {
            error!(error = %err, "Request failed with a store error");
        }

        let body = Json(serde_json::json!({
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_http_status() {
        let cases = [
            (spots_core::Error::SpotNotFound(9), StatusCode::NOT_FOUND),
            (
                spots_core::Error::InvalidGeometry("Geometry type must be 'Polygon'.".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                spots_core::Error::Config("bad schema".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn geometry_message_passes_through_verbatim() {
        let err = ApiError::from(spots_core::Error::InvalidGeometry(
            "Missing 'polygon' in request body.".into(),
        ));
        assert_eq!(err.to_string(), "Missing 'polygon' in request body.");
    }
}
