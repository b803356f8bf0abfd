use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;

/// Failure modes surfaced by the API. Every variant maps to one status code
/// and renders the `{"success": false, ...}` envelope.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<String>,
    },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("database error: {0}")]
    Store(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> ApiError {
        let message = message.into();
        ApiError::Validation {
            errors: vec![message.clone()],
            message,
        }
    }

    pub fn validation_all(errors: Vec<String>) -> ApiError {
        let message = errors
            .first()
            .cloned()
            .unwrap_or_else(|| "Invalid request".to_string());
        ApiError::Validation { message, errors }
    }

    pub fn not_found(what: impl Into<String>) -> ApiError {
        ApiError::NotFound(what.into())
    }

    pub fn conflict(message: impl Into<String>) -> ApiError {
        ApiError::Conflict(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> ApiError {
        ApiError::InvalidState(message.into())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ApiError::Validation { message, errors } => json!({
                "success": false,
                "message": message,
                "errors": errors,
            }),
            ApiError::Store(err) => {
                log::error!("store error: {err}");
                json!({
                    "success": false,
                    "message": "Internal server error",
                })
            }
            other => json!({
                "success": false,
                "message": other.to_string(),
            }),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::ApiError;
    use actix_web::http::StatusCode;
    use actix_web::ResponseError;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            ApiError::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::not_found("Booking not found").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::conflict("taken").status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::invalid_state("no").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("who".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Store(sqlx::Error::PoolClosed).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[actix_web::test]
    async fn store_errors_are_redacted() {
        let resp = ApiError::Store(sqlx::Error::PoolClosed).error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Internal server error");
    }

    #[actix_web::test]
    async fn validation_envelope_lists_every_error() {
        let err = ApiError::validation_all(vec![
            "Name must be at least 2 characters".into(),
            "Please provide a valid email address".into(),
        ]);
        let resp = err.error_response();
        let bytes = actix_web::body::to_bytes(resp.into_body()).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], "Name must be at least 2 characters");
        assert_eq!(body["errors"].as_array().map(Vec::len), Some(2));
    }
}
