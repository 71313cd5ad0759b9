// src/error.rs
use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    // Invalid or inactive plan ids are indistinguishable to the caller.
    #[error("Invalid plan")]
    InvalidPlan,
    #[error("Subscription has no plan; a renewal duration in days is required")]
    NoPlan,
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Authentication required")]
    Unauthorized,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("You do not have permission to perform this action")]
    Forbidden,
    #[error("{0}")]
    Validation(String),
    #[error("{0} already exists")]
    Conflict(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Hashing(#[from] bcrypt::BcryptError),
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPlan | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NoPlan | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Database(_) | ApiError::Hashing(_) | ApiError::Token(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            return HttpResponse::build(status).json(json!({ "error": "Internal server error" }));
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_plan_maps_to_not_found() {
        assert_eq!(ApiError::InvalidPlan.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn no_plan_maps_to_bad_request() {
        assert_eq!(ApiError::NoPlan.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn database_errors_hide_details() {
        let err = ApiError::Database(sqlx::Error::PoolClosed);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.error_response();
        assert_eq!(body.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_carries_message() {
        let err = ApiError::Validation("duration_days must be positive".to_string());
        assert_eq!(err.to_string(), "duration_days must be positive");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
