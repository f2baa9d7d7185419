use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;
use validator::ValidationErrors;

/// Request-level error taxonomy. Every handler failure is mapped onto one of
/// these variants; internal causes stay server-side and surface as a generic
/// 500 message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    EmailSend(String),
    #[error("Internal server error")]
    Database(#[from] mongodb::error::Error),
    #[error("Internal server error")]
    PasswordHash(#[from] bcrypt::BcryptError),
    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .into_iter()
            .flat_map(|(_, field_errors)| field_errors.iter())
            .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Invalid request payload".to_string());
        ApiError::BadRequest(message)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::EmailSend(_)
            | ApiError::Database(_)
            | ApiError::PasswordHash(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ApiError::Database(source) => log::error!("database error: {source}"),
            ApiError::PasswordHash(source) => log::error!("password hashing error: {source}"),
            ApiError::Internal(detail) => log::error!("internal error: {detail}"),
            ApiError::EmailSend(detail) => log::error!("email delivery error: {detail}"),
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(json!({
            "success": false,
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("x".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::EmailSend("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError::internal("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let error = ApiError::internal("mongo connection string was malformed");
        assert_eq!(error.to_string(), "Internal server error");
    }

    #[derive(Debug, Validate)]
    struct Dto {
        #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
        password: String,
    }

    #[test]
    fn validation_errors_surface_the_field_message() {
        let dto = Dto {
            password: "short".into(),
        };
        let error: ApiError = dto.validate().unwrap_err().into();
        assert_eq!(error.to_string(), "Password must be at least 6 characters");
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);
    }
}
