use thiserror::Error;

use shared_cache::CacheError;
use shared_database::DatabaseError;
use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Enter a valid phone number")]
    InvalidPhone,

    #[error("Enter the 6 digit code")]
    MalformedCode,

    #[error("Please wait {retry_after} seconds before requesting another code")]
    Cooldown { retry_after: u64 },

    #[error("Too many codes requested, try again later")]
    SendLimit,

    #[error("Code expired or not requested")]
    CodeExpired,

    #[error("Invalid code, {remaining} attempts remaining")]
    InvalidCode { remaining: i64 },

    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,

    #[error("SMS delivery failed: {0}")]
    Sms(String),

    #[error("Token error: {0}")]
    Token(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidPhone | AuthError::MalformedCode => {
                AppError::ValidationError(err.to_string())
            }
            AuthError::Cooldown { .. } | AuthError::SendLimit | AuthError::TooManyAttempts => {
                AppError::TooManyRequests(err.to_string())
            }
            AuthError::CodeExpired => AppError::BadRequest(err.to_string()),
            AuthError::InvalidCode { .. } => AppError::Auth(err.to_string()),
            AuthError::Sms(msg) => AppError::ExternalService(msg),
            AuthError::Token(msg) => AppError::Internal(msg),
            AuthError::Cache(e) => AppError::Internal(e.to_string()),
            AuthError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn otp_failures_map_to_statuses() {
        let status = |err: AuthError| AppError::from(err).status();

        assert_eq!(status(AuthError::Cooldown { retry_after: 12 }), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(AuthError::TooManyAttempts), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(AuthError::CodeExpired), StatusCode::BAD_REQUEST);
        assert_eq!(status(AuthError::InvalidCode { remaining: 2 }), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::Sms("down".into())), StatusCode::BAD_GATEWAY);
    }
}
