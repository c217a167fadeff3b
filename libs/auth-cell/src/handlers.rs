use std::sync::Arc;

use axum::{
    extract::{Extension, Json, State},
    http::HeaderMap,
};
use chrono::Duration;
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::{self, TokenSubject};
use shared_utils::AppState;

use crate::error::AuthError;
use crate::models::{LoginResponse, OtpDispatch, OtpRequest, OtpVerifyRequest};
use crate::services::sms::SmsGateway;
use crate::services::{OtpService, UserDirectory};

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    bearer_token(auth_value).map(str::to_string)
}

#[axum::debug_handler(state = AppState)]
pub async fn request_otp(
    State(state): State<AppState>,
    Extension(sms): Extension<Arc<dyn SmsGateway>>,
    Json(request): Json<OtpRequest>,
) -> Result<Json<OtpDispatch>, AppError> {
    let service = OtpService::new(&state.config, state.cache.clone(), sms);
    let dispatch = service.request_code(&request.phone).await?;
    Ok(Json(dispatch))
}

#[axum::debug_handler(state = AppState)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(sms): Extension<Arc<dyn SmsGateway>>,
    Json(request): Json<OtpVerifyRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let service = OtpService::new(&state.config, state.cache.clone(), sms);
    let phone = service
        .verify_code(&request.phone, request.code.as_deref())
        .await?;

    let user = UserDirectory::new(&state.config)
        .find_or_create(&phone)
        .await
        .map_err(AuthError::from)?;

    let ttl_minutes = state.config.access_token_ttl_minutes;
    let subject = TokenSubject {
        user_id: &user.id,
        role: &user.role,
        phone: Some(&user.phone),
        email: None,
    };
    let access_token = jwt::issue_token(
        &subject,
        &state.config.supabase_jwt_secret,
        Duration::minutes(ttl_minutes),
    )
    .map_err(AuthError::Token)?;

    Ok(Json(LoginResponse {
        access_token,
        token_type: "bearer".to_string(),
        expires_in: ttl_minutes * 60,
        user,
    }))
}

pub async fn validate_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    match jwt::validate_token(&token, &config.supabase_jwt_secret) {
        Ok(user) => Ok(Json(TokenResponse {
            valid: true,
            user_id: user.id,
            phone: user.phone,
            role: user.role,
        })),
        Err(err) => Err(AppError::Auth(err)),
    }
}

pub async fn verify_token(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;

    match jwt::validate_token(&token, &config.supabase_jwt_secret) {
        Ok(_) => Ok(Json(json!({ "valid": true }))),
        Err(_) => Ok(Json(json!({ "valid": false }))),
    }
}

pub async fn me(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}
