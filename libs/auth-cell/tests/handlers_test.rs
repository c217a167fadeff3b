use std::sync::Arc;
use axum::{extract::State, http::{HeaderMap, HeaderValue}};

use auth_cell::handlers::{validate_token, verify_token};
use shared_config::AppConfig;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils};

fn create_test_config() -> AppConfig {
    TestConfig::default().to_app_config()
}

fn create_auth_header(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "authorization",
        HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
    headers
}

#[tokio::test]
async fn test_validate_token_success() {
    let config = Arc::new(create_test_config());
    let user = TestUser::patient("+919800000001");
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let headers = create_auth_header(&token);

    let result = validate_token(State(config), headers).await;

    assert!(result.is_ok());
    let response = result.unwrap().0;
    assert!(response.valid);
    assert_eq!(response.user_id, user.id);
    assert_eq!(response.phone, Some(user.phone));
    assert_eq!(response.role, Some(user.role));
}

#[tokio::test]
async fn test_validate_token_missing_header() {
    let config = Arc::new(create_test_config());

    let result = validate_token(State(config), HeaderMap::new()).await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Missing authorization header"),
        _ => panic!("Expected Auth error"),
    }
}

#[tokio::test]
async fn test_validate_token_no_bearer_prefix() {
    let config = Arc::new(create_test_config());
    let mut headers = HeaderMap::new();
    headers.insert("authorization", HeaderValue::from_static("sometoken"));

    let result = validate_token(State(config), headers).await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Invalid authorization header format"),
        _ => panic!("Expected Auth error"),
    }
}

#[tokio::test]
async fn test_validate_token_rejections() {
    let config = Arc::new(create_test_config());
    let user = TestUser::default();

    let tokens = [
        JwtTestUtils::create_expired_token(&user, &config.supabase_jwt_secret),
        JwtTestUtils::create_invalid_signature_token(&user),
        JwtTestUtils::create_wrong_audience_token(&user, &config.supabase_jwt_secret),
        JwtTestUtils::create_malformed_token(),
    ];

    for token in tokens {
        let result = validate_token(State(config.clone()), create_auth_header(&token)).await;
        assert!(matches!(result, Err(AppError::Auth(_))));
    }
}

#[tokio::test]
async fn test_verify_token_reports_validity() {
    let config = Arc::new(create_test_config());
    let user = TestUser::doctor("+919800000002");

    let good = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let response = verify_token(State(config.clone()), create_auth_header(&good)).await.unwrap().0;
    assert_eq!(response["valid"], true);

    let expired = JwtTestUtils::create_expired_token(&user, &config.supabase_jwt_secret);
    let response = verify_token(State(config), create_auth_header(&expired)).await.unwrap().0;
    assert_eq!(response["valid"], false);
}

#[tokio::test]
async fn test_different_user_roles() {
    let config = Arc::new(create_test_config());

    for user in [
        TestUser::patient("+919800000003"),
        TestUser::doctor("+919800000004"),
        TestUser::staff("+919800000005"),
        TestUser::admin("+919800000006"),
    ] {
        let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
        let response = validate_token(State(config.clone()), create_auth_header(&token))
            .await
            .unwrap()
            .0;
        assert_eq!(response.role, Some(user.role.clone()));
    }
}
