use std::sync::Arc;

use axum::{
    Extension,
    Router,
    routing::{get, post},
    middleware,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;
use crate::services::sms::{LogSmsGateway, SmsGateway};

pub fn auth_routes(state: AppState) -> Router {
    auth_routes_with_gateway(state, Arc::new(LogSmsGateway))
}

pub fn auth_routes_with_gateway(state: AppState, sms: Arc<dyn SmsGateway>) -> Router {
    let public_routes = Router::new()
        .route("/otp/request", post(handlers::request_otp))
        .route("/otp/verify", post(handlers::verify_otp))
        .route("/validate", post(handlers::validate_token))
        .route("/verify", post(handlers::verify_token));

    let protected_routes = Router::new()
        .route("/me", get(handlers::me))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(Extension(sms))
        .with_state(state)
}
