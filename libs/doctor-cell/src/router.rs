use axum::{
    Router,
    routing::{get, post, put, patch},
    middleware,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn doctor_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::search_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}/kyc", post(handlers::submit_kyc))
        .route("/{doctor_id}/kyc/review", patch(handlers::review_kyc))
        .route(
            "/{doctor_id}/availability",
            post(handlers::create_availability).get(handlers::list_availability),
        )
        .route(
            "/{doctor_id}/availability/{template_id}",
            put(handlers::update_availability).delete(handlers::delete_availability),
        )
        .route(
            "/{doctor_id}/leaves",
            post(handlers::create_leave).get(handlers::list_leaves),
        )
        .route("/{doctor_id}/leaves/{leave_id}", axum::routing::delete(handlers::delete_leave))
        .route("/{doctor_id}/clinics/{clinic_id}/slots", get(handlers::get_slots))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn clinic_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_clinics))
        .route("/{clinic_id}", get(handlers::get_clinic))
        .route("/{clinic_id}/doctors", get(handlers::list_clinic_doctors));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_clinic))
        .route("/{clinic_id}/doctors", post(handlers::link_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
