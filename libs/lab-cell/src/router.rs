use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn lab_routes(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/tests", get(handlers::list_tests));

    let protected_routes = Router::new()
        .route("/", post(handlers::create_lab))
        .route("/{lab_id}/tests", post(handlers::add_lab_test))
        .route("/allocations/preview", post(handlers::preview_allocation))
        .route("/bookings", post(handlers::book_tests))
        .route("/bookings/{group_id}", get(handlers::get_booking_group))
        .route("/bookings/{group_id}/cancel", post(handlers::cancel_booking_group))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
