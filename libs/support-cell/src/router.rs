use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::AppState;

use crate::handlers;

pub fn support_routes(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/tickets", post(handlers::create_ticket).get(handlers::list_tickets))
        .route("/tickets/{ticket_id}", get(handlers::get_ticket))
        .route("/tickets/{ticket_id}/status", patch(handlers::update_ticket_status))
        .route("/tickets/{ticket_id}/assign", patch(handlers::assign_ticket))
        .route(
            "/tickets/{ticket_id}/comments",
            post(handlers::add_comment).get(handlers::list_comments),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
