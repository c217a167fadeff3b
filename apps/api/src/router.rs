use axum::{
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use appointment_cell::{appointment_routes, prescription_routes, queue_routes};
use auth_cell::router::auth_routes;
use doctor_cell::{clinic_routes, doctor_routes};
use lab_cell::lab_routes;
use patient_cell::router::patient_routes;
use shared_utils::AppState;
use support_cell::support_routes;

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "CarePoint API is running!" }))
        .route("/health", get(health))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/clinics", clinic_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/queue", queue_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/labs", lab_routes(state.clone()))
        .nest("/support", support_routes(state))
}
