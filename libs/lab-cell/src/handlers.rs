use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AddLabTestRequest, Allocation, AllocationRequest, BookLabTestsRequest, BookingGroupDetails, CreateLabRequest,
    Lab, LabTestMapping, LabTestQuery,
};
use crate::services::LabService;

#[axum::debug_handler]
pub async fn list_tests(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<LabTestQuery>,
) -> Result<Json<Value>, AppError> {
    let tests = LabService::new(&config).list_tests(query, None).await?;

    Ok(Json(json!({
        "tests": tests,
        "total": tests.len()
    })))
}

#[axum::debug_handler]
pub async fn create_lab(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateLabRequest>,
) -> Result<Json<Lab>, AppError> {
    let lab = LabService::new(&config)
        .create_lab(request, &user, auth.token())
        .await?;
    Ok(Json(lab))
}

#[axum::debug_handler]
pub async fn add_lab_test(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(lab_id): Path<Uuid>,
    Json(request): Json<AddLabTestRequest>,
) -> Result<Json<LabTestMapping>, AppError> {
    let mapping = LabService::new(&config)
        .add_test(lab_id, request, &user, auth.token())
        .await?;
    Ok(Json(mapping))
}

#[axum::debug_handler]
pub async fn preview_allocation(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<AllocationRequest>,
) -> Result<Json<Allocation>, AppError> {
    let allocation = LabService::new(&config)
        .preview_allocation(request, auth.token())
        .await?;
    Ok(Json(allocation))
}

#[axum::debug_handler]
pub async fn book_tests(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookLabTestsRequest>,
) -> Result<Json<BookingGroupDetails>, AppError> {
    let group = LabService::new(&config)
        .book_tests(request, &user, auth.token())
        .await?;
    Ok(Json(group))
}

#[axum::debug_handler]
pub async fn get_booking_group(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(group_id): Path<String>,
) -> Result<Json<BookingGroupDetails>, AppError> {
    let group = LabService::new(&config)
        .get_group(&group_id, &user, auth.token())
        .await?;
    Ok(Json(group))
}

#[axum::debug_handler]
pub async fn cancel_booking_group(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(group_id): Path<String>,
) -> Result<Json<BookingGroupDetails>, AppError> {
    let group = LabService::new(&config)
        .cancel_group(&group_id, &user, auth.token())
        .await?;
    Ok(Json(group))
}
