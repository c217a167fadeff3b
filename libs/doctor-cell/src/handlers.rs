use std::sync::Arc;

use axum::{
    extract::{Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::AppState;

use crate::models::{
    AvailabilityQuery, AvailabilityTemplate, Clinic, ClinicQuery, CreateAvailabilityRequest,
    CreateClinicRequest, CreateDoctorRequest, CreateLeaveRequest, Doctor, DoctorClinic,
    DoctorSearchQuery, KycReviewRequest, LeaveQuery, LeaveRange, LinkDoctorRequest, SlotQuery,
    SlotView, SubmitKycRequest, UpdateAvailabilityRequest,
};
use crate::services::{
    AvailabilityService, ClinicService, DoctorService, LeaveService, SlotService,
};

// ==============================================================================
// PUBLIC HANDLERS (NO AUTHENTICATION REQUIRED)
// ==============================================================================

#[axum::debug_handler]
pub async fn search_doctors(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<DoctorSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = DoctorService::new(&config).search_doctors(query, None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = DoctorService::new(&config).get_doctor(&doctor_id, None).await?;
    Ok(Json(doctor))
}

#[axum::debug_handler]
pub async fn list_clinics(
    State(config): State<Arc<AppConfig>>,
    Query(query): Query<ClinicQuery>,
) -> Result<Json<Value>, AppError> {
    let clinics = ClinicService::new(&config).list_clinics(query, None).await?;

    Ok(Json(json!({
        "clinics": clinics,
        "total": clinics.len()
    })))
}

#[axum::debug_handler]
pub async fn get_clinic(
    State(config): State<Arc<AppConfig>>,
    Path(clinic_id): Path<String>,
) -> Result<Json<Clinic>, AppError> {
    let clinic = ClinicService::new(&config).get_clinic(&clinic_id, None).await?;
    Ok(Json(clinic))
}

#[axum::debug_handler]
pub async fn list_clinic_doctors(
    State(config): State<Arc<AppConfig>>,
    Path(clinic_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctors = ClinicService::new(&config).clinic_doctors(&clinic_id, None).await?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

// ==============================================================================
// DOCTOR PROFILE & KYC
// ==============================================================================

#[axum::debug_handler]
pub async fn create_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = DoctorService::new(&config)
        .create_doctor(request, &user, auth.token())
        .await?;
    Ok(Json(doctor))
}

#[axum::debug_handler]
pub async fn submit_kyc(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<SubmitKycRequest>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = DoctorService::new(&config)
        .submit_kyc(&doctor_id, request, &user, auth.token())
        .await?;
    Ok(Json(doctor))
}

#[axum::debug_handler]
pub async fn review_kyc(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<KycReviewRequest>,
) -> Result<Json<Doctor>, AppError> {
    let doctor = DoctorService::new(&config)
        .review_kyc(&doctor_id, request, &user, auth.token())
        .await?;
    Ok(Json(doctor))
}

// ==============================================================================
// AVAILABILITY TEMPLATES
// ==============================================================================

#[axum::debug_handler]
pub async fn create_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<CreateAvailabilityRequest>,
) -> Result<Json<AvailabilityTemplate>, AppError> {
    let template = AvailabilityService::new(&config)
        .create_availability(&doctor_id, request, &user, auth.token())
        .await?;
    Ok(Json(template))
}

#[axum::debug_handler]
pub async fn list_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailabilityTemplate>>, AppError> {
    let templates = AvailabilityService::new(&config)
        .get_doctor_availability(&doctor_id, query, auth.token())
        .await?;
    Ok(Json(templates))
}

#[axum::debug_handler]
pub async fn update_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((doctor_id, template_id)): Path<(String, String)>,
    Json(request): Json<UpdateAvailabilityRequest>,
) -> Result<Json<AvailabilityTemplate>, AppError> {
    let template = AvailabilityService::new(&config)
        .update_availability(&doctor_id, &template_id, request, &user, auth.token())
        .await?;
    Ok(Json(template))
}

#[axum::debug_handler]
pub async fn delete_availability(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((doctor_id, template_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    AvailabilityService::new(&config)
        .delete_availability(&doctor_id, &template_id, &user, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ==============================================================================
// LEAVES & SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_leave(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
    Json(request): Json<CreateLeaveRequest>,
) -> Result<Json<LeaveRange>, AppError> {
    let leave = LeaveService::new(&config)
        .create_leave(&doctor_id, request, &user, auth.token())
        .await?;
    Ok(Json(leave))
}

#[axum::debug_handler]
pub async fn list_leaves(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<LeaveQuery>,
) -> Result<Json<Vec<LeaveRange>>, AppError> {
    let leaves = LeaveService::new(&config)
        .list_leaves(&doctor_id, query, auth.token())
        .await?;
    Ok(Json(leaves))
}

#[axum::debug_handler]
pub async fn delete_leave(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((doctor_id, leave_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    LeaveService::new(&config)
        .delete_leave(&doctor_id, &leave_id, &user, auth.token())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler(state = AppState)]
pub async fn get_slots(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path((doctor_id, clinic_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<SlotView>, AppError> {
    let view = SlotService::new(&state.config, state.cache.clone())
        .slot_view(doctor_id, clinic_id, query.date, auth.token())
        .await?;
    Ok(Json(view))
}

// ==============================================================================
// CLINIC MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn create_clinic(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateClinicRequest>,
) -> Result<Json<Clinic>, AppError> {
    let clinic = ClinicService::new(&config)
        .create_clinic(request, &user, auth.token())
        .await?;
    Ok(Json(clinic))
}

#[axum::debug_handler]
pub async fn link_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(clinic_id): Path<String>,
    Json(request): Json<LinkDoctorRequest>,
) -> Result<Json<DoctorClinic>, AppError> {
    let link = ClinicService::new(&config)
        .link_doctor(&clinic_id, request, &user, auth.token())
        .await?;
    Ok(Json(link))
}
