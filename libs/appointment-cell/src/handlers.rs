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
use shared_utils::AppState;

use crate::models::{
    Appointment, AppointmentHistory, BookAppointmentRequest, CancelAppointmentRequest, CheckInRequest,
    CreatePrescriptionRequest, DoctorAppointmentsQuery, Prescription, QueueEntry, QueueQuery,
    QueueStatusRequest, RescheduleAppointmentRequest,
};
use crate::services::{AppointmentBookingService, PrescriptionService, QueueService};

fn booking_service(state: &AppState) -> AppointmentBookingService {
    AppointmentBookingService::new(&state.config, state.cache.clone())
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[axum::debug_handler(state = AppState)]
pub async fn book_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .book_appointment(request, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn get_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .get_appointment(&appointment_id, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn get_patient_appointments(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let appointments = booking_service(&state)
        .list_patient_appointments(patient_id, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler(state = AppState)]
pub async fn get_doctor_appointments(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<DoctorAppointmentsQuery>,
) -> Result<Json<Value>, AppError> {
    let appointments = booking_service(&state)
        .list_doctor_appointments(doctor_id, query, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler(state = AppState)]
pub async fn cancel_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .cancel_appointment(&appointment_id, request, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn reschedule_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .reschedule_appointment(&appointment_id, request, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn complete_appointment(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .complete_appointment(&appointment_id, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn mark_no_show(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Appointment>, AppError> {
    let appointment = booking_service(&state)
        .mark_no_show(&appointment_id, &user, auth.token())
        .await?;
    Ok(Json(appointment))
}

#[axum::debug_handler(state = AppState)]
pub async fn get_appointment_history(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Vec<AppointmentHistory>>, AppError> {
    let history = booking_service(&state)
        .appointment_history(&appointment_id, &user, auth.token())
        .await?;
    Ok(Json(history))
}

// ==============================================================================
// QUEUE
// ==============================================================================

#[axum::debug_handler]
pub async fn check_in(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = QueueService::new(&config)
        .check_in(request, &user, auth.token())
        .await?;
    Ok(Json(entry))
}

#[axum::debug_handler]
pub async fn get_queue(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((clinic_id, doctor_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<QueueQuery>,
) -> Result<Json<Value>, AppError> {
    let entries = QueueService::new(&config)
        .list_queue(clinic_id, doctor_id, query.date, &user, auth.token())
        .await?;

    Ok(Json(json!({
        "entries": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn call_next(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path((clinic_id, doctor_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = QueueService::new(&config)
        .call_next(clinic_id, doctor_id, &user, auth.token())
        .await?;
    Ok(Json(entry))
}

#[axum::debug_handler]
pub async fn update_queue_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(entry_id): Path<String>,
    Json(request): Json<QueueStatusRequest>,
) -> Result<Json<QueueEntry>, AppError> {
    let entry = QueueService::new(&config)
        .update_status(&entry_id, request.status, &user, auth.token())
        .await?;
    Ok(Json(entry))
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Prescription>, AppError> {
    let prescription = PrescriptionService::new(&config)
        .create_prescription(request, &user, auth.token())
        .await?;
    Ok(Json(prescription))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Prescription>, AppError> {
    let prescription = PrescriptionService::new(&config)
        .get_prescription(&prescription_id, &user, auth.token())
        .await?;
    Ok(Json(prescription))
}

#[axum::debug_handler]
pub async fn get_appointment_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Vec<Prescription>>, AppError> {
    let prescriptions = PrescriptionService::new(&config)
        .appointment_prescriptions(&appointment_id, &user, auth.token())
        .await?;
    Ok(Json(prescriptions))
}

#[axum::debug_handler]
pub async fn get_patient_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<Uuid>,
) -> Result<Json<Vec<Prescription>>, AppError> {
    let prescriptions = PrescriptionService::new(&config)
        .patient_prescriptions(patient_id, &user, auth.token())
        .await?;
    Ok(Json(prescriptions))
}
