use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use doctor_cell::DoctorError;
use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::FieldErrors;

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub end_time: Option<NaiveTime>,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Omitted when a patient books for themselves.
    pub patient_id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorAppointmentsQuery {
    pub date: Option<NaiveDate>,
    pub status: Option<AppointmentStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Booked,
    Rescheduled,
    Cancelled,
    Completed,
    NoShow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentHistory {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub action: HistoryAction,
    pub previous_date: Option<NaiveDate>,
    pub previous_time: Option<NaiveTime>,
    pub new_date: Option<NaiveDate>,
    pub new_time: Option<NaiveTime>,
    pub actor_id: Uuid,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==============================================================================
// QUEUE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Waiting,
    InConsultation,
    Done,
    Skipped,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Waiting => "waiting",
            QueueStatus::InConsultation => "in_consultation",
            QueueStatus::Done => "done",
            QueueStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub queue_date: NaiveDate,
    pub token_number: i32,
    pub status: QueueStatus,
    pub checked_in_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub appointment_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueStatusRequest {
    pub status: QueueStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueQuery {
    pub date: Option<NaiveDate>,
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration_days: i32,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub recommended_test_ids: Vec<Uuid>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub appointment_id: Uuid,
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medicines: Vec<Medicine>,
    #[serde(default)]
    pub recommended_test_ids: Vec<Uuid>,
    pub notes: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Queue entry not found")]
    QueueEntryNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("Nobody is waiting in this queue")]
    NobodyWaiting,

    #[error("Slot already booked")]
    SlotTaken,

    #[error("Requested time is not a slot start for this doctor and day")]
    NotASlot,

    #[error("Doctor is on leave on this date")]
    DoctorOnLeave,

    #[error("Doctor is not verified for bookings")]
    DoctorNotVerified,

    #[error("Appointment is in the past")]
    InPast,

    #[error("Cannot move appointment from {from} to {to}")]
    InvalidStatusTransition { from: &'static str, to: &'static str },

    #[error("Appointment is {0}, only scheduled appointments can be changed")]
    NotScheduled(AppointmentStatus),

    #[error("Cannot move queue entry from {from} to {to}")]
    InvalidQueueTransition { from: &'static str, to: &'static str },

    #[error("Appointment is already checked in")]
    AlreadyCheckedIn,

    #[error("Only today's appointments can be checked in")]
    NotToday,

    #[error("Could not assign a queue token, try again")]
    TokenContention,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Doctor(#[from] DoctorError),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for AppointmentError {
    fn from(errors: FieldErrors) -> Self {
        AppointmentError::Invalid(errors)
    }
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound
            | AppointmentError::QueueEntryNotFound
            | AppointmentError::PrescriptionNotFound
            | AppointmentError::NobodyWaiting => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken
            | AppointmentError::DoctorOnLeave
            | AppointmentError::DoctorNotVerified
            | AppointmentError::InvalidStatusTransition { .. }
            | AppointmentError::NotScheduled(_)
            | AppointmentError::InvalidQueueTransition { .. }
            | AppointmentError::AlreadyCheckedIn
            | AppointmentError::TokenContention => AppError::Conflict(err.to_string()),
            AppointmentError::NotASlot | AppointmentError::InPast | AppointmentError::NotToday => {
                AppError::BadRequest(err.to_string())
            }
            AppointmentError::Unauthorized => AppError::Forbidden(err.to_string()),
            AppointmentError::Invalid(fields) => AppError::InvalidFields(fields),
            AppointmentError::Doctor(e) => e.into(),
            AppointmentError::Database(e) => e.into(),
        }
    }
}
