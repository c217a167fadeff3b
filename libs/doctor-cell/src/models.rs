use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveTime, NaiveDate};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::FieldErrors;

// ==============================================================================
// DOCTORS & KYC
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    Pending,
    Submitted,
    Verified,
    Rejected,
}

impl KycStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            KycStatus::Pending => "pending",
            KycStatus::Submitted => "submitted",
            KycStatus::Verified => "verified",
            KycStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KycDocument {
    pub doc_type: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub specialization: String,
    pub qualification: String,
    pub registration_number: String,
    pub experience_years: i32,
    pub kyc_status: KycStatus,
    #[serde(default)]
    pub kyc_documents: Vec<KycDocument>,
    pub kyc_rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Doctor {
    pub fn is_verified(&self) -> bool {
        self.kyc_status == KycStatus::Verified
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    /// Account the profile belongs to. Required when an admin onboards
    /// someone else; ignored for self-onboarding.
    pub user_id: Option<Uuid>,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub specialization: String,
    pub qualification: String,
    pub registration_number: String,
    pub experience_years: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitKycRequest {
    pub documents: Vec<KycDocument>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycDecision {
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycReviewRequest {
    pub decision: KycDecision,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialization: Option<String>,
    pub kyc_status: Option<KycStatus>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

// ==============================================================================
// CLINICS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clinic {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateClinicRequest {
    pub name: String,
    pub address: String,
    pub city: String,
    pub pincode: String,
    pub phone: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicQuery {
    pub city: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorClinic {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub consultation_fee: f64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDoctorRequest {
    pub doctor_id: Uuid,
    pub consultation_fee: f64,
}

// ==============================================================================
// AVAILABILITY TEMPLATES, LEAVES & SLOTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Session {
    Morning,
    Afternoon,
    Evening,
    Night,
}

/// Weekly working hours of a doctor at one clinic. `day_of_week` counts
/// from Monday = 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityTemplate {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub day_of_week: i32,
    #[serde(flatten)]
    pub hours: SessionHours,
    pub slot_duration_minutes: i32,
    pub buffer_minutes: i32,
    pub is_active: bool,
}

pub type SessionWindow = (Session, Option<NaiveTime>, Option<NaiveTime>);

impl AvailabilityTemplate {
    pub fn sessions(&self) -> [SessionWindow; 4] {
        self.hours.sessions()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionHours {
    pub morning_start: Option<NaiveTime>,
    pub morning_end: Option<NaiveTime>,
    pub afternoon_start: Option<NaiveTime>,
    pub afternoon_end: Option<NaiveTime>,
    pub evening_start: Option<NaiveTime>,
    pub evening_end: Option<NaiveTime>,
    pub night_start: Option<NaiveTime>,
    pub night_end: Option<NaiveTime>,
}

impl SessionHours {
    /// Session windows in day order.
    pub fn sessions(&self) -> [SessionWindow; 4] {
        [
            (Session::Morning, self.morning_start, self.morning_end),
            (Session::Afternoon, self.afternoon_start, self.afternoon_end),
            (Session::Evening, self.evening_start, self.evening_end),
            (Session::Night, self.night_start, self.night_end),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAvailabilityRequest {
    pub clinic_id: Uuid,
    pub day_of_week: i32,
    #[serde(flatten)]
    pub hours: SessionHours,
    pub slot_duration_minutes: i32,
    #[serde(default)]
    pub buffer_minutes: i32,
}

/// Full replacement of a template's hours.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAvailabilityRequest {
    #[serde(flatten)]
    pub hours: SessionHours,
    pub slot_duration_minutes: i32,
    #[serde(default)]
    pub buffer_minutes: i32,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityQuery {
    pub clinic_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaveRange {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

impl LeaveRange {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLeaveRequest {
    pub clinic_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LeaveQuery {
    pub clinic_id: Option<Uuid>,
    pub from: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub session: Session,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub session: Session,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotView {
    pub doctor_id: Uuid,
    pub clinic_id: Uuid,
    pub date: NaiveDate,
    pub on_leave: bool,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

/// Outcome of checking one requested start time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotStatus {
    Available { end_time: NaiveTime },
    Booked,
    OnLeave,
    NotASlot,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Clinic not found")]
    ClinicNotFound,

    #[error("Availability template not found")]
    TemplateNotFound,

    #[error("Leave not found")]
    LeaveNotFound,

    #[error("Doctor is not linked to this clinic")]
    NotLinked,

    #[error("Doctor with registration number {0} already exists")]
    DuplicateRegistration(String),

    #[error("Doctor profile already exists")]
    AlreadyOnboarded,

    #[error("Doctor is already linked to this clinic")]
    AlreadyLinked,

    #[error("An availability template already exists for this clinic and day")]
    DuplicateTemplate,

    #[error("Cannot move KYC from {from} to {to}")]
    InvalidKycTransition { from: &'static str, to: &'static str },

    #[error("Unauthorized access to doctor data")]
    UnauthorizedAccess,

    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for DoctorError {
    fn from(errors: FieldErrors) -> Self {
        DoctorError::Invalid(errors)
    }
}

impl From<DoctorError> for AppError {
    fn from(err: DoctorError) -> Self {
        match err {
            DoctorError::NotFound
            | DoctorError::ClinicNotFound
            | DoctorError::TemplateNotFound
            | DoctorError::LeaveNotFound
            | DoctorError::NotLinked => AppError::NotFound(err.to_string()),
            DoctorError::DuplicateRegistration(_)
            | DoctorError::AlreadyOnboarded
            | DoctorError::AlreadyLinked
            | DoctorError::DuplicateTemplate
            | DoctorError::InvalidKycTransition { .. } => AppError::Conflict(err.to_string()),
            DoctorError::UnauthorizedAccess => AppError::Forbidden(err.to_string()),
            DoctorError::Invalid(fields) => AppError::InvalidFields(fields),
            DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
            DoctorError::Database(e) => e.into(),
        }
    }
}
