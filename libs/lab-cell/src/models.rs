use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::FieldErrors;

// ==============================================================================
// CATALOG
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lab {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub serviceable_pincodes: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTest {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub sample_type: String,
    pub description: Option<String>,
}

/// A test a lab offers, with its price there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabTestMapping {
    pub id: Uuid,
    pub lab_id: Uuid,
    pub test_id: Uuid,
    pub price: f64,
    pub turnaround_hours: i32,
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLabRequest {
    pub name: String,
    pub address: String,
    pub phone: String,
    #[serde(default)]
    pub serviceable_pincodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLabTestRequest {
    pub test_id: Uuid,
    pub price: f64,
    pub turnaround_hours: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabTestQuery {
    pub search: Option<String>,
}

// ==============================================================================
// ALLOCATION
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMode {
    SingleLab,
    MultiLab,
}

impl AllocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::SingleLab => "single_lab",
            AllocationMode::MultiLab => "multi_lab",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocatedTest {
    pub test_id: Uuid,
    pub lab_id: Uuid,
    pub lab_name: String,
    pub price: f64,
    pub turnaround_hours: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub mode: AllocationMode,
    pub total_price: f64,
    pub items: Vec<AllocatedTest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRequest {
    #[serde(default)]
    pub test_ids: Vec<Uuid>,
    pub pincode: String,
}

// ==============================================================================
// BOOKINGS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingGroupStatus {
    Booked,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabBookingStatus {
    Booked,
    SampleCollected,
    Completed,
    Cancelled,
}

impl fmt::Display for LabBookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LabBookingStatus::Booked => "booked",
            LabBookingStatus::SampleCollected => "sample_collected",
            LabBookingStatus::Completed => "completed",
            LabBookingStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Every lab booking made for one collection request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingGroup {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub prescription_id: Option<Uuid>,
    pub pincode: String,
    pub collection_address: String,
    pub allocation_mode: AllocationMode,
    pub total_price: f64,
    pub status: BookingGroupStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabBooking {
    pub id: Uuid,
    pub group_id: Uuid,
    pub lab_id: Uuid,
    pub test_id: Uuid,
    pub price: f64,
    pub status: LabBookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingGroupDetails {
    #[serde(flatten)]
    pub group: BookingGroup,
    pub bookings: Vec<LabBooking>,
}

/// When `prescription_id` is set and `test_ids` is empty the prescription's
/// recommended tests are booked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookLabTestsRequest {
    pub patient_id: Option<Uuid>,
    pub prescription_id: Option<Uuid>,
    #[serde(default)]
    pub test_ids: Vec<Uuid>,
    pub pincode: String,
    pub collection_address: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Error)]
pub enum LabError {
    #[error("Lab not found")]
    LabNotFound,

    #[error("Lab test not found")]
    TestNotFound,

    #[error("Lab booking not found")]
    GroupNotFound,

    #[error("Prescription not found")]
    PrescriptionNotFound,

    #[error("No lab serving this pincode offers tests: {}", join_ids(.0))]
    TestsNotOffered(Vec<Uuid>),

    #[error("This lab already offers the test")]
    DuplicateMapping,

    #[error("Lab booking is already cancelled")]
    AlreadyCancelled,

    #[error("Unauthorized access to lab bookings")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter().map(Uuid::to_string).collect::<Vec<_>>().join(", ")
}

impl From<FieldErrors> for LabError {
    fn from(errors: FieldErrors) -> Self {
        LabError::Invalid(errors)
    }
}

impl From<LabError> for AppError {
    fn from(err: LabError) -> Self {
        match err {
            LabError::LabNotFound
            | LabError::TestNotFound
            | LabError::GroupNotFound
            | LabError::PrescriptionNotFound
            | LabError::TestsNotOffered(_) => AppError::NotFound(err.to_string()),
            LabError::DuplicateMapping | LabError::AlreadyCancelled => AppError::Conflict(err.to_string()),
            LabError::Unauthorized => AppError::Forbidden(err.to_string()),
            LabError::Invalid(fields) => AppError::InvalidFields(fields),
            LabError::Database(e) => e.into(),
        }
    }
}
