use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc, NaiveDate};
use thiserror::Error;

use shared_database::DatabaseError;
use shared_models::error::AppError;
use shared_models::FieldErrors;

pub const GENDERS: [&str; 3] = ["male", "female", "other"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePatientRequest {
    pub full_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePatientRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub gender: Option<String>,
    pub blood_group: Option<String>,
    pub address: Option<String>,
    pub pincode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSearchQuery {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Patient with phone {phone} already exists")]
    PhoneAlreadyExists { phone: String },

    #[error("Patient profile already exists for this account")]
    AlreadyRegistered,

    #[error("Unauthorized access to patient data")]
    Unauthorized,

    #[error("Validation failed: {0}")]
    Invalid(FieldErrors),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<FieldErrors> for PatientError {
    fn from(errors: FieldErrors) -> Self {
        PatientError::Invalid(errors)
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::NotFound => AppError::NotFound(err.to_string()),
            PatientError::PhoneAlreadyExists { .. } | PatientError::AlreadyRegistered => {
                AppError::Conflict(err.to_string())
            }
            PatientError::Unauthorized => AppError::Forbidden(err.to_string()),
            PatientError::Invalid(fields) => AppError::InvalidFields(fields),
            PatientError::Database(e) => e.into(),
        }
    }
}
