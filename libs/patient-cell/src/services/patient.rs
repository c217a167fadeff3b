use chrono::Utc;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;
use shared_utils::validators::{is_valid_email, is_valid_phone, is_valid_pincode, normalize_phone};

use crate::models::{
    CreatePatientRequest, Patient, PatientError, PatientSearchQuery, UpdatePatientRequest, GENDERS,
};

const DEFAULT_SEARCH_LIMIT: i32 = 50;
const MAX_SEARCH_LIMIT: i32 = 200;

pub struct PatientService {
    supabase: SupabaseClient,
}

fn validate_create(request: &CreatePatientRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();
    let today = Utc::now().date_naive();

    errors.require_text("full_name", &request.full_name);
    errors.check(is_valid_phone(&normalize_phone(&request.phone)), "phone", "Enter a valid phone number");
    errors.check(GENDERS.contains(&request.gender.as_str()), "gender", "Gender must be male, female or other");
    errors.check(request.date_of_birth <= today, "date_of_birth", "Date of birth cannot be in the future");
    if let Some(email) = &request.email {
        errors.check(is_valid_email(email), "email", "Enter a valid email address");
    }
    if let Some(pincode) = &request.pincode {
        errors.check(is_valid_pincode(pincode), "pincode", "Enter a valid 6 digit pincode");
    }

    errors.into_result()
}

fn validate_update(request: &UpdatePatientRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if let Some(name) = &request.full_name {
        errors.require_text("full_name", name);
    }
    if let Some(phone) = &request.phone {
        errors.check(is_valid_phone(&normalize_phone(phone)), "phone", "Enter a valid phone number");
    }
    if let Some(gender) = &request.gender {
        errors.check(GENDERS.contains(&gender.as_str()), "gender", "Gender must be male, female or other");
    }
    if let Some(dob) = request.date_of_birth {
        errors.check(dob <= Utc::now().date_naive(), "date_of_birth", "Date of birth cannot be in the future");
    }
    if let Some(email) = &request.email {
        errors.check(is_valid_email(email), "email", "Enter a valid email address");
    }
    if let Some(pincode) = &request.pincode {
        errors.check(is_valid_pincode(pincode), "pincode", "Enter a valid 6 digit pincode");
    }

    errors.into_result()
}

fn can_read(user: &User, patient_id: &str) -> bool {
    user.is_self(&patient_id) || matches!(user.role(), Some(Role::Staff | Role::Admin | Role::Doctor))
}

fn can_write(user: &User, patient_id: &str) -> bool {
    user.is_self(&patient_id) || user.is_staff_or_admin()
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    async fn phone_taken(&self, phone: &str, except: Option<&str>, auth_token: &str) -> Result<bool, PatientError> {
        let mut query = format!("phone=eq.{}&select=id", filter_value(phone));
        if let Some(id) = except {
            query.push_str(&format!("&id=neq.{}", filter_value(id)));
        }
        let existing: Vec<Value> = self.supabase.select("patients", &query, Some(auth_token)).await?;
        Ok(!existing.is_empty())
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        validate_create(&request)?;

        // Patients register themselves under their own account id; staff
        // registering walk-ins get a fresh id.
        let patient_id = match user.role() {
            Some(Role::Patient) => user.id.clone(),
            Some(Role::Staff | Role::Admin) => Uuid::new_v4().to_string(),
            _ => return Err(PatientError::Unauthorized),
        };
        debug!("Creating patient {} on behalf of {}", patient_id, user.id);

        let phone = normalize_phone(&request.phone);
        if self.phone_taken(&phone, None, auth_token).await? {
            warn!("Rejected duplicate patient phone");
            return Err(PatientError::PhoneAlreadyExists { phone });
        }

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": patient_id,
            "full_name": request.full_name.trim(),
            "phone": phone,
            "email": request.email,
            "date_of_birth": request.date_of_birth.format("%Y-%m-%d").to_string(),
            "gender": request.gender,
            "blood_group": request.blood_group,
            "address": request.address,
            "pincode": request.pincode,
            "created_at": now,
            "updated_at": now
        });

        let patient: Patient = self
            .supabase
            .insert("patients", Some(auth_token), row)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    PatientError::AlreadyRegistered
                } else {
                    PatientError::Database(e)
                }
            })?;

        info!("Patient profile created with ID: {}", patient.id);
        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        if !can_read(user, patient_id) {
            return Err(PatientError::Unauthorized);
        }

        let query = format!("id=eq.{}", filter_value(patient_id));
        self.supabase
            .select_one("patients", &query, Some(auth_token))
            .await?
            .ok_or(PatientError::NotFound)
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        if !can_write(user, patient_id) {
            return Err(PatientError::Unauthorized);
        }
        validate_update(&request)?;

        let mut update_data = Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name.trim()));
        }
        if let Some(phone) = request.phone {
            let phone = normalize_phone(&phone);
            if self.phone_taken(&phone, Some(patient_id), auth_token).await? {
                return Err(PatientError::PhoneAlreadyExists { phone });
            }
            update_data.insert("phone".to_string(), json!(phone));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(dob) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(dob.format("%Y-%m-%d").to_string()));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(blood_group) = request.blood_group {
            update_data.insert("blood_group".to_string(), json!(blood_group));
        }
        if let Some(address) = request.address {
            update_data.insert("address".to_string(), json!(address));
        }
        if let Some(pincode) = request.pincode {
            update_data.insert("pincode".to_string(), json!(pincode));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}", filter_value(patient_id));
        self.supabase
            .update("patients", &filter, Some(auth_token), Value::Object(update_data))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    PatientError::NotFound
                } else {
                    PatientError::Database(e)
                }
            })
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Patient>, PatientError> {
        debug!("Searching patients with query: {:?}", query);

        if !matches!(user.role(), Some(Role::Staff | Role::Admin | Role::Doctor)) {
            return Err(PatientError::Unauthorized);
        }

        let mut query_parts = vec![];

        if let Some(name) = query.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            query_parts.push(format!("full_name=ilike.*{}*", filter_value(name)));
        }
        if let Some(phone) = query.phone.as_deref().map(normalize_phone).filter(|p| !p.is_empty()) {
            query_parts.push(format!("phone=like.*{}*", filter_value(&phone)));
        }

        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);
        query_parts.push("order=full_name.asc".to_string());
        query_parts.push(format!("limit={}&offset={}", limit, offset));

        let patients = self
            .supabase
            .select("patients", &query_parts.join("&"), Some(auth_token))
            .await?;

        Ok(patients)
    }
}
