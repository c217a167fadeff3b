use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;
use shared_utils::validators::{is_valid_email, is_valid_phone, normalize_phone};

use crate::models::{
    CreateDoctorRequest, Doctor, DoctorError, DoctorSearchQuery, KycDecision, KycReviewRequest,
    KycStatus, SubmitKycRequest,
};
use crate::services::access::ensure_admin;

const DEFAULT_LIMIT: i32 = 50;
const MAX_LIMIT: i32 = 200;

/// Allowed KYC moves: pending or rejected to submitted, submitted to a verdict.
pub fn kyc_transition(from: KycStatus, to: KycStatus) -> Result<KycStatus, DoctorError> {
    use KycStatus::*;
    match (from, to) {
        (Pending | Rejected, Submitted) | (Submitted, Verified | Rejected) => Ok(to),
        _ => Err(DoctorError::InvalidKycTransition {
            from: from.as_str(),
            to: to.as_str(),
        }),
    }
}

fn validate_onboarding(request: &CreateDoctorRequest) -> FieldErrors {
    let mut errors = FieldErrors::new();
    errors.require_text("full_name", &request.full_name);
    errors.require_text("specialization", &request.specialization);
    errors.require_text("qualification", &request.qualification);
    errors.require_text("registration_number", &request.registration_number);
    errors.check(is_valid_phone(&normalize_phone(&request.phone)), "phone", "Enter a valid phone number");
    errors.check(request.experience_years >= 0, "experience_years", "Experience cannot be negative");
    if let Some(email) = &request.email {
        errors.check(is_valid_email(email), "email", "Enter a valid email address");
    }
    errors
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a doctor profile. A doctor onboards under their own account id;
    /// an admin names the account in `user_id`.
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let mut errors = validate_onboarding(&request);

        let doctor_id = match user.role() {
            Some(Role::Doctor) => Some(user.id.clone()),
            Some(Role::Admin) => {
                errors.check(request.user_id.is_some(), "user_id", "This field is required");
                request.user_id.map(|id| id.to_string())
            }
            _ => return Err(DoctorError::UnauthorizedAccess),
        };
        errors.into_result()?;
        let doctor_id = doctor_id.ok_or_else(|| DoctorError::ValidationError("user_id is required".to_string()))?;

        debug!("Onboarding doctor {}", doctor_id);

        let registration = request.registration_number.trim().to_string();
        let existing_query = format!("registration_number=eq.{}&select=id", filter_value(&registration));
        let existing: Vec<Value> = self.supabase.select("doctors", &existing_query, Some(auth_token)).await?;
        if !existing.is_empty() {
            warn!("Duplicate registration number on onboarding");
            return Err(DoctorError::DuplicateRegistration(registration));
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "id": doctor_id,
            "full_name": request.full_name.trim(),
            "phone": normalize_phone(&request.phone),
            "email": request.email,
            "specialization": request.specialization.trim(),
            "qualification": request.qualification.trim(),
            "registration_number": registration,
            "experience_years": request.experience_years,
            "kyc_status": KycStatus::Pending,
            "kyc_documents": [],
            "created_at": now,
            "updated_at": now
        });

        let doctor: Doctor = self
            .supabase
            .insert("doctors", Some(auth_token), doctor_data)
            .await
            .map_err(|e| if e.is_conflict() { DoctorError::AlreadyOnboarded } else { e.into() })?;

        info!("Doctor {} onboarded, KYC pending", doctor.id);
        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: Option<&str>) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor: {}", doctor_id);

        let query = format!("id=eq.{}", filter_value(doctor_id));
        self.supabase
            .select_one("doctors", &query, auth_token)
            .await?
            .ok_or(DoctorError::NotFound)
    }

    /// Public listing shows verified doctors unless another status is asked for.
    pub async fn search_doctors(
        &self,
        query: DoctorSearchQuery,
        auth_token: Option<&str>,
    ) -> Result<Vec<Doctor>, DoctorError> {
        debug!("Searching doctors with filters: {:?}", query);

        let status = query.kyc_status.unwrap_or(KycStatus::Verified);
        let mut parts = vec![format!("kyc_status=eq.{}", status.as_str())];

        if let Some(specialization) = query.specialization.as_deref().filter(|s| !s.trim().is_empty()) {
            parts.push(format!("specialization=ilike.*{}*", filter_value(specialization.trim())));
        }

        let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = query.offset.unwrap_or(0).max(0);
        parts.push(format!("order=full_name.asc&limit={}&offset={}", limit, offset));

        Ok(self.supabase.select("doctors", &parts.join("&"), auth_token).await?)
    }

    async fn move_kyc(
        &self,
        doctor: &Doctor,
        to: KycStatus,
        mut changes: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        let next = match kyc_transition(doctor.kyc_status, to) {
            Ok(next) => next,
            Err(e) => {
                warn!("Rejected KYC transition {:?} -> {:?} for {}", doctor.kyc_status, to, doctor.id);
                return Err(e);
            }
        };

        changes.insert("kyc_status".to_string(), json!(next));
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        // Guard on the status we read so concurrent reviews cannot both apply.
        let filter = format!("id=eq.{}&kyc_status=eq.{}", doctor.id, doctor.kyc_status.as_str());
        let updated: Doctor = self
            .supabase
            .update("doctors", &filter, Some(auth_token), Value::Object(changes))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    DoctorError::InvalidKycTransition {
                        from: doctor.kyc_status.as_str(),
                        to: to.as_str(),
                    }
                } else {
                    e.into()
                }
            })?;

        info!("Doctor {} KYC moved to {}", updated.id, next.as_str());
        Ok(updated)
    }

    pub async fn submit_kyc(
        &self,
        doctor_id: &str,
        request: SubmitKycRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        if !(user.is_admin() || (user.has_role(Role::Doctor) && user.is_self(&doctor_id))) {
            return Err(DoctorError::UnauthorizedAccess);
        }

        let mut errors = FieldErrors::new();
        errors.check(!request.documents.is_empty(), "documents", "At least one document is required");
        for document in &request.documents {
            errors.check(!document.doc_type.trim().is_empty(), "documents", "Every document needs a doc_type");
            errors.check(!document.url.trim().is_empty(), "documents", "Every document needs a url");
        }
        errors.into_result()?;

        let doctor = self.get_doctor(doctor_id, Some(auth_token)).await?;

        let mut changes = serde_json::Map::new();
        changes.insert("kyc_documents".to_string(), json!(request.documents));
        changes.insert("kyc_rejection_reason".to_string(), Value::Null);

        self.move_kyc(&doctor, KycStatus::Submitted, changes, auth_token).await
    }

    pub async fn review_kyc(
        &self,
        doctor_id: &str,
        request: KycReviewRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        ensure_admin(user)?;

        let reason = request.reason.as_deref().map(str::trim).filter(|r| !r.is_empty());
        let mut changes = serde_json::Map::new();
        let to = match request.decision {
            KycDecision::Verified => {
                changes.insert("kyc_rejection_reason".to_string(), Value::Null);
                KycStatus::Verified
            }
            KycDecision::Rejected => {
                let Some(reason) = reason else {
                    let mut errors = FieldErrors::new();
                    errors.add("reason", "A reason is required when rejecting");
                    return Err(errors.into());
                };
                changes.insert("kyc_rejection_reason".to_string(), json!(reason));
                KycStatus::Rejected
            }
        };

        let doctor = self.get_doctor(doctor_id, Some(auth_token)).await?;
        self.move_kyc(&doctor, to, changes, auth_token).await
    }
}
