use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::User;
use shared_models::FieldErrors;
use shared_utils::validators::{is_valid_phone, is_valid_pincode, normalize_phone};

use crate::models::{
    Clinic, ClinicQuery, CreateClinicRequest, Doctor, DoctorClinic, DoctorError, LinkDoctorRequest,
};
use crate::services::access::{ensure_admin, ensure_staff_or_admin};

pub struct ClinicService {
    supabase: SupabaseClient,
}

impl ClinicService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_clinic(
        &self,
        request: CreateClinicRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Clinic, DoctorError> {
        ensure_admin(user)?;

        let mut errors = FieldErrors::new();
        errors.require_text("name", &request.name);
        errors.require_text("address", &request.address);
        errors.require_text("city", &request.city);
        errors.check(is_valid_pincode(&request.pincode), "pincode", "Enter a valid 6 digit pincode");
        errors.check(is_valid_phone(&normalize_phone(&request.phone)), "phone", "Enter a valid phone number");
        errors.into_result()?;

        let row = json!({
            "id": Uuid::new_v4(),
            "name": request.name.trim(),
            "address": request.address.trim(),
            "city": request.city.trim(),
            "pincode": request.pincode,
            "phone": normalize_phone(&request.phone),
            "is_active": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let clinic: Clinic = self.supabase.insert("clinics", Some(auth_token), row).await?;
        info!("Clinic {} created", clinic.id);
        Ok(clinic)
    }

    pub async fn get_clinic(&self, clinic_id: &str, auth_token: Option<&str>) -> Result<Clinic, DoctorError> {
        let query = format!("id=eq.{}", filter_value(clinic_id));
        self.supabase
            .select_one("clinics", &query, auth_token)
            .await?
            .ok_or(DoctorError::ClinicNotFound)
    }

    pub async fn list_clinics(&self, query: ClinicQuery, auth_token: Option<&str>) -> Result<Vec<Clinic>, DoctorError> {
        debug!("Listing clinics: {:?}", query);

        let mut parts = vec!["is_active=eq.true".to_string()];
        if let Some(city) = query.city.as_deref().filter(|c| !c.trim().is_empty()) {
            parts.push(format!("city=ilike.{}", filter_value(city.trim())));
        }
        if let Some(pincode) = query.pincode.as_deref().filter(|p| !p.is_empty()) {
            parts.push(format!("pincode=eq.{}", filter_value(pincode)));
        }
        parts.push("order=name.asc".to_string());

        Ok(self.supabase.select("clinics", &parts.join("&"), auth_token).await?)
    }

    pub async fn link_doctor(
        &self,
        clinic_id: &str,
        request: LinkDoctorRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<DoctorClinic, DoctorError> {
        ensure_staff_or_admin(user)?;

        let mut errors = FieldErrors::new();
        errors.check(request.consultation_fee >= 0.0, "consultation_fee", "Fee cannot be negative");
        errors.into_result()?;

        self.get_clinic(clinic_id, Some(auth_token)).await?;

        let doctor_query = format!("id=eq.{}&select=id", request.doctor_id);
        let doctor: Option<serde_json::Value> =
            self.supabase.select_one("doctors", &doctor_query, Some(auth_token)).await?;
        if doctor.is_none() {
            return Err(DoctorError::NotFound);
        }

        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": request.doctor_id,
            "clinic_id": clinic_id,
            "consultation_fee": request.consultation_fee,
            "is_active": true
        });

        let link: DoctorClinic = self
            .supabase
            .insert("doctor_clinics", Some(auth_token), row)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    warn!("Doctor {} already linked to clinic {}", request.doctor_id, clinic_id);
                    DoctorError::AlreadyLinked
                } else {
                    e.into()
                }
            })?;

        info!("Doctor {} linked to clinic {}", link.doctor_id, link.clinic_id);
        Ok(link)
    }

    /// Active link between a doctor and a clinic.
    pub async fn active_link(
        &self,
        doctor_id: &str,
        clinic_id: &str,
        auth_token: &str,
    ) -> Result<DoctorClinic, DoctorError> {
        let query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&is_active=eq.true",
            filter_value(doctor_id),
            filter_value(clinic_id)
        );
        self.supabase
            .select_one("doctor_clinics", &query, Some(auth_token))
            .await?
            .ok_or(DoctorError::NotLinked)
    }

    /// Doctors actively practising at a clinic.
    pub async fn clinic_doctors(&self, clinic_id: &str, auth_token: Option<&str>) -> Result<Vec<Doctor>, DoctorError> {
        let query = format!(
            "clinic_id=eq.{}&is_active=eq.true&select=doctor_id",
            filter_value(clinic_id)
        );
        let links: Vec<serde_json::Value> = self.supabase.select("doctor_clinics", &query, auth_token).await?;

        let ids: Vec<String> = links
            .iter()
            .filter_map(|link| link.get("doctor_id").and_then(|id| id.as_str()).map(str::to_string))
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let doctors_query = format!("id=in.({})&order=full_name.asc", ids.join(","));
        Ok(self.supabase.select("doctors", &doctors_query, auth_token).await?)
    }
}
