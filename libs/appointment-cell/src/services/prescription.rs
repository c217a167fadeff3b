use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;

use crate::models::{AppointmentError, AppointmentStatus, CreatePrescriptionRequest, Prescription};
use crate::services::access::ensure_can_view;
use crate::services::booking::find_appointment;

pub fn validate_prescription(request: &CreatePrescriptionRequest) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    if request.medicines.is_empty() && request.recommended_test_ids.is_empty() {
        errors.add("medicines", "Add at least one medicine or recommended test");
    }
    for medicine in &request.medicines {
        errors.check(!medicine.name.trim().is_empty(), "medicines", "Every medicine needs a name");
        errors.check(!medicine.dosage.trim().is_empty(), "medicines", "Every medicine needs a dosage");
        errors.check(!medicine.frequency.trim().is_empty(), "medicines", "Every medicine needs a frequency");
        errors.check(medicine.duration_days > 0, "medicines", "Duration must be at least one day");
    }

    errors.into_result()
}

/// Recommended tests in first-seen order without repeats.
fn unique_tests(ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(ids.len());
    for id in ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Prescription, AppointmentError> {
        let appointment = find_appointment(&self.supabase, &request.appointment_id.to_string(), auth_token).await?;

        let treating_doctor = user.has_role(Role::Doctor) && user.is_self(&appointment.doctor_id);
        if !(treating_doctor || user.is_admin()) {
            return Err(AppointmentError::Unauthorized);
        }
        if !matches!(appointment.status, AppointmentStatus::Scheduled | AppointmentStatus::Completed) {
            return Err(AppointmentError::NotScheduled(appointment.status));
        }
        validate_prescription(&request)?;

        debug!("Writing prescription for appointment {}", appointment.id);

        let row = json!({
            "id": Uuid::new_v4(),
            "appointment_id": appointment.id,
            "doctor_id": appointment.doctor_id,
            "patient_id": appointment.patient_id,
            "diagnosis": request.diagnosis,
            "medicines": request.medicines,
            "recommended_test_ids": unique_tests(&request.recommended_test_ids),
            "notes": request.notes,
            "created_at": Utc::now().to_rfc3339()
        });

        let prescription: Prescription = self.supabase.insert("prescriptions", Some(auth_token), row).await?;
        info!("Prescription {} written for patient {}", prescription.id, prescription.patient_id);
        Ok(prescription)
    }

    pub async fn get_prescription(
        &self,
        prescription_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Prescription, AppointmentError> {
        let query = format!("id=eq.{}", filter_value(prescription_id));
        let prescription: Prescription = self
            .supabase
            .select_one("prescriptions", &query, Some(auth_token))
            .await?
            .ok_or(AppointmentError::PrescriptionNotFound)?;

        let participant = user.is_self(&prescription.patient_id) || user.is_self(&prescription.doctor_id);
        if !(participant || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(prescription)
    }

    pub async fn appointment_prescriptions(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, AppointmentError> {
        let appointment = find_appointment(&self.supabase, appointment_id, auth_token).await?;
        ensure_can_view(user, &appointment)?;

        let query = format!("appointment_id=eq.{}&order=created_at.asc", appointment.id);
        Ok(self.supabase.select("prescriptions", &query, Some(auth_token)).await?)
    }

    /// A patient's prescriptions. Doctors only see the ones they wrote.
    pub async fn patient_prescriptions(
        &self,
        patient_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Prescription>, AppointmentError> {
        let mut query = format!("patient_id=eq.{}", patient_id);
        if user.has_role(Role::Doctor) {
            query.push_str(&format!("&doctor_id=eq.{}", filter_value(&user.id)));
        } else if !(user.is_self(&patient_id) || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }
        query.push_str("&order=created_at.desc");

        Ok(self.supabase.select("prescriptions", &query, Some(auth_token)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Medicine;

    fn request(medicines: Vec<Medicine>, tests: Vec<Uuid>) -> CreatePrescriptionRequest {
        CreatePrescriptionRequest {
            appointment_id: Uuid::new_v4(),
            diagnosis: Some("Viral fever".to_string()),
            medicines,
            recommended_test_ids: tests,
            notes: None,
        }
    }

    fn paracetamol() -> Medicine {
        Medicine {
            name: "Paracetamol".to_string(),
            dosage: "500 mg".to_string(),
            frequency: "1-0-1".to_string(),
            duration_days: 3,
            instructions: Some("After food".to_string()),
        }
    }

    #[test]
    fn needs_a_medicine_or_a_test() {
        let errors = validate_prescription(&request(vec![], vec![])).unwrap_err();
        assert!(errors.contains("medicines"));

        assert!(validate_prescription(&request(vec![paracetamol()], vec![])).is_ok());
        assert!(validate_prescription(&request(vec![], vec![Uuid::new_v4()])).is_ok());
    }

    #[test]
    fn medicines_are_complete() {
        let mut incomplete = paracetamol();
        incomplete.dosage = " ".to_string();
        incomplete.duration_days = 0;

        let errors = validate_prescription(&request(vec![incomplete], vec![])).unwrap_err();
        assert_eq!(errors.get("medicines").map(<[String]>::len), Some(2));
    }

    #[test]
    fn repeated_tests_collapse() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert_eq!(unique_tests(&[a, b, a, b, a]), vec![a, b]);
    }
}
