use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::User;
use shared_models::FieldErrors;

use crate::models::{CreateLeaveRequest, DoctorError, LeaveQuery, LeaveRange};
use crate::services::access::ensure_can_manage;

pub struct LeaveService {
    supabase: SupabaseClient,
}

impl LeaveService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_leave(
        &self,
        doctor_id: &str,
        request: CreateLeaveRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<LeaveRange, DoctorError> {
        ensure_can_manage(user, doctor_id)?;

        let mut errors = FieldErrors::new();
        errors.check(
            request.start_date <= request.end_date,
            "end_date",
            "End date cannot be before start date",
        );
        errors.into_result()?;

        debug!(
            "Recording leave for doctor {} from {} to {}",
            doctor_id, request.start_date, request.end_date
        );

        let row = json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "clinic_id": request.clinic_id,
            "start_date": request.start_date.format("%Y-%m-%d").to_string(),
            "end_date": request.end_date.format("%Y-%m-%d").to_string(),
            "reason": request.reason,
            "created_at": Utc::now().to_rfc3339()
        });

        let leave: LeaveRange = self.supabase.insert("doctor_leaves", Some(auth_token), row).await?;
        info!("Leave {} recorded for doctor {}", leave.id, doctor_id);
        Ok(leave)
    }

    pub async fn list_leaves(
        &self,
        doctor_id: &str,
        query: LeaveQuery,
        auth_token: &str,
    ) -> Result<Vec<LeaveRange>, DoctorError> {
        let mut path = format!("doctor_id=eq.{}", filter_value(doctor_id));
        if let Some(clinic_id) = query.clinic_id {
            path.push_str(&format!("&clinic_id=eq.{}", clinic_id));
        }
        if let Some(from) = query.from {
            path.push_str(&format!("&end_date=gte.{}", from.format("%Y-%m-%d")));
        }
        path.push_str("&order=start_date.asc");

        Ok(self.supabase.select("doctor_leaves", &path, Some(auth_token)).await?)
    }

    pub async fn delete_leave(
        &self,
        doctor_id: &str,
        leave_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<LeaveRange, DoctorError> {
        ensure_can_manage(user, doctor_id)?;

        let filter = format!(
            "id=eq.{}&doctor_id=eq.{}",
            filter_value(leave_id),
            filter_value(doctor_id)
        );
        let mut deleted: Vec<LeaveRange> = self
            .supabase
            .delete("doctor_leaves", &filter, Some(auth_token))
            .await?;

        if deleted.is_empty() {
            return Err(DoctorError::LeaveNotFound);
        }
        info!("Leave {} removed", leave_id);
        Ok(deleted.remove(0))
    }
}
