use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, CheckInRequest, QueueEntry, QueueStatus,
};
use crate::services::booking::find_appointment;
use crate::services::lifecycle::{clinic_today, queue_transition};

/// Attempts at claiming the next token before giving up.
const TOKEN_ATTEMPTS: u32 = 3;

#[derive(Debug, Deserialize)]
struct TokenRow {
    token_number: i32,
}

fn ensure_front_desk(user: &User, doctor_id: &Uuid) -> Result<(), AppointmentError> {
    if user.is_staff_or_admin() || (user.has_role(Role::Doctor) && user.is_self(doctor_id)) {
        Ok(())
    } else {
        Err(AppointmentError::Unauthorized)
    }
}

pub struct QueueService {
    supabase: SupabaseClient,
    clinic_utc_offset_minutes: i32,
}

impl QueueService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            clinic_utc_offset_minutes: config.clinic_utc_offset_minutes,
        }
    }

    async fn entry_for_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<QueueEntry>, AppointmentError> {
        let query = format!("appointment_id=eq.{}", appointment_id);
        Ok(self.supabase.select_one("queue_entries", &query, Some(auth_token)).await?)
    }

    async fn next_token(&self, appointment: &Appointment, day: NaiveDate, auth_token: &str) -> Result<i32, AppointmentError> {
        let query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&queue_date=eq.{}&select=token_number&order=token_number.desc&limit=1",
            appointment.doctor_id,
            appointment.clinic_id,
            day.format("%Y-%m-%d")
        );
        let highest: Option<TokenRow> = self.supabase.select_one("queue_entries", &query, Some(auth_token)).await?;
        Ok(highest.map_or(1, |row| row.token_number + 1))
    }

    /// Put a patient who has arrived into today's queue with the next token.
    pub async fn check_in(
        &self,
        request: CheckInRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<QueueEntry, AppointmentError> {
        let appointment = find_appointment(&self.supabase, &request.appointment_id.to_string(), auth_token).await?;
        ensure_front_desk(user, &appointment.doctor_id)?;

        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::NotScheduled(appointment.status));
        }
        let today = clinic_today(self.clinic_utc_offset_minutes);
        if appointment.appointment_date != today {
            return Err(AppointmentError::NotToday);
        }
        if self.entry_for_appointment(appointment.id, auth_token).await?.is_some() {
            return Err(AppointmentError::AlreadyCheckedIn);
        }

        for attempt in 1..=TOKEN_ATTEMPTS {
            let token_number = self.next_token(&appointment, today, auth_token).await?;
            debug!("Check-in attempt {} for appointment {} with token {}", attempt, appointment.id, token_number);

            let now = Utc::now().to_rfc3339();
            let row = json!({
                "id": Uuid::new_v4(),
                "appointment_id": appointment.id,
                "doctor_id": appointment.doctor_id,
                "clinic_id": appointment.clinic_id,
                "queue_date": today.format("%Y-%m-%d").to_string(),
                "token_number": token_number,
                "status": QueueStatus::Waiting,
                "checked_in_at": now,
                "updated_at": now
            });

            match self.supabase.insert::<QueueEntry>("queue_entries", Some(auth_token), row).await {
                Ok(entry) => {
                    info!("Appointment {} checked in with token {}", entry.appointment_id, entry.token_number);
                    return Ok(entry);
                }
                Err(e) if e.is_conflict() => {
                    if self.entry_for_appointment(appointment.id, auth_token).await?.is_some() {
                        return Err(AppointmentError::AlreadyCheckedIn);
                    }
                    warn!("Token {} taken concurrently, retrying", token_number);
                }
                Err(e) => return Err(e.into()),
            }
        }

        warn!("Gave up assigning a token for appointment {}", appointment.id);
        Err(AppointmentError::TokenContention)
    }

    pub async fn list_queue(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        date: Option<NaiveDate>,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<QueueEntry>, AppointmentError> {
        ensure_front_desk(user, &doctor_id)?;

        let day = date.unwrap_or_else(|| clinic_today(self.clinic_utc_offset_minutes));
        let query = format!(
            "clinic_id=eq.{}&doctor_id=eq.{}&queue_date=eq.{}&order=token_number.asc",
            clinic_id,
            doctor_id,
            day.format("%Y-%m-%d")
        );
        Ok(self.supabase.select("queue_entries", &query, Some(auth_token)).await?)
    }

    async fn move_entry(&self, entry: &QueueEntry, to: QueueStatus, auth_token: &str) -> Result<QueueEntry, AppointmentError> {
        queue_transition(entry.status, to)?;

        let filter = format!("id=eq.{}&status=eq.{}", entry.id, entry.status.as_str());
        let changes = json!({ "status": to, "updated_at": Utc::now().to_rfc3339() });
        let updated: QueueEntry = self
            .supabase
            .update("queue_entries", &filter, Some(auth_token), changes)
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    AppointmentError::InvalidQueueTransition {
                        from: entry.status.as_str(),
                        to: to.as_str(),
                    }
                } else {
                    e.into()
                }
            })?;

        info!("Queue token {} moved to {}", updated.token_number, updated.status.as_str());
        Ok(updated)
    }

    /// Move the lowest waiting token into consultation.
    pub async fn call_next(
        &self,
        clinic_id: Uuid,
        doctor_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<QueueEntry, AppointmentError> {
        ensure_front_desk(user, &doctor_id)?;

        let today = clinic_today(self.clinic_utc_offset_minutes);
        let query = format!(
            "clinic_id=eq.{}&doctor_id=eq.{}&queue_date=eq.{}&status=eq.waiting&order=token_number.asc&limit=1",
            clinic_id,
            doctor_id,
            today.format("%Y-%m-%d")
        );
        let next: QueueEntry = self
            .supabase
            .select_one("queue_entries", &query, Some(auth_token))
            .await?
            .ok_or(AppointmentError::NobodyWaiting)?;

        self.move_entry(&next, QueueStatus::InConsultation, auth_token).await
    }

    pub async fn update_status(
        &self,
        entry_id: &str,
        to: QueueStatus,
        user: &User,
        auth_token: &str,
    ) -> Result<QueueEntry, AppointmentError> {
        let query = format!("id=eq.{}", filter_value(entry_id));
        let entry: QueueEntry = self
            .supabase
            .select_one("queue_entries", &query, Some(auth_token))
            .await?
            .ok_or(AppointmentError::QueueEntryNotFound)?;
        ensure_front_desk(user, &entry.doctor_id)?;

        self.move_entry(&entry, to, auth_token).await
    }
}
