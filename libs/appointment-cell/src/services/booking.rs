use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::models::SlotStatus;
use doctor_cell::services::{ClinicService, DoctorService, SlotService};
use shared_cache::CacheStore;
use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::{Role, User};
use shared_models::FieldErrors;

use crate::models::{
    Appointment, AppointmentError, AppointmentHistory, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, DoctorAppointmentsQuery, HistoryAction, RescheduleAppointmentRequest,
};
use crate::services::access::{ensure_can_record_outcome, ensure_can_view, is_participant};
use crate::services::history::{HistoryEntry, HistoryLog};
use crate::services::lifecycle::{appointment_transition, clinic_now, ensure_not_past};

const MAX_REASON_LEN: usize = 500;

pub async fn find_appointment(
    supabase: &SupabaseClient,
    appointment_id: &str,
    auth_token: &str,
) -> Result<Appointment, AppointmentError> {
    let query = format!("id=eq.{}", filter_value(appointment_id));
    supabase
        .select_one("appointments", &query, Some(auth_token))
        .await?
        .ok_or(AppointmentError::NotFound)
}

fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    doctors: DoctorService,
    clinics: ClinicService,
    slots: SlotService,
    history: HistoryLog,
    clinic_utc_offset_minutes: i32,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            doctors: DoctorService::new(config),
            clinics: ClinicService::new(config),
            slots: SlotService::new(config, cache),
            history: HistoryLog::new(config),
            clinic_utc_offset_minutes: config.clinic_utc_offset_minutes,
        }
    }

    /// Who the booking is for: patients book for themselves, staff and admins
    /// name the patient.
    fn resolve_patient(&self, request: &BookAppointmentRequest, user: &User) -> Result<Uuid, AppointmentError> {
        match user.role() {
            Some(Role::Patient) => {
                let own_id = Uuid::parse_str(&user.id).map_err(|_| AppointmentError::Unauthorized)?;
                match request.patient_id {
                    Some(id) if id != own_id => Err(AppointmentError::Unauthorized),
                    _ => Ok(own_id),
                }
            }
            Some(Role::Staff) | Some(Role::Admin) => request.patient_id.ok_or_else(|| {
                let mut errors = FieldErrors::new();
                errors.add("patient_id", "This field is required");
                AppointmentError::Invalid(errors)
            }),
            _ => Err(AppointmentError::Unauthorized),
        }
    }

    /// Everything a start time must satisfy before a row is written: in the
    /// future, a verified doctor actively practising at the clinic, a slot
    /// start from the template, not booked and not on leave. Returns the slot end.
    async fn check_slot(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
        auth_token: &str,
    ) -> Result<NaiveTime, AppointmentError> {
        ensure_not_past(date, time, clinic_now(self.clinic_utc_offset_minutes))?;

        let doctor = self.doctors.get_doctor(&doctor_id.to_string(), Some(auth_token)).await?;
        if !doctor.is_verified() {
            warn!("Booking refused, doctor {} has KYC status {:?}", doctor_id, doctor.kyc_status);
            return Err(AppointmentError::DoctorNotVerified);
        }

        self.clinics
            .active_link(&doctor_id.to_string(), &clinic_id.to_string(), auth_token)
            .await?;

        match self.slots.slot_status(doctor_id, clinic_id, date, time, auth_token).await? {
            SlotStatus::Available { end_time } => Ok(end_time),
            SlotStatus::Booked => {
                warn!("Slot {} {} already booked for doctor {}", date, time, doctor_id);
                Err(AppointmentError::SlotTaken)
            }
            SlotStatus::OnLeave => Err(AppointmentError::DoctorOnLeave),
            SlotStatus::NotASlot => Err(AppointmentError::NotASlot),
        }
    }

    #[instrument(skip(self, request, user, auth_token), fields(doctor_id = %request.doctor_id))]
    pub async fn book_appointment(
        &self,
        request: BookAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Booking {} {} at clinic {}", request.appointment_date, request.appointment_time, request.clinic_id);

        let patient_id = self.resolve_patient(&request, user)?;

        let mut errors = FieldErrors::new();
        if let Some(reason) = &request.reason {
            errors.check(reason.len() <= MAX_REASON_LEN, "reason", "Reason is too long");
        }
        errors.into_result()?;

        let end_time = self
            .check_slot(
                request.doctor_id,
                request.clinic_id,
                request.appointment_date,
                request.appointment_time,
                auth_token,
            )
            .await?;

        let now = Utc::now().to_rfc3339();
        let row = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "clinic_id": request.clinic_id,
            "appointment_date": format_date(request.appointment_date),
            "appointment_time": format_time(request.appointment_time),
            "end_time": format_time(end_time),
            "status": AppointmentStatus::Scheduled,
            "reason": request.reason,
            "created_by": user.id,
            "created_at": now,
            "updated_at": now
        });

        // The partial unique index settles races the read above cannot see.
        let appointment: Appointment = self
            .supabase
            .insert("appointments", Some(auth_token), row)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    warn!("Concurrent booking lost the race for {} {}", request.appointment_date, request.appointment_time);
                    AppointmentError::SlotTaken
                } else {
                    e.into()
                }
            })?;

        self.history
            .record(
                HistoryEntry::new(appointment.id, HistoryAction::Booked, &user.id)
                    .at((appointment.appointment_date, appointment.appointment_time)),
                auth_token,
            )
            .await;
        self.slots
            .invalidate(appointment.doctor_id, appointment.clinic_id, appointment.appointment_date)
            .await;

        info!("Appointment {} booked for patient {}", appointment.id, appointment.patient_id);
        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = find_appointment(&self.supabase, appointment_id, auth_token).await?;
        ensure_can_view(user, &appointment)?;
        Ok(appointment)
    }

    /// A patient's appointments. Doctors only see the ones they treat.
    pub async fn list_patient_appointments(
        &self,
        patient_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query = format!("patient_id=eq.{}", patient_id);
        if user.has_role(Role::Doctor) {
            query.push_str(&format!("&doctor_id=eq.{}", filter_value(&user.id)));
        } else if !(user.is_self(&patient_id) || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }
        query.push_str("&order=appointment_date.desc,appointment_time.desc");

        Ok(self.supabase.select("appointments", &query, Some(auth_token)).await?)
    }

    pub async fn list_doctor_appointments(
        &self,
        doctor_id: Uuid,
        filters: DoctorAppointmentsQuery,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if !(user.is_self(&doctor_id) || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }

        let mut query = format!("doctor_id=eq.{}", doctor_id);
        if let Some(date) = filters.date {
            query.push_str(&format!("&appointment_date=eq.{}", format_date(date)));
        }
        if let Some(status) = filters.status {
            query.push_str(&format!("&status=eq.{}", status.as_str()));
        }
        query.push_str("&order=appointment_date.asc,appointment_time.asc");

        Ok(self.supabase.select("appointments", &query, Some(auth_token)).await?)
    }

    /// Apply a status change guarded on the status that was read.
    async fn change_status(
        &self,
        appointment: &Appointment,
        to: AppointmentStatus,
        mut changes: serde_json::Map<String, Value>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        appointment_transition(appointment.status, to)?;

        changes.insert("status".to_string(), json!(to));
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!("id=eq.{}&status=eq.{}", appointment.id, appointment.status.as_str());
        let updated: Appointment = self
            .supabase
            .update("appointments", &filter, Some(auth_token), Value::Object(changes))
            .await
            .map_err(|e| {
                if e.is_not_found() {
                    warn!("Appointment {} changed underneath a {} request", appointment.id, to);
                    AppointmentError::InvalidStatusTransition {
                        from: appointment.status.as_str(),
                        to: to.as_str(),
                    }
                } else {
                    e.into()
                }
            })?;

        self.slots
            .invalidate(updated.doctor_id, updated.clinic_id, updated.appointment_date)
            .await;
        info!("Appointment {} moved to {}", updated.id, updated.status);
        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: &str,
        request: CancelAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = find_appointment(&self.supabase, appointment_id, auth_token).await?;
        if !(is_participant(user, &appointment) || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }

        let reason = request.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        let mut changes = serde_json::Map::new();
        changes.insert("cancellation_reason".to_string(), json!(reason));

        let updated = self
            .change_status(&appointment, AppointmentStatus::Cancelled, changes, auth_token)
            .await?;

        self.history
            .record(
                HistoryEntry::new(updated.id, HistoryAction::Cancelled, &user.id).note(reason),
                auth_token,
            )
            .await;
        Ok(updated)
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.record_outcome(appointment_id, AppointmentStatus::Completed, HistoryAction::Completed, user, auth_token)
            .await
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.record_outcome(appointment_id, AppointmentStatus::NoShow, HistoryAction::NoShow, user, auth_token)
            .await
    }

    async fn record_outcome(
        &self,
        appointment_id: &str,
        to: AppointmentStatus,
        action: HistoryAction,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = find_appointment(&self.supabase, appointment_id, auth_token).await?;
        ensure_can_record_outcome(user, &appointment)?;

        let updated = self
            .change_status(&appointment, to, serde_json::Map::new(), auth_token)
            .await?;

        self.history
            .record(HistoryEntry::new(updated.id, action, &user.id), auth_token)
            .await;
        Ok(updated)
    }

    pub async fn reschedule_appointment(
        &self,
        appointment_id: &str,
        request: RescheduleAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = find_appointment(&self.supabase, appointment_id, auth_token).await?;
        if !(user.is_self(&appointment.patient_id) || user.is_staff_or_admin()) {
            return Err(AppointmentError::Unauthorized);
        }
        if appointment.status != AppointmentStatus::Scheduled {
            return Err(AppointmentError::NotScheduled(appointment.status));
        }

        let previous = (appointment.appointment_date, appointment.appointment_time);
        let next = (request.appointment_date, request.appointment_time);
        if previous == next {
            let mut errors = FieldErrors::new();
            errors.add("appointment_time", "New time is the same as the current one");
            return Err(errors.into());
        }

        debug!("Rescheduling appointment {} from {:?} to {:?}", appointment.id, previous, next);

        let end_time = self
            .check_slot(appointment.doctor_id, appointment.clinic_id, next.0, next.1, auth_token)
            .await?;

        let changes = json!({
            "appointment_date": format_date(next.0),
            "appointment_time": format_time(next.1),
            "end_time": format_time(end_time),
            "updated_at": Utc::now().to_rfc3339()
        });
        let filter = format!("id=eq.{}&status=eq.scheduled", appointment.id);
        let updated: Appointment = self
            .supabase
            .update("appointments", &filter, Some(auth_token), changes)
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    AppointmentError::SlotTaken
                } else if e.is_not_found() {
                    warn!("Appointment {} left scheduled before it could be moved", appointment.id);
                    AppointmentError::NotScheduled(appointment.status)
                } else {
                    e.into()
                }
            })?;

        self.history
            .record(
                HistoryEntry::new(updated.id, HistoryAction::Rescheduled, &user.id)
                    .moved(previous, next)
                    .note(request.reason),
                auth_token,
            )
            .await;
        self.slots.invalidate(appointment.doctor_id, appointment.clinic_id, previous.0).await;
        if next.0 != previous.0 {
            self.slots.invalidate(appointment.doctor_id, appointment.clinic_id, next.0).await;
        }

        info!("Appointment {} rescheduled to {} {}", updated.id, next.0, next.1);
        Ok(updated)
    }

    pub async fn appointment_history(
        &self,
        appointment_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<AppointmentHistory>, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, user, auth_token).await?;
        Ok(self.history.list(appointment.id, auth_token).await?)
    }
}
