use chrono::{NaiveTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};
use shared_models::auth::User;
use shared_models::FieldErrors;

use crate::models::{
    AvailabilityQuery, AvailabilityTemplate, CreateAvailabilityRequest, DoctorError, Session,
    SessionHours, UpdateAvailabilityRequest,
};
use crate::services::access::ensure_can_manage;

fn session_field(session: Session) -> &'static str {
    match session {
        Session::Morning => "morning",
        Session::Afternoon => "afternoon",
        Session::Evening => "evening",
        Session::Night => "night",
    }
}

/// Checks a template's hours: complete sessions with start before end, no
/// two sessions overlapping, a positive slot length and a non-negative buffer.
pub fn validate_hours(
    hours: &SessionHours,
    slot_duration_minutes: i32,
    buffer_minutes: i32,
) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    errors.check(slot_duration_minutes > 0, "slot_duration_minutes", "Slot duration must be positive");
    errors.check(buffer_minutes >= 0, "buffer_minutes", "Buffer cannot be negative");

    let mut windows: Vec<(&'static str, NaiveTime, NaiveTime)> = Vec::new();
    for (session, start, end) in hours.sessions() {
        let name = session_field(session);
        match (start, end) {
            (Some(start), Some(end)) if start < end => windows.push((name, start, end)),
            (Some(_), Some(_)) => errors.add(name, "Start time must be before end time"),
            (None, None) => {}
            _ => errors.add(name, "Both start and end are required"),
        }
    }

    if windows.is_empty() && errors.is_empty() {
        errors.add("sessions", "At least one session is required");
    }

    windows.sort_by_key(|(_, start, _)| *start);
    for pair in windows.windows(2) {
        let (first, _, first_end) = pair[0];
        let (second, second_start, _) = pair[1];
        if second_start < first_end {
            errors.add(second, format!("Overlaps the {} session", first));
        }
    }

    errors.into_result()
}

fn hours_json(hours: &SessionHours) -> serde_json::Map<String, Value> {
    let fmt = |t: Option<NaiveTime>| json!(t.map(|t| t.format("%H:%M:%S").to_string()));
    let mut map = serde_json::Map::new();
    map.insert("morning_start".to_string(), fmt(hours.morning_start));
    map.insert("morning_end".to_string(), fmt(hours.morning_end));
    map.insert("afternoon_start".to_string(), fmt(hours.afternoon_start));
    map.insert("afternoon_end".to_string(), fmt(hours.afternoon_end));
    map.insert("evening_start".to_string(), fmt(hours.evening_start));
    map.insert("evening_end".to_string(), fmt(hours.evening_end));
    map.insert("night_start".to_string(), fmt(hours.night_start));
    map.insert("night_end".to_string(), fmt(hours.night_end));
    map
}

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create the weekly template for one clinic and day.
    pub async fn create_availability(
        &self,
        doctor_id: &str,
        request: CreateAvailabilityRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<AvailabilityTemplate, DoctorError> {
        debug!("Creating availability for doctor: {}", doctor_id);
        ensure_can_manage(user, doctor_id)?;

        let mut errors = match validate_hours(&request.hours, request.slot_duration_minutes, request.buffer_minutes) {
            Ok(()) => FieldErrors::new(),
            Err(errors) => errors,
        };
        errors.check(
            (0..=6).contains(&request.day_of_week),
            "day_of_week",
            "Day of week must be between 0 (Monday) and 6 (Sunday)",
        );
        errors.into_result()?;

        let existing_query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&day_of_week=eq.{}&select=id",
            filter_value(doctor_id),
            request.clinic_id,
            request.day_of_week
        );
        let existing: Vec<Value> = self
            .supabase
            .select("availability_templates", &existing_query, Some(auth_token))
            .await?;
        if !existing.is_empty() {
            warn!("Duplicate template for doctor {} day {}", doctor_id, request.day_of_week);
            return Err(DoctorError::DuplicateTemplate);
        }

        let mut row = hours_json(&request.hours);
        row.insert("id".to_string(), json!(Uuid::new_v4()));
        row.insert("doctor_id".to_string(), json!(doctor_id));
        row.insert("clinic_id".to_string(), json!(request.clinic_id));
        row.insert("day_of_week".to_string(), json!(request.day_of_week));
        row.insert("slot_duration_minutes".to_string(), json!(request.slot_duration_minutes));
        row.insert("buffer_minutes".to_string(), json!(request.buffer_minutes));
        row.insert("is_active".to_string(), json!(true));
        row.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));

        let template: AvailabilityTemplate = self
            .supabase
            .insert("availability_templates", Some(auth_token), Value::Object(row))
            .await
            .map_err(|e| if e.is_conflict() { DoctorError::DuplicateTemplate } else { e.into() })?;

        info!("Availability template {} created for doctor {}", template.id, doctor_id);
        Ok(template)
    }

    pub async fn get_doctor_availability(
        &self,
        doctor_id: &str,
        query: AvailabilityQuery,
        auth_token: &str,
    ) -> Result<Vec<AvailabilityTemplate>, DoctorError> {
        debug!("Fetching availability for doctor: {}", doctor_id);

        let mut path = format!("doctor_id=eq.{}", filter_value(doctor_id));
        if let Some(clinic_id) = query.clinic_id {
            path.push_str(&format!("&clinic_id=eq.{}", clinic_id));
        }
        path.push_str("&order=clinic_id.asc,day_of_week.asc");

        Ok(self.supabase.select("availability_templates", &path, Some(auth_token)).await?)
    }

    pub async fn update_availability(
        &self,
        doctor_id: &str,
        template_id: &str,
        request: UpdateAvailabilityRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<AvailabilityTemplate, DoctorError> {
        debug!("Updating availability: {}", template_id);
        ensure_can_manage(user, doctor_id)?;
        validate_hours(&request.hours, request.slot_duration_minutes, request.buffer_minutes)?;

        let mut changes = hours_json(&request.hours);
        changes.insert("slot_duration_minutes".to_string(), json!(request.slot_duration_minutes));
        changes.insert("buffer_minutes".to_string(), json!(request.buffer_minutes));
        if let Some(is_active) = request.is_active {
            changes.insert("is_active".to_string(), json!(is_active));
        }
        changes.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let filter = format!(
            "id=eq.{}&doctor_id=eq.{}",
            filter_value(template_id),
            filter_value(doctor_id)
        );
        self.supabase
            .update("availability_templates", &filter, Some(auth_token), Value::Object(changes))
            .await
            .map_err(|e| if e.is_not_found() { DoctorError::TemplateNotFound } else { e.into() })
    }

    pub async fn delete_availability(
        &self,
        doctor_id: &str,
        template_id: &str,
        user: &User,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        ensure_can_manage(user, doctor_id)?;

        let query = format!(
            "id=eq.{}&doctor_id=eq.{}",
            filter_value(template_id),
            filter_value(doctor_id)
        );
        let deleted: Vec<Value> = self
            .supabase
            .delete("availability_templates", &query, Some(auth_token))
            .await?;

        if deleted.is_empty() {
            return Err(DoctorError::TemplateNotFound);
        }
        info!("Availability template {} deleted", template_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> Option<NaiveTime> {
        NaiveTime::from_hms_opt(h, m, 0)
    }

    #[test]
    fn accepts_disjoint_sessions() {
        let hours = SessionHours {
            morning_start: t(9, 0),
            morning_end: t(12, 0),
            evening_start: t(17, 0),
            evening_end: t(20, 0),
            ..SessionHours::default()
        };
        assert!(validate_hours(&hours, 15, 5).is_ok());
    }

    #[test]
    fn rejects_half_open_and_inverted_sessions() {
        let hours = SessionHours {
            morning_start: t(9, 0),
            afternoon_start: t(15, 0),
            afternoon_end: t(14, 0),
            ..SessionHours::default()
        };
        let errors = validate_hours(&hours, 15, 0).unwrap_err();
        assert!(errors.contains("morning"));
        assert!(errors.contains("afternoon"));
    }

    #[test]
    fn rejects_overlapping_sessions() {
        let hours = SessionHours {
            morning_start: t(9, 0),
            morning_end: t(13, 0),
            afternoon_start: t(12, 30),
            afternoon_end: t(16, 0),
            ..SessionHours::default()
        };
        let errors = validate_hours(&hours, 15, 0).unwrap_err();
        assert_eq!(errors.get("afternoon"), Some(&["Overlaps the morning session".to_string()][..]));
    }

    #[test]
    fn rejects_bad_durations_and_empty_days() {
        let errors = validate_hours(&SessionHours::default(), 0, -5).unwrap_err();
        assert!(errors.contains("slot_duration_minutes"));
        assert!(errors.contains("buffer_minutes"));

        let errors = validate_hours(&SessionHours::default(), 15, 0).unwrap_err();
        assert!(errors.contains("sessions"));
    }
}
