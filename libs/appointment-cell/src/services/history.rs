use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use tracing::{debug, error};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DatabaseError, SupabaseClient};

use crate::models::{AppointmentHistory, HistoryAction};

/// One audit row for an appointment change.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub appointment_id: Uuid,
    pub action: HistoryAction,
    pub previous: Option<(NaiveDate, NaiveTime)>,
    pub new: Option<(NaiveDate, NaiveTime)>,
    pub actor_id: String,
    pub note: Option<String>,
}

impl HistoryEntry {
    pub fn new(appointment_id: Uuid, action: HistoryAction, actor_id: &str) -> Self {
        Self {
            appointment_id,
            action,
            previous: None,
            new: None,
            actor_id: actor_id.to_string(),
            note: None,
        }
    }

    pub fn moved(mut self, previous: (NaiveDate, NaiveTime), new: (NaiveDate, NaiveTime)) -> Self {
        self.previous = Some(previous);
        self.new = Some(new);
        self
    }

    pub fn at(mut self, slot: (NaiveDate, NaiveTime)) -> Self {
        self.new = Some(slot);
        self
    }

    pub fn note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}

pub struct HistoryLog {
    supabase: SupabaseClient,
}

impl HistoryLog {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Append a row. The appointment change has already happened, so a failed
    /// write is logged rather than returned.
    pub async fn record(&self, entry: HistoryEntry, auth_token: &str) {
        let day = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        let time = |t: NaiveTime| t.format("%H:%M:%S").to_string();

        let row = json!({
            "id": Uuid::new_v4(),
            "appointment_id": entry.appointment_id,
            "action": entry.action,
            "previous_date": entry.previous.map(|(d, _)| day(d)),
            "previous_time": entry.previous.map(|(_, t)| time(t)),
            "new_date": entry.new.map(|(d, _)| day(d)),
            "new_time": entry.new.map(|(_, t)| time(t)),
            "actor_id": entry.actor_id,
            "note": entry.note,
            "created_at": Utc::now().to_rfc3339()
        });

        let result: Result<AppointmentHistory, DatabaseError> =
            self.supabase.insert("appointment_history", Some(auth_token), row).await;
        match result {
            Ok(saved) => debug!("History {:?} recorded for appointment {}", saved.action, saved.appointment_id),
            Err(e) => error!(
                "Failed to record {:?} history for appointment {}: {}",
                entry.action, entry.appointment_id, e
            ),
        }
    }

    pub async fn list(&self, appointment_id: Uuid, auth_token: &str) -> Result<Vec<AppointmentHistory>, DatabaseError> {
        let query = format!("appointment_id=eq.{}&order=created_at.asc", appointment_id);
        self.supabase.select("appointment_history", &query, Some(auth_token)).await
    }
}
