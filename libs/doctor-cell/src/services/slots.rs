use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use shared_cache::{CacheStore, CacheStoreExt};
use shared_config::AppConfig;
use shared_database::{filter_value, SupabaseClient};

use crate::models::{AvailabilityTemplate, DoctorError, SlotStatus, SlotView};
use crate::services::conflict::{mark_availability, ConflictChecker, LeaveChecker};
use crate::services::slot_generator::{day_index, template_slots};

pub fn slot_cache_key(doctor_id: &str, clinic_id: &str, date: NaiveDate) -> String {
    format!("slots:{}:{}:{}", doctor_id, clinic_id, date.format("%Y-%m-%d"))
}

/// Drop a cached slot view. Failures are logged; the entry expires anyway.
pub async fn invalidate_slots(cache: &dyn CacheStore, doctor_id: &str, clinic_id: &str, date: NaiveDate) {
    let key = slot_cache_key(doctor_id, clinic_id, date);
    if let Err(e) = cache.delete(&key).await {
        warn!("Failed to invalidate {}: {}", key, e);
    }
}

pub struct SlotService {
    supabase: SupabaseClient,
    conflicts: ConflictChecker,
    leaves: LeaveChecker,
    cache: Arc<dyn CacheStore>,
    cache_ttl: Duration,
}

impl SlotService {
    pub fn new(config: &AppConfig, cache: Arc<dyn CacheStore>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            conflicts: ConflictChecker::new(config),
            leaves: LeaveChecker::new(config),
            cache,
            cache_ttl: Duration::from_secs(config.slot_cache_ttl_seconds),
        }
    }

    async fn template_for(
        &self,
        doctor_id: &str,
        clinic_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Option<AvailabilityTemplate>, DoctorError> {
        let query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&day_of_week=eq.{}&is_active=eq.true&limit=1",
            filter_value(doctor_id),
            filter_value(clinic_id),
            day_index(date)
        );
        Ok(self
            .supabase
            .select_one("availability_templates", &query, Some(auth_token))
            .await?)
    }

    /// Slot view for a day, served from cache when fresh.
    #[instrument(skip(self, auth_token))]
    pub async fn slot_view(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<SlotView, DoctorError> {
        let key = slot_cache_key(&doctor_id.to_string(), &clinic_id.to_string(), date);

        match self.cache.get_json::<SlotView>(&key).await {
            Ok(Some(view)) => {
                debug!("Slot view cache hit for {}", key);
                return Ok(view);
            }
            Ok(None) => {}
            Err(e) => warn!("Slot cache read failed for {}: {}", key, e),
        }

        let view = self.compute_slot_view(doctor_id, clinic_id, date, auth_token).await?;

        if let Err(e) = self.cache.set_json(&key, &view, self.cache_ttl).await {
            warn!("Slot cache write failed for {}: {}", key, e);
        }

        Ok(view)
    }

    pub async fn compute_slot_view(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<SlotView, DoctorError> {
        let doctor = doctor_id.to_string();
        let clinic = clinic_id.to_string();

        let Some(template) = self.template_for(&doctor, &clinic, date, auth_token).await? else {
            debug!("No active template for doctor {} at clinic {} on {}", doctor, clinic, date);
            return Ok(SlotView {
                doctor_id,
                clinic_id,
                date,
                on_leave: false,
                slots: Vec::new(),
            });
        };

        let leaves = self.leaves.leaves_on(&doctor, &clinic, date, auth_token).await?;
        let on_leave = LeaveChecker::is_on_leave(&leaves, date);
        let booked = if on_leave {
            Default::default()
        } else {
            self.conflicts.booked_times(&doctor, &clinic, date, auth_token).await?
        };

        Ok(SlotView {
            doctor_id,
            clinic_id,
            date,
            on_leave,
            slots: mark_availability(template_slots(&template), &booked, on_leave),
        })
    }

    /// Fresh check of a single requested start time.
    pub async fn slot_status(
        &self,
        doctor_id: Uuid,
        clinic_id: Uuid,
        date: NaiveDate,
        start_time: NaiveTime,
        auth_token: &str,
    ) -> Result<SlotStatus, DoctorError> {
        let view = self.compute_slot_view(doctor_id, clinic_id, date, auth_token).await?;

        let Some(slot) = view.slots.iter().find(|slot| slot.start_time == start_time) else {
            return Ok(SlotStatus::NotASlot);
        };

        Ok(if view.on_leave {
            SlotStatus::OnLeave
        } else if !slot.available {
            SlotStatus::Booked
        } else {
            SlotStatus::Available { end_time: slot.end_time }
        })
    }

    pub async fn invalidate(&self, doctor_id: Uuid, clinic_id: Uuid, date: NaiveDate) {
        invalidate_slots(self.cache.as_ref(), &doctor_id.to_string(), &clinic_id.to_string(), date).await;
    }
}
