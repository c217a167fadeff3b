use std::collections::HashSet;

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use tracing::debug;

use shared_config::AppConfig;
use shared_database::{filter_value, DatabaseError, SupabaseClient};

use crate::models::{CandidateSlot, LeaveRange, Slot};

#[derive(Debug, Deserialize)]
struct BookedTime {
    appointment_time: NaiveTime,
}

/// Scheduled appointment start times for one doctor, clinic and day.
pub struct ConflictChecker {
    supabase: SupabaseClient,
}

impl ConflictChecker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn booked_times(
        &self,
        doctor_id: &str,
        clinic_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<NaiveTime>, DatabaseError> {
        let query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&appointment_date=eq.{}&status=eq.scheduled&select=appointment_time",
            filter_value(doctor_id),
            filter_value(clinic_id),
            date.format("%Y-%m-%d")
        );
        let rows: Vec<BookedTime> = self.supabase.select("appointments", &query, Some(auth_token)).await?;
        debug!("{} scheduled bookings for doctor {} on {}", rows.len(), doctor_id, date);
        Ok(rows.into_iter().map(|row| row.appointment_time).collect())
    }

    /// Exact-match check of one start time.
    pub fn is_taken(booked: &HashSet<NaiveTime>, start_time: NaiveTime) -> bool {
        booked.contains(&start_time)
    }
}

/// Leave ranges that include a date.
pub struct LeaveChecker {
    supabase: SupabaseClient,
}

impl LeaveChecker {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn leaves_on(
        &self,
        doctor_id: &str,
        clinic_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<LeaveRange>, DatabaseError> {
        let day = date.format("%Y-%m-%d");
        let query = format!(
            "doctor_id=eq.{}&clinic_id=eq.{}&start_date=lte.{}&end_date=gte.{}",
            filter_value(doctor_id),
            filter_value(clinic_id),
            day,
            day
        );
        self.supabase.select("doctor_leaves", &query, Some(auth_token)).await
    }

    pub fn is_on_leave(leaves: &[LeaveRange], date: NaiveDate) -> bool {
        leaves.iter().any(|leave| leave.covers(date))
    }
}

/// Combine candidates with bookings and leave into the public slot list.
pub fn mark_availability(
    candidates: Vec<CandidateSlot>,
    booked: &HashSet<NaiveTime>,
    on_leave: bool,
) -> Vec<Slot> {
    candidates
        .into_iter()
        .map(|candidate| Slot {
            available: !on_leave && !ConflictChecker::is_taken(booked, candidate.start_time),
            session: candidate.session,
            start_time: candidate.start_time,
            end_time: candidate.end_time,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::slot_generator::session_slots;
    use crate::models::Session;
    use uuid::Uuid;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, day).unwrap()
    }

    fn morning() -> Vec<CandidateSlot> {
        session_slots(&[(Session::Morning, Some(t(9, 0)), Some(t(10, 0)))], 10, 0)
    }

    fn leave(start: u32, end: u32) -> LeaveRange {
        LeaveRange {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            clinic_id: Uuid::new_v4(),
            start_date: d(start),
            end_date: d(end),
            reason: None,
        }
    }

    #[test]
    fn only_the_exact_booked_start_is_unavailable() {
        let booked: HashSet<NaiveTime> = [t(9, 10)].into_iter().collect();
        let slots = mark_availability(morning(), &booked, false);

        assert_eq!(slots.len(), 6);
        for slot in &slots {
            assert_eq!(slot.available, slot.start_time != t(9, 10));
        }
    }

    #[test]
    fn bookings_at_non_slot_times_do_not_block() {
        let booked: HashSet<NaiveTime> = [t(9, 5)].into_iter().collect();
        assert!(mark_availability(morning(), &booked, false).iter().all(|s| s.available));
    }

    #[test]
    fn leave_blocks_every_slot() {
        let slots = mark_availability(morning(), &HashSet::new(), true);
        assert!(slots.iter().all(|s| !s.available));
    }

    #[test]
    fn leave_ranges_are_inclusive() {
        let leaves = vec![leave(10, 12)];
        assert!(LeaveChecker::is_on_leave(&leaves, d(10)));
        assert!(LeaveChecker::is_on_leave(&leaves, d(11)));
        assert!(LeaveChecker::is_on_leave(&leaves, d(12)));
        assert!(!LeaveChecker::is_on_leave(&leaves, d(9)));
        assert!(!LeaveChecker::is_on_leave(&leaves, d(13)));
        assert!(!LeaveChecker::is_on_leave(&[], d(10)));
    }
}
