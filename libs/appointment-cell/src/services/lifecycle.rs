use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tracing::warn;

use crate::models::{AppointmentError, AppointmentStatus, QueueStatus};

/// Scheduled appointments end in exactly one terminal state.
pub fn appointment_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<AppointmentStatus, AppointmentError> {
    use AppointmentStatus::*;
    match (from, to) {
        (Scheduled, Completed | Cancelled | NoShow) => Ok(to),
        _ => {
            warn!("Invalid appointment transition attempted: {} -> {}", from, to);
            Err(AppointmentError::InvalidStatusTransition {
                from: from.as_str(),
                to: to.as_str(),
            })
        }
    }
}

pub fn queue_transition(from: QueueStatus, to: QueueStatus) -> Result<QueueStatus, AppointmentError> {
    use QueueStatus::*;
    match (from, to) {
        (Waiting, InConsultation | Skipped) | (InConsultation, Done) | (Skipped, Waiting) => Ok(to),
        _ => {
            warn!("Invalid queue transition attempted: {:?} -> {:?}", from, to);
            Err(AppointmentError::InvalidQueueTransition {
                from: from.as_str(),
                to: to.as_str(),
            })
        }
    }
}

/// Wall-clock time at the clinic.
pub fn clinic_now(utc_offset_minutes: i32) -> NaiveDateTime {
    (Utc::now() + Duration::minutes(utc_offset_minutes as i64)).naive_utc()
}

pub fn clinic_today(utc_offset_minutes: i32) -> NaiveDate {
    clinic_now(utc_offset_minutes).date()
}

/// Rejects start times that have already passed at the clinic.
pub fn ensure_not_past(date: NaiveDate, time: NaiveTime, now: NaiveDateTime) -> Result<(), AppointmentError> {
    if date.and_time(time) <= now {
        return Err(AppointmentError::InPast);
    }
    Ok(())
}
