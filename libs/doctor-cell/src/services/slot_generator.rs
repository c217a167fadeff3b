use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::models::{AvailabilityTemplate, CandidateSlot, SessionWindow};

const SECONDS_PER_MINUTE: u32 = 60;

/// Slots `[start, start + duration)` stepping by `duration + buffer` while
/// the slot still ends inside the window.
///
/// Empty when a boundary is missing, when `duration <= 0` or `buffer < 0`,
/// or when `end <= start`. Windows never wrap past midnight.
pub fn generate_slots(
    start: Option<NaiveTime>,
    end: Option<NaiveTime>,
    duration_minutes: i64,
    buffer_minutes: i64,
) -> Vec<(NaiveTime, NaiveTime)> {
    let (Some(start), Some(end)) = (start, end) else {
        return Vec::new();
    };
    if duration_minutes <= 0 || buffer_minutes < 0 || end <= start {
        return Vec::new();
    }

    let duration = duration_minutes * i64::from(SECONDS_PER_MINUTE);
    let step = duration + buffer_minutes * i64::from(SECONDS_PER_MINUTE);
    let window_end = i64::from(end.num_seconds_from_midnight());

    let mut slots = Vec::new();
    let mut cursor = i64::from(start.num_seconds_from_midnight());

    while cursor + duration <= window_end {
        if let (Some(slot_start), Some(slot_end)) = (time_at(cursor), time_at(cursor + duration)) {
            slots.push((slot_start, slot_end));
        }
        cursor += step;
    }

    slots
}

fn time_at(seconds: i64) -> Option<NaiveTime> {
    let seconds = u32::try_from(seconds).ok()?;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0)
}

/// Every candidate slot of a template, session by session.
pub fn template_slots(template: &AvailabilityTemplate) -> Vec<CandidateSlot> {
    session_slots(
        &template.sessions(),
        template.slot_duration_minutes,
        template.buffer_minutes,
    )
}

pub fn session_slots(
    sessions: &[SessionWindow],
    duration_minutes: i32,
    buffer_minutes: i32,
) -> Vec<CandidateSlot> {
    sessions
        .iter()
        .flat_map(|&(session, start, end)| {
            generate_slots(start, end, duration_minutes.into(), buffer_minutes.into())
                .into_iter()
                .map(move |(start_time, end_time)| CandidateSlot {
                    session,
                    start_time,
                    end_time,
                })
        })
        .collect()
}

/// Template day index for a calendar date, Monday = 0.
pub fn day_index(date: NaiveDate) -> i32 {
    date.weekday().num_days_from_monday() as i32
}
