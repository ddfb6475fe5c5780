// libs/doctor-cell/src/services/availability.rs
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime};
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};

use crate::models::{DoctorError, DoctorProfile};
use crate::services::doctor::DoctorDirectoryService;

/// Fixed slot step for every doctor.
pub const SLOT_INTERVAL_MINUTES: i64 = 30;

/// Generate the candidate slot labels for one availability window. A slot
/// is emitted only if the full interval fits before `end`; a reversed or
/// zero-length window yields nothing. The day-carry from
/// `overflowing_add_signed` ends the loop at midnight, so the cursor can
/// never wrap below `end` and spin forever.
pub fn slot_grid(start: NaiveTime, end: NaiveTime) -> Vec<String> {
    let step = Duration::minutes(SLOT_INTERVAL_MINUTES);
    let mut labels = Vec::new();
    let mut cursor = start;

    loop {
        let (slot_end, day_carry) = cursor.overflowing_add_signed(step);
        if day_carry != 0 || slot_end > end {
            break;
        }
        labels.push(cursor.format("%H:%M").to_string());
        cursor = slot_end;
    }

    labels
}

/// Weekday index used by the stored template: 0 = Sunday .. 6 = Saturday.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Deserialize)]
struct BookedSlot {
    slot_time: String,
}

pub struct SlotResolverService {
    supabase: Arc<SupabaseClient>,
    directory: DoctorDirectoryService,
}

impl SlotResolverService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let directory = DoctorDirectoryService::with_client(Arc::clone(&supabase));
        Self { supabase, directory }
    }

    /// Resolve the bookable "HH:MM" labels for a doctor on a date: the
    /// weekly-template grid minus the labels already taken by non-cancelled
    /// appointments. An absent or switched-off template entry is a valid
    /// empty result, not an error. Read-only; two callers may both see a
    /// slot as free, and the booking insert settles that race downstream.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<String>, DoctorError> {
        debug!("Resolving available slots for doctor {} on {}", doctor_id, date);

        let doctor = self.directory.get_doctor(doctor_id, auth_token).await?;

        let candidates = match template_grid(&doctor, date) {
            Some(labels) => labels,
            None => return Ok(vec![]),
        };

        let booked = self.booked_labels(doctor_id, date, auth_token).await?;

        let slots: Vec<String> = candidates
            .into_iter()
            .filter(|label| !booked.contains(label))
            .collect();

        debug!("Found {} available slots", slots.len());
        Ok(slots)
    }

    /// Slot labels of non-cancelled appointments for (doctor, date).
    async fn booked_labels(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<HashSet<String>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&appointment_date=eq.{}&status=neq.cancelled&select=slot_time",
            doctor_id, date
        );

        let result: Vec<BookedSlot> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e: DbError| DoctorError::Database(e.to_string()))?;

        Ok(result.into_iter().map(|row| row.slot_time).collect())
    }
}

/// Candidate grid for the doctor's template on this date, if any.
fn template_grid(doctor: &DoctorProfile, date: NaiveDate) -> Option<Vec<String>> {
    let window = doctor.window_for_day(weekday_index(date))?;
    if !window.is_available {
        return None;
    }
    Some(slot_grid(window.start_time, window.end_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn one_hour_window_yields_two_slots() {
        assert_eq!(slot_grid(t(9, 0), t(10, 0)), vec!["09:00", "09:30"]);
    }

    #[test]
    fn partial_trailing_interval_is_dropped() {
        // 09:30-10:00 does not fit inside 09:00-09:50.
        assert_eq!(slot_grid(t(9, 0), t(9, 50)), vec!["09:00"]);
    }

    #[test]
    fn labels_are_zero_padded() {
        assert_eq!(slot_grid(t(8, 0), t(9, 0)), vec!["08:00", "08:30"]);
    }

    #[test]
    fn equal_bounds_yield_nothing() {
        assert!(slot_grid(t(14, 0), t(14, 0)).is_empty());
    }

    #[test]
    fn reversed_bounds_yield_nothing() {
        assert!(slot_grid(t(17, 0), t(9, 0)).is_empty());
    }

    #[test]
    fn grid_terminates_at_midnight() {
        assert_eq!(slot_grid(t(23, 0), t(23, 59)), vec!["23:00"]);
    }

    #[test]
    fn slot_count_matches_window_length() {
        let cases = [
            (t(9, 0), t(12, 0), 6),
            (t(10, 15), t(11, 45), 3),
            (t(9, 0), t(9, 29), 0),
        ];
        for (start, end, expected) in cases {
            let grid = slot_grid(start, end);
            assert_eq!(grid.len(), expected, "window {}..{}", start, end);
            for label in &grid {
                let slot = NaiveTime::parse_from_str(label, "%H:%M").unwrap();
                assert!(slot >= start && slot < end);
            }
        }
    }

    #[test]
    fn weekday_index_starts_at_sunday() {
        // 2026-08-09 is a Sunday.
        let sunday = NaiveDate::from_ymd_opt(2026, 8, 9).unwrap();
        assert_eq!(weekday_index(sunday), 0);
        assert_eq!(weekday_index(sunday.succ_opt().unwrap()), 1);
    }
}
