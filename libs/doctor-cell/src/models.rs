// libs/doctor-cell/src/models.rs
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directory row for a doctor. This cell only reads it; profile editing
/// belongs to an upstream service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub is_approved: bool,
    pub is_blocked: bool,
    pub consultation_fee: f64,
    #[serde(default)]
    pub weekly_availability: Vec<AvailabilityWindow>,
}

impl DoctorProfile {
    /// A doctor accepts bookings only while approved and not blocked.
    pub fn is_bookable(&self) -> bool {
        self.is_approved && !self.is_blocked
    }

    /// Template entry for a weekday index (0 = Sunday .. 6 = Saturday).
    /// At most one entry per weekday is consulted; first match wins.
    pub fn window_for_day(&self, day_of_week: u8) -> Option<&AvailabilityWindow> {
        self.weekly_availability
            .iter()
            .find(|window| window.day_of_week == day_of_week)
    }
}

/// One weekly-template entry embedded in the doctor row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_available: bool,
}

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(String),
}
