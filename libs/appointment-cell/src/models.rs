// libs/appointment-cell/src/models.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

/// Every slot on every doctor's calendar lasts this long.
pub const SLOT_DURATION_MINUTES: i64 = 15;

pub fn slot_duration() -> Duration {
    Duration::minutes(SLOT_DURATION_MINUTES)
}

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn slot_end(&self) -> DateTime<Utc> {
        self.appointment_date + slot_duration()
    }

    pub fn window(&self) -> SlotWindow {
        SlotWindow::standard(self.appointment_date)
    }

    pub fn is_booked(&self) -> bool {
        self.status == AppointmentStatus::Booked
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Booked,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Booked => write!(f, "booked"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Appointment fields known before the store assigns an id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub patient_id: String,
    pub doctor_id: String,
    pub appointment_date: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewAppointment {
    pub fn booked(patient_id: &str, doctor_id: &str, appointment_date: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            patient_id: patient_id.to_string(),
            doctor_id: doctor_id.to_string(),
            appointment_date,
            status: AppointmentStatus::Booked,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn window(&self) -> SlotWindow {
        SlotWindow::standard(self.appointment_date)
    }

    pub fn into_appointment(self, id: Uuid) -> Appointment {
        Appointment {
            id,
            patient_id: self.patient_id,
            doctor_id: self.doctor_id,
            appointment_date: self.appointment_date,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Half-open interval `[start, end)` in UTC.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl SlotWindow {
    pub fn new(start: DateTime<Utc>, duration: Duration) -> Self {
        Self { start, end: start + duration }
    }

    pub fn standard(start: DateTime<Utc>) -> Self {
        Self::new(start, slot_duration())
    }

    /// Touching windows (one ends exactly when the other starts) do not overlap.
    pub fn overlaps(&self, other: &SlotWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Raw booking body. Fields default to empty so that a missing field is
/// reported by booking validation rather than by the JSON extractor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub doctor_id: String,
    #[serde(default)]
    pub appointment_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentResponse {
    pub appointment_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckQuery {
    pub doctor_id: String,
    pub appointment_date: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictCheckResponse {
    pub has_conflict: bool,
    pub conflicting_appointments: Vec<Appointment>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, thiserror::Error)]
pub enum AppointmentError {
    #[error("Missing or invalid credential")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Appointment slot not available")]
    SlotUnavailable,

    #[error("Appointment store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Appointment not found")]
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 4, h, m, s).unwrap()
    }

    #[test]
    fn test_back_to_back_windows_do_not_overlap() {
        let first = SlotWindow::standard(at(10, 0, 0));
        let second = SlotWindow::standard(at(10, 15, 0));

        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn test_one_second_overlap_counts() {
        let first = SlotWindow::standard(at(10, 0, 0));
        let second = SlotWindow::standard(at(10, 14, 59));

        assert!(first.overlaps(&second));
        assert!(second.overlaps(&first));
    }

    #[test]
    fn test_identical_windows_overlap() {
        let window = SlotWindow::standard(at(9, 30, 0));
        assert!(window.overlaps(&window));
    }

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&AppointmentStatus::Booked).unwrap(), "\"booked\"");
        assert_eq!(AppointmentStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let request: BookAppointmentRequest = serde_json::from_str(r#"{"doctor_id":"d1"}"#).unwrap();
        assert_eq!(request.doctor_id, "d1");
        assert!(request.patient_id.is_empty());
        assert!(request.appointment_date.is_empty());
    }
}
