use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError, SlotWindow};
use crate::services::store::{bounded, AppointmentStore};

pub struct SlotConflictChecker {
    store: Arc<dyn AppointmentStore>,
    store_timeout: StdDuration,
}

impl SlotConflictChecker {
    pub fn new(store: Arc<dyn AppointmentStore>, store_timeout: StdDuration) -> Self {
        Self { store, store_timeout }
    }

    /// Whether a booked appointment for `doctor_id` overlaps
    /// `[slot_start, slot_start + slot_duration)`.
    ///
    /// A store failure is an error, never "no conflict".
    pub async fn has_conflict(
        &self,
        doctor_id: &str,
        slot_start: DateTime<Utc>,
        slot_duration: Duration,
    ) -> Result<bool, AppointmentError> {
        let window = SlotWindow::new(slot_start, slot_duration);
        let conflicting = self.conflicts(doctor_id, &window).await?;

        if !conflicting.is_empty() {
            warn!("Conflict detected for doctor {} - {} conflicting appointments",
                  doctor_id, conflicting.len());
        }

        Ok(!conflicting.is_empty())
    }

    /// Booked appointments for `doctor_id` overlapping `window`.
    pub async fn conflicts(
        &self,
        doctor_id: &str,
        window: &SlotWindow,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Checking conflicts for doctor {} from {} to {}",
               doctor_id, window.start, window.end);

        let candidates = bounded(
            self.store_timeout,
            "find_overlapping",
            self.store.find_overlapping(doctor_id, window),
        ).await?;

        // The store may over-fetch; only booked rows for this doctor that truly overlap count
        Ok(candidates
            .into_iter()
            .filter(|apt| apt.doctor_id == doctor_id)
            .filter(Appointment::is_booked)
            .filter(|apt| apt.window().overlaps(window))
            .collect())
    }
}
