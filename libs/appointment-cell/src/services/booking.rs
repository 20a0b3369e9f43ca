// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_config::{AppConfig, AppointmentStoreBackend};
use shared_models::auth::User;

use crate::models::{slot_duration, Appointment, AppointmentError, NewAppointment, SlotWindow};
use crate::services::conflict::SlotConflictChecker;
use crate::services::lock::DoctorLocks;
use crate::services::memory_store::InMemoryAppointmentStore;
use crate::services::participants::{ParticipantDirectory, SupabaseParticipantDirectory};
use crate::services::store::{bounded, AppointmentStore};
use crate::services::supabase_store::SupabaseAppointmentStore;

/// Books appointments so that no two booked slots of one doctor overlap.
///
/// The conflict check and the insert for a doctor run under that doctor's
/// lock, and the insert itself is conditional at the store, so concurrent
/// bookings of overlapping windows yield exactly one success.
pub struct AppointmentScheduler {
    store: Arc<dyn AppointmentStore>,
    conflict_checker: SlotConflictChecker,
    locks: DoctorLocks,
    directory: Option<Arc<dyn ParticipantDirectory>>,
    store_timeout: Duration,
}

impl AppointmentScheduler {
    pub fn new(store: Arc<dyn AppointmentStore>, store_timeout: Duration) -> Self {
        Self {
            conflict_checker: SlotConflictChecker::new(Arc::clone(&store), store_timeout),
            store,
            locks: DoctorLocks::new(),
            directory: None,
            store_timeout,
        }
    }

    /// Requires patient and doctor records to exist before a slot is booked.
    pub fn with_directory(mut self, directory: Arc<dyn ParticipantDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let store: Arc<dyn AppointmentStore> = match config.appointment_store {
            AppointmentStoreBackend::Supabase => {
                info!("Using Supabase appointment store");
                Arc::new(SupabaseAppointmentStore::new(config))
            }
            AppointmentStoreBackend::Memory => {
                warn!("Using in-memory appointment store; bookings will not survive a restart");
                Arc::new(InMemoryAppointmentStore::new())
            }
        };

        let scheduler = Self::new(store, config.store_timeout());

        if config.verify_participants {
            info!("Participant existence checks enabled for bookings");
            scheduler.with_directory(Arc::new(SupabaseParticipantDirectory::new(config)))
        } else {
            scheduler
        }
    }

    #[instrument(skip(self, requester))]
    pub async fn book_appointment(
        &self,
        patient_id: &str,
        doctor_id: &str,
        appointment_date: &str,
        requester: Option<&User>,
    ) -> Result<Appointment, AppointmentError> {
        // **Step 1: Caller identity**
        let requester = requester.ok_or(AppointmentError::Unauthorized)?;

        // **Step 2: Request shape**
        let patient_id = required_id("patient_id", patient_id)?;
        let doctor_id = required_id("doctor_id", doctor_id)?;
        let slot_start = parse_appointment_date(appointment_date)?;

        info!("User {} booking appointment for patient {} with doctor {} at {}",
              requester.id, patient_id, doctor_id, slot_start);

        // **Step 2b: Referenced records exist**
        if let Some(directory) = &self.directory {
            self.verify_participants(directory.as_ref(), patient_id, doctor_id).await?;
        }

        // **Steps 3-4: Check and insert under the doctor's lock**
        let _guard = tokio::time::timeout(self.store_timeout, self.locks.acquire(doctor_id))
            .await
            .map_err(|_| {
                warn!("Timed out waiting for schedule lock of doctor {}", doctor_id);
                AppointmentError::StoreUnavailable("Timed out waiting for doctor schedule".to_string())
            })?;

        if self.conflict_checker.has_conflict(doctor_id, slot_start, slot_duration()).await? {
            return Err(AppointmentError::SlotUnavailable);
        }

        let appointment = bounded(
            self.store_timeout,
            "insert_if_absent",
            self.store.insert_if_absent(NewAppointment::booked(patient_id, doctor_id, slot_start)),
        ).await?;

        info!("Appointment {} booked for doctor {} at {}",
              appointment.id, doctor_id, appointment.appointment_date);
        Ok(appointment)
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        bounded(self.store_timeout, "get", self.store.get(appointment_id))
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    pub async fn get_doctor_appointments(&self, doctor_id: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor_id = required_id("doctor_id", doctor_id)?;
        bounded(self.store_timeout, "list_for_doctor", self.store.list_for_doctor(doctor_id)).await
    }

    pub async fn check_slot(&self, doctor_id: &str, appointment_date: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let doctor_id = required_id("doctor_id", doctor_id)?;
        let slot_start = parse_appointment_date(appointment_date)?;
        self.conflict_checker.conflicts(doctor_id, &SlotWindow::standard(slot_start)).await
    }

    async fn verify_participants(
        &self,
        directory: &dyn ParticipantDirectory,
        patient_id: &str,
        doctor_id: &str,
    ) -> Result<(), AppointmentError> {
        let lookups = async {
            let patient = directory.patient_exists(patient_id).await?;
            let doctor = directory.doctor_exists(doctor_id).await?;
            Ok::<_, AppointmentError>((patient, doctor))
        };

        let (patient_exists, doctor_exists) = tokio::time::timeout(self.store_timeout, lookups)
            .await
            .map_err(|_| AppointmentError::StoreUnavailable("Participant lookup timed out".to_string()))??;

        if !patient_exists {
            return Err(AppointmentError::InvalidRequest(format!("Patient {} not found", patient_id)));
        }
        if !doctor_exists {
            return Err(AppointmentError::InvalidRequest(format!("Doctor {} not found", doctor_id)));
        }

        debug!("Verified patient {} and doctor {}", patient_id, doctor_id);
        Ok(())
    }
}

fn required_id<'a>(field: &str, value: &'a str) -> Result<&'a str, AppointmentError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppointmentError::InvalidRequest(format!("{} is required", field)));
    }
    Ok(trimmed)
}

/// Parses an ISO-8601 timestamp carrying an explicit offset and normalizes it to UTC.
pub fn parse_appointment_date(raw: &str) -> Result<DateTime<Utc>, AppointmentError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppointmentError::InvalidRequest("appointment_date is required".to_string()));
    }

    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| AppointmentError::InvalidRequest(format!(
            "appointment_date must be an ISO-8601 timestamp with offset: {}", e
        )))
}
