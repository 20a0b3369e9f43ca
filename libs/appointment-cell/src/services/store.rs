use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError, NewAppointment, SlotWindow};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The conditional insert found an overlapping booked appointment.
    #[error("Overlapping booked appointment exists")]
    Conflict,
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppointmentError::StoreUnavailable(msg),
            StoreError::Conflict => AppointmentError::SlotUnavailable,
        }
    }
}

/// Persistence for appointments.
///
/// `insert_if_absent` must be atomic: it inserts only when no `Booked`
/// appointment for the same doctor overlaps the new slot, and reports
/// `StoreError::Conflict` otherwise.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Appointments for `doctor_id` whose slot may overlap `window`. Callers
    /// re-check the overlap predicate and the status themselves.
    async fn find_overlapping(
        &self,
        doctor_id: &str,
        window: &SlotWindow,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn insert_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, StoreError>;

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError>;

    async fn list_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, StoreError>;
}

/// Runs a store call under the caller-supplied timeout. Expiry is reported as
/// `StoreUnavailable` so the caller can retry the whole operation.
pub(crate) async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, AppointmentError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(AppointmentError::from),
        Err(_) => {
            warn!("Store call '{}' timed out after {:?}", operation, limit);
            Err(AppointmentError::StoreUnavailable(format!(
                "{} timed out after {} ms",
                operation,
                limit.as_millis()
            )))
        }
    }
}
