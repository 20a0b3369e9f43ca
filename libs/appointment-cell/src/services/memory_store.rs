use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Appointment, NewAppointment, SlotWindow};
use crate::services::store::{AppointmentStore, StoreError};

/// Process-local appointment store. The conditional insert holds the write
/// lock across the overlap scan and the push.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: RwLock<Vec<Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.appointments.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.appointments.read().await.is_empty()
    }

    /// Seeds a record as-is, bypassing the overlap guard.
    pub async fn insert_raw(&self, appointment: Appointment) {
        self.appointments.write().await.push(appointment);
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn find_overlapping(
        &self,
        doctor_id: &str,
        window: &SlotWindow,
    ) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;

        Ok(appointments
            .iter()
            .filter(|apt| apt.doctor_id == doctor_id && apt.window().overlaps(window))
            .cloned()
            .collect())
    }

    async fn insert_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let mut appointments = self.appointments.write().await;
        let window = appointment.window();

        let taken = appointments.iter().any(|existing| {
            existing.doctor_id == appointment.doctor_id
                && existing.is_booked()
                && existing.window().overlaps(&window)
        });

        if taken {
            debug!("Conditional insert rejected for doctor {} at {}",
                   appointment.doctor_id, appointment.appointment_date);
            return Err(StoreError::Conflict);
        }

        let created = appointment.into_appointment(Uuid::new_v4());
        appointments.push(created.clone());

        Ok(created)
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;
        Ok(appointments.iter().find(|apt| apt.id == appointment_id).cloned())
    }

    async fn list_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, StoreError> {
        let appointments = self.appointments.read().await;

        let mut booked: Vec<Appointment> = appointments
            .iter()
            .filter(|apt| apt.doctor_id == doctor_id && apt.is_booked())
            .cloned()
            .collect();
        booked.sort_by_key(|apt| apt.appointment_date);

        Ok(booked)
    }
}
