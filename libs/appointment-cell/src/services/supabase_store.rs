use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{RequestFailure, SupabaseClient};

use crate::models::{slot_duration, Appointment, NewAppointment, SlotWindow};
use crate::services::store::{AppointmentStore, StoreError};

const APPOINTMENTS_PATH: &str = "/rest/v1/appointments";

/// Appointment store backed by the PostgREST API of the document store.
///
/// Double-booking across processes is prevented by the
/// `appointments_no_double_booking` exclusion constraint (see
/// `migrations/0001_appointments.sql`); PostgREST reports a violation as
/// HTTP 409, which surfaces here as `StoreError::Conflict`.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
    service_token: String,
}

impl SupabaseAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            service_token: config.supabase_anon_key.clone(),
        }
    }

    async fn fetch(&self, path: &str) -> Result<Vec<Appointment>, StoreError> {
        let rows: Vec<Value> = self.supabase.request(
            Method::GET,
            path,
            Some(&self.service_token),
            None,
        ).await.map_err(to_store_error)?;

        rows.into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse appointments: {}", e)))
    }
}

fn timestamp(value: DateTime<Utc>) -> String {
    urlencoding::encode(&value.to_rfc3339_opts(SecondsFormat::AutoSi, true)).into_owned()
}

fn to_store_error(err: anyhow::Error) -> StoreError {
    match err.downcast_ref::<RequestFailure>() {
        Some(failure) if failure.is_conflict() => StoreError::Conflict,
        Some(failure) => StoreError::Unavailable(failure.to_string()),
        None => StoreError::Unavailable(err.to_string()),
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn find_overlapping(
        &self,
        doctor_id: &str,
        window: &SlotWindow,
    ) -> Result<Vec<Appointment>, StoreError> {
        // An existing slot [s, s + d) overlaps [start, end) iff s < end and s > start - d
        let earliest_start = window.start - slot_duration();
        let query_parts = [
            format!("doctor_id=eq.{}", urlencoding::encode(doctor_id)),
            "status=eq.booked".to_string(),
            format!("appointment_date=lt.{}", timestamp(window.end)),
            format!("appointment_date=gt.{}", timestamp(earliest_start)),
        ];

        let path = format!("{}?{}&order=appointment_date.asc", APPOINTMENTS_PATH, query_parts.join("&"));
        debug!("Looking up overlapping appointments for doctor {}", doctor_id);

        self.fetch(&path).await
    }

    async fn insert_if_absent(&self, appointment: NewAppointment) -> Result<Appointment, StoreError> {
        let appointment_data = json!({
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "appointment_date": appointment.appointment_date.to_rfc3339_opts(SecondsFormat::AutoSi, true),
            "status": appointment.status.to_string(),
            "created_at": appointment.created_at.to_rfc3339(),
            "updated_at": appointment.updated_at.to_rfc3339()
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            APPOINTMENTS_PATH,
            Some(&self.service_token),
            Some(appointment_data),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| {
            let err = to_store_error(e);
            if err == StoreError::Conflict {
                warn!("Exclusion constraint rejected booking for doctor {} at {}",
                      appointment.doctor_id, appointment.appointment_date);
            }
            err
        })?;

        let row = result.into_iter().next()
            .ok_or_else(|| StoreError::Unavailable("Insert returned no representation".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| StoreError::Unavailable(format!("Failed to parse created appointment: {}", e)))
    }

    async fn get(&self, appointment_id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let path = format!("{}?id=eq.{}", APPOINTMENTS_PATH, appointment_id);
        Ok(self.fetch(&path).await?.into_iter().next())
    }

    async fn list_for_doctor(&self, doctor_id: &str) -> Result<Vec<Appointment>, StoreError> {
        let path = format!(
            "{}?doctor_id=eq.{}&status=eq.booked&order=appointment_date.asc",
            APPOINTMENTS_PATH,
            urlencoding::encode(doctor_id)
        );
        self.fetch(&path).await
    }
}
