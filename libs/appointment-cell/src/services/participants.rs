use async_trait::async_trait;

use shared_config::AppConfig;
use doctor_cell::services::DoctorService;
use patient_cell::services::PatientService;

use crate::models::AppointmentError;

/// Read-only view of the identity records a booking refers to.
#[async_trait]
pub trait ParticipantDirectory: Send + Sync {
    async fn patient_exists(&self, patient_id: &str) -> Result<bool, AppointmentError>;

    async fn doctor_exists(&self, doctor_id: &str) -> Result<bool, AppointmentError>;
}

pub struct SupabaseParticipantDirectory {
    patients: PatientService,
    doctors: DoctorService,
    service_token: String,
}

impl SupabaseParticipantDirectory {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            patients: PatientService::new(config),
            doctors: DoctorService::new(config),
            service_token: config.supabase_anon_key.clone(),
        }
    }
}

#[async_trait]
impl ParticipantDirectory for SupabaseParticipantDirectory {
    async fn patient_exists(&self, patient_id: &str) -> Result<bool, AppointmentError> {
        self.patients
            .patient_exists(patient_id, &self.service_token)
            .await
            .map_err(|e| AppointmentError::StoreUnavailable(e.to_string()))
    }

    async fn doctor_exists(&self, doctor_id: &str) -> Result<bool, AppointmentError> {
        self.doctors
            .doctor_exists(doctor_id, &self.service_token)
            .await
            .map_err(|e| AppointmentError::StoreUnavailable(e.to_string()))
    }
}
