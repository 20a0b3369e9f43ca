use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Patient, CreatePatientRequest, UpdatePatientRequest, PatientError};

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Creating new patient profile for: {}", request.phone_number);

        if request.full_name.trim().is_empty() {
            return Err(PatientError::ValidationError("full_name is required".to_string()));
        }
        if request.phone_number.trim().is_empty() {
            return Err(PatientError::ValidationError("phone_number is required".to_string()));
        }

        if self.find_by_phone(&request.phone_number, auth_token).await?.is_some() {
            return Err(PatientError::PhoneAlreadyExists { phone_number: request.phone_number });
        }

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "full_name": request.full_name,
            "phone_number": request.phone_number,
            "email": request.email,
            "date_of_birth": request.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/patients",
            Some(auth_token),
            Some(patient_data),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        let patient = first_patient(result)?.ok_or_else(|| {
            PatientError::DatabaseError("Failed to create patient profile".to_string())
        })?;
        debug!("Patient profile created successfully with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Fetching patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        first_patient(result)?.ok_or(PatientError::NotFound)
    }

    pub async fn find_by_phone(
        &self,
        phone_number: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>, PatientError> {
        let path = format!("/rest/v1/patients?phone_number=eq.{}", urlencoding::encode(phone_number));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        first_patient(result)
    }

    pub async fn patient_exists(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<bool, PatientError> {
        match self.get_patient(patient_id, auth_token).await {
            Ok(_) => Ok(true),
            Err(PatientError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient, PatientError> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth.format("%Y-%m-%d").to_string()));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        first_patient(result)?.ok_or(PatientError::NotFound)
    }

    pub async fn delete_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<(), PatientError> {
        debug!("Deleting patient profile: {}", patient_id);

        let path = format!("/rest/v1/patients?id=eq.{}", urlencoding::encode(patient_id));
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| PatientError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(PatientError::NotFound);
        }

        Ok(())
    }
}

fn first_patient(rows: Vec<Value>) -> Result<Option<Patient>, PatientError> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| PatientError::DatabaseError(format!("Failed to parse patient: {}", e)))
}
