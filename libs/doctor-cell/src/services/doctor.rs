use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{Doctor, CreateDoctorRequest, UpdateDoctorRequest, DoctorError};

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Create a new doctor profile
    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Creating new doctor profile for: {}", request.full_name);

        if request.full_name.trim().is_empty() {
            return Err(DoctorError::ValidationError("full_name is required".to_string()));
        }
        if request.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError("specialty is required".to_string()));
        }

        let now = Utc::now().to_rfc3339();
        let doctor_data = json!({
            "full_name": request.full_name,
            "specialty": request.specialty,
            "phone_number": request.phone_number,
            "email": request.email,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctors",
            Some(auth_token),
            Some(doctor_data),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        let doctor = first_doctor(result)?
            .ok_or_else(|| DoctorError::DatabaseError("Failed to create doctor profile".to_string()))?;
        debug!("Doctor profile created successfully with ID: {}", doctor.id);

        Ok(doctor)
    }

    /// Get doctor by ID
    pub async fn get_doctor(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!("/rest/v1/doctors?id=eq.{}", urlencoding::encode(doctor_id));
        let result: Vec<Value> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        first_doctor(result)?.ok_or(DoctorError::NotFound)
    }

    pub async fn doctor_exists(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<bool, DoctorError> {
        match self.get_doctor(doctor_id, auth_token).await {
            Ok(_) => Ok(true),
            Err(DoctorError::NotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Update doctor profile
    pub async fn update_doctor(
        &self,
        doctor_id: &str,
        request: UpdateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor, DoctorError> {
        debug!("Updating doctor profile: {}", doctor_id);

        let mut update_data = serde_json::Map::new();

        if let Some(full_name) = request.full_name {
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(specialty) = request.specialty {
            update_data.insert("specialty".to_string(), json!(specialty));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(email) = request.email {
            update_data.insert("email".to_string(), json!(email));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/doctors?id=eq.{}", urlencoding::encode(doctor_id));
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::PATCH,
            &path,
            Some(auth_token),
            Some(Value::Object(update_data)),
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        first_doctor(result)?.ok_or(DoctorError::NotFound)
    }

    /// Delete doctor profile. Refused while the doctor still has booked appointments.
    pub async fn delete_doctor(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        debug!("Deleting doctor profile: {}", doctor_id);

        let appointments_path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=eq.booked&limit=1",
            urlencoding::encode(doctor_id)
        );
        let booked: Vec<Value> = self.supabase.request(
            Method::GET,
            &appointments_path,
            Some(auth_token),
            None,
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if !booked.is_empty() {
            warn!("Refusing to delete doctor {} with booked appointments", doctor_id);
            return Err(DoctorError::ValidationError(
                "Cannot delete doctor with booked appointments".to_string()
            ));
        }

        let path = format!("/rest/v1/doctors?id=eq.{}", urlencoding::encode(doctor_id));
        let result: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::return_representation()),
        ).await.map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        Ok(())
    }
}

fn first_doctor(rows: Vec<Value>) -> Result<Option<Doctor>, DoctorError> {
    rows.into_iter()
        .next()
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| DoctorError::DatabaseError(format!("Failed to parse doctor: {}", e)))
}
