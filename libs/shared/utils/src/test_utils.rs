use std::sync::Arc;
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

use crate::jwt::{issue_token, TokenSubject};
use crate::session::{JwtSessionIssuer, SessionIssuer};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: impl Into<String>) -> Self {
        Self {
            supabase_url: url.into(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            jwt_secret: self.jwt_secret.clone(),
            store_timeout_ms: 1000,
            ..AppConfig::default()
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }

    pub fn session_issuer(&self) -> Arc<dyn SessionIssuer> {
        Arc::new(JwtSessionIssuer::new(self.jwt_secret.clone(), Duration::hours(24)))
    }
}

pub struct TestUser {
    pub id: String,
    pub phone: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            phone: "+919876543210".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(phone: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            phone: phone.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(phone: &str) -> Self {
        Self::new(phone, "doctor")
    }

    pub fn patient(phone: &str) -> Self {
        Self::new(phone, "patient")
    }

    pub fn admin(phone: &str) -> Self {
        Self::new(phone, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            phone: Some(self.phone.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let subject = TokenSubject {
            subject: &user.id,
            role: &user.role,
            phone: Some(&user.phone),
        };

        match issue_token(&subject, secret, Duration::hours(exp_hours.unwrap_or(24))) {
            Ok(token) => token,
            Err(e) => panic!("failed to sign test token: {}", e),
        }
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, phone_number: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": full_name,
            "phone_number": phone_number,
            "email": null,
            "date_of_birth": "1990-01-01",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_response(doctor_id: &str, full_name: &str, specialty: &str) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "full_name": full_name,
            "specialty": specialty,
            "phone_number": null,
            "email": "doctor@example.com",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_response(patient_id: &str, doctor_id: &str, appointment_date: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": appointment_date,
            "status": "booked",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "message": message,
            "code": code
        })
    }
}
