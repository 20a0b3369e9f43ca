use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOtpRequest {
    pub phone_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendOtpResponse {
    pub status: String,
    pub message: String,
    pub expires_in_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    pub otp: String,
}

/// A pending one-time code and the number of verification attempts made against it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub code: String,
    pub attempts: u32,
}

impl OtpRecord {
    pub fn fresh(code: impl Into<String>) -> Self {
        Self { code: code.into(), attempts: 0 }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OtpError {
    #[error("Invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    #[error("Incorrect OTP")]
    InvalidCode,

    #[error("OTP expired or not requested")]
    Expired,

    #[error("Too many incorrect attempts; request a new OTP")]
    TooManyAttempts,

    #[error("OTP storage error: {0}")]
    Storage(String),

    #[error("Failed to deliver OTP: {0}")]
    Delivery(String),

    #[error("Failed to issue session: {0}")]
    Session(String),
}
