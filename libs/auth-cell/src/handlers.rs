use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use tracing::debug;

use shared_models::auth::{SessionToken, TokenResponse};
use shared_models::error::AppError;
use shared_utils::extractor::extract_bearer_token;

use crate::models::{OtpError, SendOtpRequest, SendOtpResponse, VerifyOtpRequest};
use crate::router::AuthState;

impl From<OtpError> for AppError {
    fn from(err: OtpError) -> Self {
        match err {
            OtpError::InvalidPhoneNumber(_) => AppError::BadRequest(err.to_string()),
            OtpError::InvalidCode | OtpError::Expired | OtpError::TooManyAttempts => {
                AppError::Auth(err.to_string())
            }
            OtpError::Storage(msg) => AppError::StoreUnavailable(msg),
            OtpError::Delivery(msg) => AppError::ExternalService(msg),
            OtpError::Session(msg) => AppError::Internal(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn send_otp(
    State(state): State<AuthState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<Json<SendOtpResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let expires_in_seconds = state.otp.send_otp(&request.phone_number).await?;

    Ok(Json(SendOtpResponse {
        status: "success".to_string(),
        message: "OTP sent successfully".to_string(),
        expires_in_seconds,
    }))
}

#[axum::debug_handler]
pub async fn verify_otp(
    State(state): State<AuthState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<Json<SessionToken>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let session = state.otp.verify_otp(&request.phone_number, &request.otp).await?;

    Ok(Json(session))
}

#[axum::debug_handler]
pub async fn validate_token(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;

    let user = state.issuer
        .verify(&token)
        .ok_or_else(|| AppError::Auth("Invalid or expired credential".to_string()))?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        role: user.role,
    }))
}
