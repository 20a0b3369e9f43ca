// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, BookAppointmentRequest, BookAppointmentResponse, ConflictCheckQuery,
    ConflictCheckResponse,
};
use crate::services::AppointmentScheduler;

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::Unauthorized => AppError::Auth(err.to_string()),
            AppointmentError::InvalidRequest(msg) => AppError::BadRequest(msg),
            AppointmentError::SlotUnavailable => AppError::SlotUnavailable(err.to_string()),
            AppointmentError::StoreUnavailable(msg) => AppError::StoreUnavailable(msg),
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
        }
    }
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    user: Option<Extension<User>>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<BookAppointmentResponse>), AppError> {
    let requester = user.map(|Extension(user)| user);
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let appointment = scheduler
        .book_appointment(
            &request.patient_id,
            &request.doctor_id,
            &request.appointment_date,
            requester.as_ref(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookAppointmentResponse {
            appointment_id: appointment.id.to_string(),
            message: "Appointment booked successfully".to_string(),
        }),
    ))
}

#[axum::debug_handler]
pub async fn check_appointment_conflicts(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Query(query): Query<ConflictCheckQuery>,
) -> Result<Json<ConflictCheckResponse>, AppError> {
    let conflicting = scheduler.check_slot(&query.doctor_id, &query.appointment_date).await?;

    Ok(Json(ConflictCheckResponse {
        has_conflict: !conflicting.is_empty(),
        conflicting_appointments: conflicting,
    }))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let appointment_id = Uuid::parse_str(&appointment_id)
        .map_err(|_| AppError::BadRequest(format!("Invalid appointment id: {}", appointment_id)))?;

    let appointment = scheduler.get_appointment(appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(scheduler): State<Arc<AppointmentScheduler>>,
    Extension(user): Extension<User>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    debug!("User {} listing appointments for doctor {}", user.id, doctor_id);

    let appointments = scheduler.get_doctor_appointments(&doctor_id).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
