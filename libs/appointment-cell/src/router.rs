// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_utils::extractor::auth_middleware;
use shared_utils::session::SessionIssuer;

use crate::handlers;
use crate::services::AppointmentScheduler;

pub fn appointment_routes(scheduler: Arc<AppointmentScheduler>, issuer: Arc<dyn SessionIssuer>) -> Router {
    // Every appointment operation requires a session token
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/conflicts/check", get(handlers::check_appointment_conflicts))
        .route("/doctors/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .layer(middleware::from_fn_with_state(issuer, auth_middleware))
        .with_state(scheduler)
}
