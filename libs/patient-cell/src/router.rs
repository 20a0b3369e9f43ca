use std::sync::Arc;
use axum::{middleware, routing::{get, post}, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use shared_utils::session::SessionIssuer;

use crate::handlers::*;

pub fn create_patient_router(config: Arc<AppConfig>, issuer: Arc<dyn SessionIssuer>) -> Router {
    Router::new()
        .route("/", post(create_patient))
        .route("/{id}", get(get_patient).put(update_patient).delete(delete_patient))
        .layer(middleware::from_fn_with_state(issuer, auth_middleware))
        .with_state(config)
}
