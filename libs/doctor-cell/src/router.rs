use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
    middleware,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;
use shared_utils::session::SessionIssuer;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>, issuer: Arc<dyn SessionIssuer>) -> Router {
    let protected_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route(
            "/{doctor_id}",
            get(handlers::get_doctor)
                .put(handlers::update_doctor)
                .delete(handlers::delete_doctor),
        )
        .layer(middleware::from_fn_with_state(issuer, auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
