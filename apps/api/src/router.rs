use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use appointment_cell::services::AppointmentScheduler;
use auth_cell::router::{auth_routes, AuthState};
use doctor_cell::router::doctor_routes;
use patient_cell::router::create_patient_router;
use shared_config::AppConfig;
use shared_utils::session::{JwtSessionIssuer, SessionIssuer};

pub async fn create_router(config: Arc<AppConfig>) -> Router {
    let issuer: Arc<dyn SessionIssuer> = Arc::new(JwtSessionIssuer::from_config(&config));
    let auth_state = AuthState::from_config(&config).await;
    let scheduler = Arc::new(AppointmentScheduler::from_config(&config));

    Router::new()
        .route("/", get(|| async { "Clinic API is running!" }))
        .nest("/auth", auth_routes(auth_state))
        .nest("/patients", create_patient_router(config.clone(), issuer.clone()))
        .nest("/doctors", doctor_routes(config.clone(), issuer.clone()))
        .nest("/appointments", appointment_routes(scheduler, issuer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;

    fn memory_config() -> Arc<AppConfig> {
        Arc::new(AppConfig {
            jwt_secret: "router-test-secret".to_string(),
            ..AppConfig::default()
        })
    }

    #[tokio::test]
    async fn test_liveness_route() {
        let app = create_router(memory_config()).await;

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_appointments_require_session() {
        let app = create_router(memory_config()).await;

        let request = Request::builder()
            .method("POST")
            .uri("/appointments")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"patient_id":"p1","doctor_id":"d1","appointment_date":"2030-01-01T10:00:00Z"}"#))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
