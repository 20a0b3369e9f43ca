use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use tower::ServiceExt;
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};
use assert_matches::assert_matches;

use patient_cell::router::create_patient_router;
use patient_cell::models::{CreatePatientRequest, PatientError};
use patient_cell::services::PatientService;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockSupabaseResponses};

fn create_test_app(config: &TestConfig) -> Router {
    create_patient_router(config.to_arc(), config.session_issuer())
}

fn bearer(config: &TestConfig) -> String {
    let user = TestUser::admin("+15550000000");
    format!("Bearer {}", JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1)))
}

#[tokio::test]
async fn test_get_patient_success() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("id", "eq.patient-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-1", "+919876543210", "Asha Rao")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/patient-1")
        .header("authorization", bearer(&config))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_response: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json_response["id"], "patient-1");
    assert_eq!(json_response["full_name"], "Asha Rao");
}

#[tokio::test]
async fn test_get_patient_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("GET")
        .uri("/missing")
        .header("authorization", bearer(&config))
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_patient_routes_require_bearer() {
    let config = TestConfig::default();

    let request = Request::builder()
        .method("GET")
        .uri("/patient-1")
        .body(Body::empty())
        .unwrap();

    let response = create_test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_patient_rejects_duplicate_phone() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .and(query_param("phone_number", "eq.+919876543210"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-1", "+919876543210", "Asha Rao")
        ])))
        .mount(&mock_server)
        .await;

    let service = PatientService::new(&config.to_app_config());
    let result = service.create_patient(CreatePatientRequest {
        full_name: "Someone Else".to_string(),
        phone_number: "+919876543210".to_string(),
        email: None,
        date_of_birth: None,
    }, "token").await;

    assert_matches!(result, Err(PatientError::PhoneAlreadyExists { .. }));
}

#[tokio::test]
async fn test_create_patient_returns_created_record() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::patient_response("patient-9", "+919000000001", "Ravi Kumar")
        ])))
        .mount(&mock_server)
        .await;

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("authorization", bearer(&config))
        .header("content-type", "application/json")
        .body(Body::from(json!({
            "full_name": "Ravi Kumar",
            "phone_number": "+919000000001"
        }).to_string()))
        .unwrap();

    let response = create_test_app(&config).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_patient_exists_maps_store_failure() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_supabase_url(mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let service = PatientService::new(&config.to_app_config());

    assert_matches!(service.patient_exists("patient-1", "token").await, Err(PatientError::DatabaseError(_)));
}
