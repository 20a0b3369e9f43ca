use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::router::{auth_routes, AuthState};
use auth_cell::services::{InMemoryOtpStore, OtpService, WhatsAppSender};
use shared_config::AppConfig;
use shared_utils::session::JwtSessionIssuer;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

const PHONE: &str = "+919876543210";

fn whatsapp_config(server: &MockServer) -> AppConfig {
    AppConfig {
        whatsapp_api_url: server.uri(),
        whatsapp_phone_number_id: "1234567890".to_string(),
        whatsapp_access_token: "wa-token".to_string(),
        ..TestConfig::default().to_app_config()
    }
}

fn create_test_app(config: &AppConfig) -> Router {
    let issuer = JwtSessionIssuer::from_config(config);
    let otp = OtpService::new(
        Arc::new(InMemoryOtpStore::new()),
        Arc::new(WhatsAppSender::new(config)),
        issuer.clone(),
        config,
    );
    auth_routes(AuthState { otp: Arc::new(otp), issuer: Arc::new(issuer) })
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Pulls the code out of the message body captured by the mock server.
async fn sent_code(server: &MockServer) -> String {
    let requests = server.received_requests().await.unwrap();
    let payload: Value = serde_json::from_slice(&requests.last().unwrap().body).unwrap();
    payload["text"]["body"]
        .as_str()
        .unwrap()
        .trim_start_matches("Your OTP is ")
        .to_string()
}

#[tokio::test]
async fn test_send_and_verify_otp_flow() {
    let mock_server = MockServer::start().await;
    let config = whatsapp_config(&mock_server);

    Mock::given(method("POST"))
        .and(path("/1234567890/messages"))
        .and(header("authorization", "Bearer wa-token"))
        .and(body_partial_json(json!({
            "messaging_product": "whatsapp",
            "to": "919876543210",
            "type": "text"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.1" }] })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_test_app(&config);

    let response = app.clone()
        .oneshot(post_json("/send-otp", json!({ "phone_number": PHONE })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["expires_in_seconds"], 300);
    assert!(body.get("otp").is_none());

    let code = sent_code(&mock_server).await;

    let response = app.clone()
        .oneshot(post_json("/verify-otp", json!({ "phone_number": PHONE, "otp": code })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let session = json_body(response).await;
    assert_eq!(session["token_type"], "bearer");
    let token = session["access_token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .method("POST")
        .uri("/validate")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let validated = json_body(response).await;
    assert_eq!(validated["valid"], true);
    assert_eq!(validated["user_id"], PHONE);
    assert_eq!(validated["role"], "patient");
}

#[tokio::test]
async fn test_send_otp_provider_failure_is_bad_gateway() {
    let mock_server = MockServer::start().await;
    let config = whatsapp_config(&mock_server);

    Mock::given(method("POST"))
        .and(path("/1234567890/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": { "message": "bad token" } })))
        .mount(&mock_server)
        .await;

    let response = create_test_app(&config)
        .oneshot(post_json("/send-otp", json!({ "phone_number": PHONE })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(json_body(response).await["kind"], "external_service");
}

#[tokio::test]
async fn test_send_otp_rejects_invalid_phone() {
    let mock_server = MockServer::start().await;
    let config = whatsapp_config(&mock_server);

    let response = create_test_app(&config)
        .oneshot(post_json("/send-otp", json!({ "phone_number": "12345" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(mock_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_verify_without_pending_code_is_unauthorized() {
    let mock_server = MockServer::start().await;
    let config = whatsapp_config(&mock_server);

    let response = create_test_app(&config)
        .oneshot(post_json("/verify-otp", json!({ "phone_number": PHONE, "otp": "123456" })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await["kind"], "unauthorized");
}

#[tokio::test]
async fn test_validate_rejects_bad_tokens() {
    let mock_server = MockServer::start().await;
    let config = whatsapp_config(&mock_server);
    let user = TestUser::patient(PHONE);

    for authorization in [
        None,
        Some(format!("Bearer {}", JwtTestUtils::create_expired_token(&user, &config.jwt_secret))),
        Some(format!("Bearer {}", JwtTestUtils::create_invalid_signature_token(&user))),
        Some(format!("Bearer {}", JwtTestUtils::create_malformed_token())),
    ] {
        let mut builder = Request::builder().method("POST").uri("/validate");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }

        let response = create_test_app(&config)
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
