use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{TimeZone, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, NewAppointment, SlotWindow};
use appointment_cell::services::{
    AppointmentScheduler, AppointmentStore, StoreError, SupabaseAppointmentStore,
};
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn store_for(server: &MockServer) -> SupabaseAppointmentStore {
    SupabaseAppointmentStore::new(&TestConfig::with_supabase_url(server.uri()).to_app_config())
}

#[tokio::test]
async fn test_find_overlapping_filters_by_doctor_and_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", "eq.d1"))
        .and(query_param("status", "eq.booked"))
        .and(header("apikey", "test-anon-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::appointment_response("p1", "d1", "2030-01-01T10:00:00Z")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let window = SlotWindow::standard(Utc.with_ymd_and_hms(2030, 1, 1, 10, 5, 0).unwrap());

    let found = store.find_overlapping("d1", &window).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].doctor_id, "d1");
}

#[tokio::test]
async fn test_insert_returns_created_row() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(header("Prefer", "return=representation"))
        .and(body_partial_json(json!({ "doctor_id": "d1", "status": "booked" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response("p1", "d1", "2030-01-01T10:00:00Z")
        ])))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();

    let created = store.insert_if_absent(NewAppointment::booked("p1", "d1", start)).await.unwrap();
    assert_eq!(created.appointment_date, start);
    assert!(created.is_booked());
}

#[tokio::test]
async fn test_sub_millisecond_start_is_sent_unchanged() {
    let mock_server = MockServer::start().await;
    let start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap() + chrono::Duration::microseconds(123);

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("appointment_date", "lt.2030-01-01T10:15:00.000123Z"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({ "appointment_date": "2030-01-01T10:00:00.000123Z" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::appointment_response("p1", "d1", "2030-01-01T10:00:00.000123Z")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);

    let found = store.find_overlapping("d1", &SlotWindow::standard(start)).await.unwrap();
    assert!(found.is_empty());

    let created = store.insert_if_absent(NewAppointment::booked("p1", "d1", start)).await.unwrap();
    assert_eq!(created.appointment_date, start);
}

#[tokio::test]
async fn test_exclusion_violation_maps_to_conflict() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(MockSupabaseResponses::error_response(
            "conflicting key value violates exclusion constraint \"appointments_no_double_booking\"",
            "23P01",
        )))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);
    let start = Utc.with_ymd_and_hms(2030, 1, 1, 10, 0, 0).unwrap();

    let result = store.insert_if_absent(NewAppointment::booked("p1", "d1", start)).await;
    assert_matches!(result, Err(StoreError::Conflict));
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let store = store_for(&mock_server);

    assert_matches!(store.list_for_doctor("d1").await, Err(StoreError::Unavailable(_)));
}

#[tokio::test]
async fn test_scheduler_reports_slot_unavailable_when_store_rejects_insert() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({ "code": "23P01" })))
        .mount(&mock_server)
        .await;

    let scheduler = AppointmentScheduler::new(Arc::new(store_for(&mock_server)), Duration::from_secs(1));
    let user = TestUser::patient("+919876543210").to_user();

    let result = scheduler.book_appointment("p1", "d1", "2030-01-01T10:00:00Z", Some(&user)).await;
    assert_matches!(result, Err(AppointmentError::SlotUnavailable));
}

#[tokio::test]
async fn test_slow_store_surfaces_as_unavailable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200)
            .set_body_json(json!([]))
            .set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    // The HTTP client times out after one second
    let scheduler = AppointmentScheduler::new(Arc::new(store_for(&mock_server)), Duration::from_secs(2));
    let user = TestUser::patient("+919876543210").to_user();

    let result = scheduler.book_appointment("p1", "d1", "2030-01-01T10:00:00Z", Some(&user)).await;
    assert_matches!(result, Err(AppointmentError::StoreUnavailable(_)));
}
