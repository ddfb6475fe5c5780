use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::models::DoctorError;
use doctor_cell::services::availability::SlotResolverService;
use shared_utils::test_utils::{MockRows, TestConfig};

const TOKEN: &str = "test-token";

// 2026-08-10 is a Monday.
fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 8, 10).unwrap()
}

async fn mock_doctor(server: &MockServer, doctor_id: Uuid, windows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockRows::doctor_row(doctor_id, 500.0, windows)
        ])))
        .mount(server)
        .await;
}

async fn mock_booked(server: &MockServer, doctor_id: Uuid, rows: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("status", "neq.cancelled"))
        .and(query_param("select", "slot_time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(rows))
        .mount(server)
        .await;
}

fn resolver_for(server: &MockServer) -> SlotResolverService {
    let config = TestConfig::with_urls(&server.uri(), "http://unused").to_app_config();
    SlotResolverService::new(&config)
}

#[tokio::test]
async fn monday_window_with_no_bookings_yields_full_grid() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mock_doctor(
        &server,
        doctor_id,
        json!([MockRows::availability_window(1, "09:00:00", "10:00:00")]),
    )
    .await;
    mock_booked(&server, doctor_id, json!([])).await;

    let slots = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await
        .unwrap();

    assert_eq!(slots, vec!["09:00", "09:30"]);
}

#[tokio::test]
async fn booked_slot_is_excluded() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mock_doctor(
        &server,
        doctor_id,
        json!([MockRows::availability_window(1, "09:00:00", "10:00:00")]),
    )
    .await;
    mock_booked(&server, doctor_id, json!([{ "slot_time": "09:00" }])).await;

    let slots = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await
        .unwrap();

    assert_eq!(slots, vec!["09:30"]);
}

#[tokio::test]
async fn cancelled_bookings_do_not_block_slots() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mock_doctor(
        &server,
        doctor_id,
        json!([MockRows::availability_window(1, "09:00:00", "10:00:00")]),
    )
    .await;
    // The status=neq.cancelled filter keeps cancelled rows out of the
    // response, so the booked set the resolver sees is empty.
    mock_booked(&server, doctor_id, json!([])).await;

    let slots = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await
        .unwrap();

    assert_eq!(slots, vec!["09:00", "09:30"]);
}

#[tokio::test]
async fn day_without_template_entry_is_empty() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    // Template covers Tuesday only; the request is for a Monday.
    mock_doctor(
        &server,
        doctor_id,
        json!([MockRows::availability_window(2, "09:00:00", "17:00:00")]),
    )
    .await;

    let slots = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn switched_off_window_is_empty() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    mock_doctor(
        &server,
        doctor_id,
        json!([{
            "day_of_week": 1,
            "start_time": "09:00:00",
            "end_time": "17:00:00",
            "is_available": false
        }]),
    )
    .await;

    let slots = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await
        .unwrap();

    assert!(slots.is_empty());
}

#[tokio::test]
async fn unknown_doctor_is_not_found() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = resolver_for(&server)
        .available_slots(doctor_id, monday(), TOKEN)
        .await;

    assert_matches!(result, Err(DoctorError::NotFound));
}
