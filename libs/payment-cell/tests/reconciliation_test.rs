use assert_matches::assert_matches;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::models::{PaymentError, VerifyPaymentRequest};
use payment_cell::services::reconciliation::{payment_signature, PaymentReconciliationService};
use shared_utils::test_utils::{MockRows, TestConfig, TestUser};

const TOKEN: &str = "test-token";
const KEY_SECRET: &str = "rzp_test_secret";

async fn servers() -> (MockServer, MockServer, PaymentReconciliationService) {
    let supabase = MockServer::start().await;
    let gateway = MockServer::start().await;
    let config = TestConfig::with_urls(&supabase.uri(), &gateway.uri()).to_app_config();
    let service = PaymentReconciliationService::new(&config);
    (supabase, gateway, service)
}

async fn mock_appointment(server: &MockServer, row: serde_json::Value) {
    let id = row["id"].as_str().unwrap().to_string();
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn create_order_charges_minor_units_and_records_payment() {
    let (supabase, gateway, service) = servers().await;
    let patient = TestUser::patient("pat@example.com");
    let appointment_id = Uuid::new_v4();

    mock_appointment(
        &supabase,
        MockRows::appointment_row(
            appointment_id,
            patient.id,
            Uuid::new_v4(),
            "2026-08-10",
            "09:00",
            "pending",
            "pending",
            499.99,
        ),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .and(body_partial_json(json!({
            "amount": 49999,
            "currency": "INR",
            "receipt": appointment_id
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "order_xyz",
            "entity": "order",
            "amount": 49999,
            "currency": "INR",
            "receipt": appointment_id,
            "status": "created"
        })))
        .expect(1)
        .mount(&gateway)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "appointment_id": appointment_id,
            "order_id": "order_xyz",
            "amount": 499.99,
            "status": "created"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockRows::payment_row(Uuid::new_v4(), appointment_id, "order_xyz", 499.99, "created")
        ])))
        .expect(1)
        .mount(&supabase)
        .await;

    let order = service
        .create_order(&patient.to_auth_user(), appointment_id, TOKEN)
        .await
        .unwrap();

    assert_eq!(order.order_id, "order_xyz");
    assert_eq!(order.amount, 49999);
    assert_eq!(order.currency, "INR");
}

#[tokio::test]
async fn create_order_for_missing_appointment_fails() {
    let (supabase, _gateway, service) = servers().await;
    let patient = TestUser::patient("pat@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&supabase)
        .await;

    let result = service
        .create_order(&patient.to_auth_user(), Uuid::new_v4(), TOKEN)
        .await;

    assert_matches!(result, Err(PaymentError::AppointmentNotFound));
}

#[tokio::test]
async fn only_the_appointment_patient_can_open_an_order() {
    let (supabase, gateway, service) = servers().await;
    let other_patient = TestUser::patient("other@example.com");
    let appointment_id = Uuid::new_v4();

    mock_appointment(
        &supabase,
        MockRows::appointment_row(
            appointment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "2026-08-10",
            "09:00",
            "pending",
            "pending",
            500.0,
        ),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&gateway)
        .await;

    let result = service
        .create_order(&other_patient.to_auth_user(), appointment_id, TOKEN)
        .await;

    assert_matches!(result, Err(PaymentError::Forbidden));
}

#[tokio::test]
async fn gateway_failure_leaves_no_payment_row() {
    let (supabase, gateway, service) = servers().await;
    let patient = TestUser::patient("pat@example.com");
    let appointment_id = Uuid::new_v4();

    mock_appointment(
        &supabase,
        MockRows::appointment_row(
            appointment_id,
            patient.id,
            Uuid::new_v4(),
            "2026-08-10",
            "09:00",
            "pending",
            "pending",
            500.0,
        ),
    )
    .await;

    Mock::given(method("POST"))
        .and(path("/v1/orders"))
        .respond_with(ResponseTemplate::new(502).set_body_string("upstream unavailable"))
        .mount(&gateway)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&supabase)
        .await;

    let result = service
        .create_order(&patient.to_auth_user(), appointment_id, TOKEN)
        .await;

    assert_matches!(result, Err(PaymentError::Gateway(_)));
}

#[tokio::test]
async fn matching_signature_settles_through_the_rpc() {
    let (supabase, _gateway, service) = servers().await;
    let appointment_id = Uuid::new_v4();

    let signature = payment_signature(KEY_SECRET, "order_xyz", "pay_123");

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/mark_payment_verified"))
        .and(body_partial_json(json!({
            "p_order_id": "order_xyz",
            "p_payment_id": "pay_123",
            "p_signature": signature,
            "p_appointment_id": appointment_id
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&supabase)
        .await;

    service
        .verify_payment(
            VerifyPaymentRequest {
                order_id: "order_xyz".to_string(),
                payment_id: "pay_123".to_string(),
                signature,
                appointment_id,
            },
            TOKEN,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn tampered_signature_touches_nothing() {
    let (supabase, _gateway, service) = servers().await;

    let mut signature = payment_signature(KEY_SECRET, "order_xyz", "pay_123");
    // Flip the last nibble.
    let tampered_last = if signature.ends_with('0') { '1' } else { '0' };
    signature.pop();
    signature.push(tampered_last);

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/mark_payment_verified"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&supabase)
        .await;

    let result = service
        .verify_payment(
            VerifyPaymentRequest {
                order_id: "order_xyz".to_string(),
                payment_id: "pay_123".to_string(),
                signature,
                appointment_id: Uuid::new_v4(),
            },
            TOKEN,
        )
        .await;

    assert_matches!(result, Err(PaymentError::VerificationFailed));
}

#[tokio::test]
async fn signature_over_different_ids_is_rejected() {
    let (supabase, _gateway, service) = servers().await;

    // Valid signature, but for another order.
    let signature = payment_signature(KEY_SECRET, "order_other", "pay_123");

    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/mark_payment_verified"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&supabase)
        .await;

    let result = service
        .verify_payment(
            VerifyPaymentRequest {
                order_id: "order_xyz".to_string(),
                payment_id: "pay_123".to_string(),
                signature,
                appointment_id: Uuid::new_v4(),
            },
            TOKEN,
        )
        .await;

    assert_matches!(result, Err(PaymentError::VerificationFailed));
}

#[tokio::test]
async fn receipt_projection_is_policy_checked() {
    let (supabase, _gateway, service) = servers().await;
    let patient = TestUser::patient("pat@example.com");
    let stranger = TestUser::patient("other@example.com");
    let payment_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    let receipt_row = json!({
        "id": payment_id,
        "appointment_id": appointment_id,
        "order_id": "order_xyz",
        "payment_id": "pay_123",
        "signature": "sig",
        "amount": 500.0,
        "currency": "INR",
        "status": "paid",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-01T00:00:00Z",
        "appointment": {
            "id": appointment_id,
            "patient_id": patient.id,
            "doctor_id": Uuid::new_v4(),
            "appointment_date": "2026-08-10",
            "slot_time": "09:00",
            "status": "confirmed",
            "patient": { "full_name": "Priya Sharma" },
            "doctor": { "full_name": "Dr. Asha Rao" }
        }
    });

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .and(query_param("id", format!("eq.{}", payment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([receipt_row])))
        .mount(&supabase)
        .await;

    let receipt = service
        .get_payment(payment_id, &patient.to_auth_user(), TOKEN)
        .await
        .unwrap();
    assert_eq!(receipt.appointment.patient.full_name, "Priya Sharma");
    assert_eq!(receipt.order_id, "order_xyz");

    let denied = service
        .get_payment(payment_id, &stranger.to_auth_user(), TOKEN)
        .await;
    assert_matches!(denied, Err(PaymentError::Forbidden));
}
