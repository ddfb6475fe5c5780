// libs/payment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{CreateOrderRequest, PaymentError, VerifyPaymentRequest};
use crate::services::reconciliation::PaymentReconciliationService;

#[axum::debug_handler]
pub async fn create_order(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let reconciliation = PaymentReconciliationService::new(&state);

    let order = reconciliation
        .create_order(&user, request.appointment_id, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "order": order,
        "message": "Payment order created"
    })))
}

/// Settles the gateway callback. A bad signature is an expected outcome
/// and answers 200 with success=false, not an error status.
#[axum::debug_handler]
pub async fn verify_payment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<AuthUser>,
    Json(request): Json<VerifyPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let reconciliation = PaymentReconciliationService::new(&state);

    match reconciliation.verify_payment(request, token).await {
        Ok(()) => Ok(Json(json!({
            "success": true,
            "message": "Payment verified"
        }))),
        Err(PaymentError::VerificationFailed) => Ok(Json(json!({
            "success": false,
            "message": "Payment verification failed"
        }))),
        Err(other) => Err(map_payment_error(other)),
    }
}

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<Arc<AppConfig>>,
    Path(payment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let reconciliation = PaymentReconciliationService::new(&state);

    let receipt = reconciliation
        .get_payment(payment_id, &user, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": receipt
    })))
}

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::AppointmentNotFound => AppError::NotFound("Appointment not found".to_string()),
        PaymentError::NotFound => AppError::NotFound("Payment not found".to_string()),
        PaymentError::Forbidden => AppError::Forbidden("Not authorized for this payment".to_string()),
        // The verify handler answers this on its 200 path; unreachable here.
        PaymentError::VerificationFailed => AppError::BadRequest("Payment verification failed".to_string()),
        PaymentError::Gateway(msg) => AppError::ExternalService(msg),
        PaymentError::Database(msg) => AppError::Database(msg),
    }
}
