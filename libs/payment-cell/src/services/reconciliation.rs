// libs/payment-cell/src/services/reconciliation.rs
use std::sync::Arc;

use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::Method;
use serde_json::json;
use sha2::Sha256;
use tracing::{debug, info, warn};
use uuid::Uuid;

use appointment_cell::models::Appointment;
use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::auth::{AuthUser, UserRole};

use crate::models::{
    CreateOrderResponse, Payment, PaymentError, PaymentReceipt, PaymentRecordStatus,
    VerifyPaymentRequest,
};
use crate::services::gateway::RazorpayClient;

type HmacSha256 = Hmac<Sha256>;

/// Signature the gateway sends for a successful checkout:
/// hex(HMAC-SHA256(secret, "orderId|paymentId")).
pub fn payment_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(format!("{}|{}", order_id, payment_id).as_bytes());

    let digest = mac.finalize().into_bytes();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// Appointment amount is major units; the gateway bills minor units
/// (paise).
fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

pub struct PaymentReconciliationService {
    supabase: Arc<SupabaseClient>,
    gateway: RazorpayClient,
    key_secret: String,
    currency: String,
}

impl PaymentReconciliationService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: Arc::new(SupabaseClient::new(config)),
            gateway: RazorpayClient::new(config),
            key_secret: config.razorpay_key_secret.clone(),
            currency: config.payment_currency.clone(),
        }
    }

    /// Open a gateway order for an appointment and record it locally in
    /// `created` state. Each call makes a fresh order row; verification
    /// later picks the row whose order id the gateway echoes back.
    pub async fn create_order(
        &self,
        user: &AuthUser,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<CreateOrderResponse, PaymentError> {
        info!("Creating payment order for appointment {}", appointment_id);

        let appointment = self.fetch_appointment(appointment_id, auth_token).await?;

        if !(user.role == UserRole::Patient && user.id == appointment.patient_id) {
            return Err(PaymentError::Forbidden);
        }

        let amount_minor = to_minor_units(appointment.amount);
        let order = self
            .gateway
            .create_order(amount_minor, &self.currency, &appointment_id.to_string())
            .await?;

        let now = Utc::now();
        let payment_data = json!({
            "appointment_id": appointment_id,
            "order_id": order.id,
            "amount": appointment.amount,
            "currency": order.currency,
            "status": PaymentRecordStatus::Created.to_string(),
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339()
        });

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert("Prefer", reqwest::header::HeaderValue::from_static("return=representation"));

        let _: Vec<Payment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/payments",
                Some(auth_token),
                Some(payment_data),
                Some(headers),
            )
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        info!("Payment order {} recorded for appointment {}", order.id, appointment_id);

        Ok(CreateOrderResponse {
            order_id: order.id,
            amount: order.amount,
            currency: order.currency,
        })
    }

    /// Settle a gateway callback. Only a recomputed-and-matching signature
    /// may flip any state; on a mismatch this returns VerificationFailed
    /// without touching storage. The matching path applies the payment and
    /// appointment updates through one storage RPC so they land (or fail)
    /// together.
    pub async fn verify_payment(
        &self,
        request: VerifyPaymentRequest,
        auth_token: &str,
    ) -> Result<(), PaymentError> {
        debug!("Verifying payment for order {}", request.order_id);

        let expected = payment_signature(&self.key_secret, &request.order_id, &request.payment_id);

        if expected != request.signature {
            warn!("Signature mismatch for order {}", request.order_id);
            return Err(PaymentError::VerificationFailed);
        }

        let rpc_body = json!({
            "p_order_id": request.order_id,
            "p_payment_id": request.payment_id,
            "p_signature": request.signature,
            "p_appointment_id": request.appointment_id
        });

        self.supabase
            .execute(
                Method::POST,
                "/rest/v1/rpc/mark_payment_verified",
                Some(auth_token),
                Some(rpc_body),
            )
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        info!(
            "Payment {} verified for appointment {}",
            request.payment_id, request.appointment_id
        );
        Ok(())
    }

    /// Receipt projection: the payment with its appointment and both
    /// display names, fetched in one embedded select.
    pub async fn get_payment(
        &self,
        payment_id: Uuid,
        user: &AuthUser,
        auth_token: &str,
    ) -> Result<PaymentReceipt, PaymentError> {
        debug!("Fetching payment receipt: {}", payment_id);

        let path = format!(
            "/rest/v1/payments?id=eq.{}&select=*,appointment:appointments(id,patient_id,doctor_id,appointment_date,slot_time,status,patient:patients(full_name),doctor:doctors(full_name))",
            payment_id
        );

        let result: Vec<PaymentReceipt> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        let receipt = result.into_iter().next().ok_or(PaymentError::NotFound)?;

        let is_party = (user.role == UserRole::Patient && user.id == receipt.appointment.patient_id)
            || (user.role == UserRole::Doctor && user.id == receipt.appointment.doctor_id);
        if !is_party && !user.is_admin() {
            return Err(PaymentError::Forbidden);
        }

        Ok(receipt)
    }

    async fn fetch_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, PaymentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e: DbError| PaymentError::Database(e.to_string()))?;

        result.into_iter().next().ok_or(PaymentError::AppointmentNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_lowercase_hex_of_expected_length() {
        let sig = payment_signature("secret", "order_abc", "pay_123");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn signature_is_deterministic() {
        let a = payment_signature("secret", "order_abc", "pay_123");
        let b = payment_signature("secret", "order_abc", "pay_123");
        assert_eq!(a, b);
    }

    #[test]
    fn any_changed_input_changes_the_signature() {
        let base = payment_signature("secret", "order_abc", "pay_123");
        assert_ne!(base, payment_signature("other", "order_abc", "pay_123"));
        assert_ne!(base, payment_signature("secret", "order_abd", "pay_123"));
        assert_ne!(base, payment_signature("secret", "order_abc", "pay_124"));
    }

    #[test]
    fn separator_is_part_of_the_signed_payload() {
        // "a|bc" and "ab|c" concatenate identically without the pipe.
        assert_ne!(
            payment_signature("secret", "a", "bc"),
            payment_signature("secret", "ab", "c")
        );
    }

    #[test]
    fn minor_unit_conversion_rounds_paise() {
        assert_eq!(to_minor_units(500.0), 50000);
        assert_eq!(to_minor_units(499.99), 49999);
        assert_eq!(to_minor_units(0.005), 1);
    }
}
