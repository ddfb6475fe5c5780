use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, UserRole};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub razorpay_key_id: String,
    pub razorpay_key_secret: String,
    pub razorpay_base_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            razorpay_key_id: "rzp_test_key".to_string(),
            razorpay_key_secret: "rzp_test_secret".to_string(),
            razorpay_base_url: "http://localhost:54322".to_string(),
        }
    }
}

impl TestConfig {
    /// Point both backends at mock servers.
    pub fn with_urls(supabase_url: &str, razorpay_base_url: &str) -> Self {
        Self {
            supabase_url: supabase_url.to_string(),
            razorpay_base_url: razorpay_base_url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            razorpay_key_id: self.razorpay_key_id.clone(),
            razorpay_key_secret: self.razorpay_key_secret.clone(),
            razorpay_base_url: self.razorpay_base_url.clone(),
            payment_currency: "INR".to_string(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    /// Identity context as the auth middleware would inject it. Panics on a
    /// role that the middleware would have rejected.
    pub fn to_auth_user(&self) -> AuthUser {
        let role: UserRole = self.role.parse().expect("test role must be valid");
        AuthUser {
            id: self.id,
            email: Some(self.email.clone()),
            role,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for wiremock responders.
pub struct MockRows;

impl MockRows {
    pub fn doctor_row(doctor_id: Uuid, fee: f64, windows: serde_json::Value) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "full_name": "Dr. Asha Rao",
            "email": "doctor@example.com",
            "is_approved": true,
            "is_blocked": false,
            "consultation_fee": fee,
            "weekly_availability": windows,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn availability_window(day_of_week: u8, start: &str, end: &str) -> serde_json::Value {
        json!({
            "day_of_week": day_of_week,
            "start_time": start,
            "end_time": end,
            "is_available": true
        })
    }

    pub fn appointment_row(
        appointment_id: Uuid,
        patient_id: Uuid,
        doctor_id: Uuid,
        date: &str,
        slot_time: &str,
        status: &str,
        payment_status: &str,
        amount: f64,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_date": date,
            "slot_time": slot_time,
            "problem": "Recurring headaches",
            "status": status,
            "payment_status": payment_status,
            "payment_ref": null,
            "amount": amount,
            "is_checked": false,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn payment_row(
        payment_id: Uuid,
        appointment_id: Uuid,
        order_id: &str,
        amount: f64,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": payment_id,
            "appointment_id": appointment_id,
            "order_id": order_id,
            "payment_id": null,
            "signature": null,
            "amount": amount,
            "currency": "INR",
            "status": status,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }
}
