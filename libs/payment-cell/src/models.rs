// libs/payment-cell/src/models.rs
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use appointment_cell::models::AppointmentStatus;

/// One gateway order attempt tied to exactly one appointment. Rows are
/// append-only history; nothing in this cell deletes them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentRecordStatus {
    Created,
    Paid,
    Failed,
}

impl fmt::Display for PaymentRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentRecordStatus::Created => write!(f, "created"),
            PaymentRecordStatus::Paid => write!(f, "paid"),
            PaymentRecordStatus::Failed => write!(f, "failed"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub appointment_id: Uuid,
}

/// Hand-off to the client-side checkout: everything it needs to open the
/// gateway widget. Amount is in minor currency units (paise).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub appointment_id: Uuid,
}

// ==============================================================================
// RECEIPT PROJECTION
// ==============================================================================

/// Payment joined with its appointment and both display names, shaped by
/// the PostgREST embedded select for receipt rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub order_id: String,
    pub payment_id: Option<String>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentRecordStatus,
    pub created_at: DateTime<Utc>,
    pub appointment: ReceiptAppointment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub appointment_date: NaiveDate,
    pub slot_time: String,
    pub status: AppointmentStatus,
    pub patient: PartyName,
    pub doctor: PartyName,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyName {
    pub full_name: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Payment not found")]
    NotFound,

    #[error("Not authorized for this payment")]
    Forbidden,

    /// Signature mismatch. An expected outcome of the handshake, never a
    /// server fault; nothing is mutated when it occurs.
    #[error("Payment verification failed")]
    VerificationFailed,

    #[error("Payment gateway error: {0}")]
    Gateway(String),

    #[error("Database error: {0}")]
    Database(String),
}
