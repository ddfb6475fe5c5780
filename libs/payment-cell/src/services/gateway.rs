// libs/payment-cell/src/services/gateway.rs
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::PaymentError;

/// Remote order as the gateway reports it. Amount comes back in minor
/// units; extra response fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Thin client for the Razorpay orders API. Base URL is configuration so
/// tests can point it at a mock server.
pub struct RazorpayClient {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl RazorpayClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.razorpay_base_url.clone(),
            key_id: config.razorpay_key_id.clone(),
            key_secret: config.razorpay_key_secret.clone(),
        }
    }

    /// Create a remote order for `amount_minor` units of `currency`.
    /// Transport failures and non-2xx answers both surface as gateway
    /// errors; the caller decides whether to retry.
    pub async fn create_order(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, PaymentError> {
        let url = format!("{}/v1/orders", self.base_url);
        debug!("Creating gateway order at {} for {} {}", url, amount_minor, currency);

        let body = json!({
            "amount": amount_minor,
            "currency": currency,
            "receipt": receipt
        });

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&body)
            .send()
            .await
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gateway order creation failed ({}): {}", status, error_text);
            return Err(PaymentError::Gateway(format!(
                "Order creation failed ({}): {}",
                status, error_text
            )));
        }

        response
            .json::<GatewayOrder>()
            .await
            .map_err(|e| PaymentError::Gateway(format!("Invalid order response: {}", e)))
    }
}
