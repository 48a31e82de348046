//! A thin client for a NowPayments-style crypto payment API.
//!
//! Only the two calls the reconciler needs are implemented: opening a payment and looking one up. Everything else
//! about the provider is its own business.
use std::sync::Arc;

use gamekey_engine::{
    db_types::PaymentStatus,
    traits::{ExternalPayment, ExternalPaymentRequest, PaymentProvider, PaymentProviderError},
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::config::NowPaymentsConfig;

pub const PROVIDER_NAME: &str = "nowpayments";

#[derive(Clone)]
pub struct NowPaymentsProvider {
    config: NowPaymentsConfig,
    client: Arc<Client>,
}

#[derive(Debug, Clone, Serialize)]
struct CreatePaymentBody<'a> {
    price_amount: f64,
    price_currency: String,
    pay_currency: &'a str,
    order_id: &'a str,
    order_description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ipn_callback_url: Option<&'a str>,
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentResponse {
    #[serde(deserialize_with = "id_as_string")]
    payment_id: String,
    payment_status: String,
    #[serde(default)]
    invoice_url: Option<String>,
}

impl NowPaymentsProvider {
    pub fn new(config: NowPaymentsConfig) -> Result<Self, PaymentProviderError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| PaymentProviderError::NotConfigured(e.to_string()))?;
        headers.insert("x-api-key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaymentProviderError::NotConfigured(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, PaymentProviderError> {
        let url = self.url(path);
        trace!("🔄️ Sending provider request: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await.map_err(|e| PaymentProviderError::Unreachable(e.to_string()))?;
        if response.status().is_success() {
            response.json::<T>().await.map_err(|e| PaymentProviderError::InvalidResponse(e.to_string()))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await.map_err(|e| PaymentProviderError::InvalidResponse(e.to_string()))?;
            Err(PaymentProviderError::Rejected { status, message })
        }
    }
}

impl PaymentProvider for NowPaymentsProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn create_external_payment(
        &self,
        request: &ExternalPaymentRequest,
    ) -> Result<ExternalPayment, PaymentProviderError> {
        let body = CreatePaymentBody {
            price_amount: request.amount.as_major_units(),
            price_currency: request.currency.to_lowercase(),
            pay_currency: &self.config.pay_currency,
            order_id: &request.reference,
            order_description: &request.description,
            ipn_callback_url: self.config.ipn_callback_url.as_deref(),
        };
        let response = self.rest_query::<PaymentResponse, _>(Method::POST, "/payment", Some(body)).await?;
        info!("🔄️ Provider opened payment {} for {}", response.payment_id, request.reference);
        Ok(ExternalPayment { provider_tx_id: response.payment_id, pay_url: response.invoice_url })
    }

    async fn payment_status(&self, provider_tx_id: &str) -> Result<PaymentStatus, PaymentProviderError> {
        let path = format!("/payment/{provider_tx_id}");
        let response = self.rest_query::<PaymentResponse, ()>(Method::GET, &path, None).await?;
        trace!("🔄️ Provider status for {provider_tx_id} is {}", response.payment_status);
        Ok(map_provider_status(&response.payment_status))
    }
}

/// Maps the provider's payment states onto ours. Anything we do not recognise is still in progress.
pub fn map_provider_status(status: &str) -> PaymentStatus {
    match status.trim().to_ascii_lowercase().as_str() {
        "finished" | "confirmed" => PaymentStatus::Completed,
        "failed" | "refunded" => PaymentStatus::Failed,
        "expired" => PaymentStatus::Cancelled,
        _ => PaymentStatus::Pending,
    }
}

/// The provider sends payment ids as numbers in some responses and as strings in others.
fn id_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where D: serde::Deserializer<'de> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        v => Err(serde::de::Error::custom(format!("Invalid payment id: {v}"))),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn provider_statuses() {
        assert_eq!(map_provider_status("finished"), PaymentStatus::Completed);
        assert_eq!(map_provider_status("Confirmed"), PaymentStatus::Completed);
        assert_eq!(map_provider_status("failed"), PaymentStatus::Failed);
        assert_eq!(map_provider_status("refunded"), PaymentStatus::Failed);
        assert_eq!(map_provider_status("expired"), PaymentStatus::Cancelled);
        for status in ["waiting", "confirming", "sending", "partially_paid", ""] {
            assert_eq!(map_provider_status(status), PaymentStatus::Pending, "{status}");
        }
    }

    #[test]
    fn payment_ids_may_be_numbers() {
        let json = r#"{"payment_id": 5745459419, "payment_status": "waiting", "pay_address": "TXyz"}"#;
        let response: PaymentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.payment_id, "5745459419");
        assert!(response.invoice_url.is_none());
        let json = r#"{"payment_id": "np-77", "payment_status": "finished", "invoice_url": "https://pay/77"}"#;
        let response: PaymentResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.payment_id, "np-77");
        assert_eq!(response.invoice_url.as_deref(), Some("https://pay/77"));
    }

    #[test]
    fn request_body_uses_major_units() {
        let body = CreatePaymentBody {
            price_amount: gamekey_common::FiatAmount::from_cents(1250).as_major_units(),
            price_currency: "USD".to_lowercase(),
            pay_currency: "usdttrc20",
            order_id: "gk-order-1-1",
            order_description: "1 x Steam key",
            ipn_callback_url: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["price_amount"], 12.5);
        assert_eq!(json["price_currency"], "usd");
        assert!(json.get("ipn_callback_url").is_none());
    }
}
