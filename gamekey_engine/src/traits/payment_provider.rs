use gamekey_common::FiatAmount;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db_types::PaymentStatus;

#[derive(Debug, Clone, Error)]
pub enum PaymentProviderError {
    #[error("Could not reach the payment provider: {0}")]
    Unreachable(String),
    #[error("The payment provider rejected the request. Error {status}. {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response from the payment provider: {0}")]
    InvalidResponse(String),
    #[error("Payment provider is not configured: {0}")]
    NotConfigured(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPaymentRequest {
    pub amount: FiatAmount,
    pub currency: String,
    /// Our own reference for the payment, echoed back by the provider.
    pub reference: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPayment {
    pub provider_tx_id: String,
    pub pay_url: Option<String>,
}

/// A third-party payment processor, treated as a black box.
///
/// The engine only needs to be able to open a payment and to ask what happened to it. Status changes may also arrive
/// by webhook, in which case the caller feeds them straight into the reconciler.
#[allow(async_fn_in_trait)]
pub trait PaymentProvider {
    /// The name recorded against payments created through this provider.
    fn name(&self) -> &str;

    async fn create_external_payment(
        &self,
        request: &ExternalPaymentRequest,
    ) -> Result<ExternalPayment, PaymentProviderError>;

    /// The provider's current view of the payment, mapped onto our status model.
    async fn payment_status(&self, provider_tx_id: &str) -> Result<PaymentStatus, PaymentProviderError>;
}
