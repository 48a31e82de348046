use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
        Mutex,
    },
};

use crate::{
    db_types::PaymentStatus,
    traits::{ExternalPayment, ExternalPaymentRequest, PaymentProvider, PaymentProviderError},
};

/// An in-memory payment provider. Payments it creates are `Pending` until a test says otherwise with
/// [`StubPaymentProvider::set_status`]. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct StubPaymentProvider {
    next_id: Arc<AtomicU64>,
    statuses: Arc<Mutex<HashMap<String, PaymentStatus>>>,
    requests: Arc<Mutex<Vec<ExternalPaymentRequest>>>,
    unreachable: Arc<AtomicBool>,
}

impl StubPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, provider_tx_id: &str, status: PaymentStatus) {
        if let Ok(mut statuses) = self.statuses.lock() {
            statuses.insert(provider_tx_id.to_string(), status);
        }
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<ExternalPaymentRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn check_reachable(&self) -> Result<(), PaymentProviderError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(PaymentProviderError::Unreachable("stub provider is offline".into()));
        }
        Ok(())
    }
}

impl PaymentProvider for StubPaymentProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn create_external_payment(
        &self,
        request: &ExternalPaymentRequest,
    ) -> Result<ExternalPayment, PaymentProviderError> {
        self.check_reachable()?;
        let id = format!("stub-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.set_status(&id, PaymentStatus::Pending);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        Ok(ExternalPayment { pay_url: Some(format!("https://pay.example.com/{id}")), provider_tx_id: id })
    }

    async fn payment_status(&self, provider_tx_id: &str) -> Result<PaymentStatus, PaymentProviderError> {
        self.check_reachable()?;
        let statuses = self.statuses.lock().map_err(|e| PaymentProviderError::InvalidResponse(e.to_string()))?;
        statuses
            .get(provider_tx_id)
            .copied()
            .ok_or_else(|| PaymentProviderError::Rejected { status: 404, message: format!("{provider_tx_id} not found") })
    }
}
