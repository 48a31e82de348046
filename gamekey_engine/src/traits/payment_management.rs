use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewPaymentTransaction, PaymentStatus, PaymentTransaction},
    traits::Pagination,
};

#[derive(Debug, Clone, Error)]
pub enum PaymentStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("No payment exists for provider transaction id {0}")]
    PaymentNotFound(String),
    #[error("A payment for provider transaction id {0} already exists")]
    PaymentAlreadyExists(String),
    #[error("The payment with internal id {0} does not exist")]
    PaymentIdNotFound(i64),
}

impl From<sqlx::Error> for PaymentStoreError {
    fn from(e: sqlx::Error) -> Self {
        PaymentStoreError::DatabaseError(e.to_string())
    }
}

/// Behaviour for tracking external payment attempts.
#[allow(async_fn_in_trait)]
pub trait PaymentManagement {
    /// Stores a new payment in `Pending` status.
    async fn insert_payment(&self, payment: NewPaymentTransaction) -> Result<PaymentTransaction, PaymentStoreError>;

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    async fn fetch_payment_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    /// Moves a `Pending` payment to `status`.
    ///
    /// This is a conditional write on the current status, so at most one caller ever sees the transition. If the payment
    /// is already terminal, nothing changes and `None` is returned. `failure_reason` is recorded for `Failed` and
    /// `Cancelled` transitions.
    async fn transition_payment_status(
        &self,
        provider_tx_id: &str,
        status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError>;

    /// Records the order that was created for the payment.
    async fn link_order_to_payment(&self, payment_id: i64, order_id: i64)
        -> Result<PaymentTransaction, PaymentStoreError>;

    /// All pending payments, oldest first. If `created_before` is given, only payments created before then are
    /// returned.
    async fn fetch_pending_payments(
        &self,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError>;

    async fn fetch_payments_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError>;

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentTransaction>, PaymentStoreError>;
}
