//! The external payment reconciler.
//!
//! Checkouts paid through a third-party provider are recorded as pending [`PaymentTransaction`]s. The provider reports
//! back later, by webhook or because the worker polled it, and [`ReconcilerApi::on_provider_status_change`] acts on the
//! news exactly once: the storage layer only lets one caller move a payment out of `Pending`.
use std::fmt::Debug;

use chrono::{Duration, Utc};
use gamekey_common::{Coins, FiatAmount};
use log::*;

use crate::{
    db_types::{
        LedgerEntryKind,
        NewLedgerEntry,
        NewPaymentTransaction,
        Order,
        OrderStatusType,
        PaymentIntent,
        PaymentStatus,
        PaymentTransaction,
        RelatedEntity,
    },
    store_api::{PaymentMode, PurchaseApi, PurchaseError, PurchaseRequest, ReconcileError, ReconcileOutcome},
    traits::{
        AccountManagement,
        ExternalPaymentRequest,
        LedgerManagement,
        Notification,
        Notifier,
        OrderManagement,
        Pagination,
        PaymentManagement,
        PaymentProvider,
        StoreDatabase,
    },
};

pub struct ReconcilerApi<B, N, P> {
    db: B,
    provider: P,
    purchases: PurchaseApi<B, N>,
}

impl<B: Debug, N, P> Debug for ReconcilerApi<B, N, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconcilerApi ({:?})", self.db)
    }
}

impl<B, N, P> ReconcilerApi<B, N, P>
where
    B: StoreDatabase,
    N: Notifier,
    P: PaymentProvider,
{
    pub fn new(db: B, provider: P, purchases: PurchaseApi<B, N>) -> Self {
        Self { db, provider, purchases }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn purchases(&self) -> &PurchaseApi<B, N> {
        &self.purchases
    }

    /// Opens an external payment for a product purchase. The order itself is only created once the provider confirms
    /// the payment. The fiat unit price and the preorder decision are frozen into the payment now.
    pub async fn create_product_checkout(
        &self,
        account_id: i64,
        product_id: i64,
        quantity: i64,
    ) -> Result<PaymentTransaction, ReconcileError> {
        let (account, product, immediate) = self.purchases.validate(account_id, product_id, quantity).await?;
        let amount = product.price_fiat.checked_mul(quantity).ok_or_else(|| {
            PurchaseError::Validation(format!("{quantity} x {} overflows", product.price_fiat))
        })?;
        if amount.cents() <= 0 {
            return Err(PurchaseError::Validation(format!("Product #{product_id} has no fiat price")).into());
        }
        let intent = PaymentIntent::ProductPurchase {
            account_id: account.id,
            product_id: product.id,
            quantity,
            unit_price: product.price_fiat,
            is_preorder: !immediate,
        };
        let request = ExternalPaymentRequest {
            amount,
            currency: product.fiat_currency.clone(),
            reference: payment_reference("order", account.id),
            description: format!("{quantity} x {}", product.name),
        };
        self.open_payment(request, intent).await
    }

    /// Opens an external payment that buys `coins` for `amount` of `currency`.
    pub async fn create_coin_top_up(
        &self,
        account_id: i64,
        coins: Coins,
        amount: FiatAmount,
        currency: &str,
    ) -> Result<PaymentTransaction, ReconcileError> {
        if !coins.is_positive() || amount.cents() <= 0 {
            let msg = format!("A top-up needs a positive coin amount and price. Got {coins} for {amount} {currency}");
            return Err(PurchaseError::Validation(msg).into());
        }
        let account = self.db.fetch_account(account_id).await?.ok_or(PurchaseError::AccountNotFound(account_id))?;
        let intent = PaymentIntent::CoinTopUp { account_id: account.id, coins };
        let request = ExternalPaymentRequest {
            amount,
            currency: currency.to_string(),
            reference: payment_reference("topup", account.id),
            description: format!("{coins} top-up"),
        };
        self.open_payment(request, intent).await
    }

    async fn open_payment(
        &self,
        request: ExternalPaymentRequest,
        intent: PaymentIntent,
    ) -> Result<PaymentTransaction, ReconcileError> {
        let external = self.provider.create_external_payment(&request).await?;
        let payment = NewPaymentTransaction {
            account_id: intent.account_id(),
            provider: self.provider.name().to_string(),
            provider_tx_id: external.provider_tx_id,
            amount: request.amount,
            currency: request.currency,
            pay_url: external.pay_url,
            intent,
        };
        let payment = self.db.insert_payment(payment).await?;
        info!(
            "🔄️ Payment {} of {} {} opened with {} for account #{}",
            payment.provider_tx_id, payment.amount, payment.currency, payment.provider, payment.account_id
        );
        Ok(payment)
    }

    /// Applies a status report from the provider.
    ///
    /// Reports for payments that have already left `Pending` are ignored, so repeated or concurrent deliveries of the
    /// same report only ever produce one order or one top-up.
    pub async fn on_provider_status_change(
        &self,
        provider_tx_id: &str,
        status: PaymentStatus,
        reason: Option<String>,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let payment = self
            .db
            .fetch_payment_by_provider_id(provider_tx_id)
            .await?
            .ok_or_else(|| ReconcileError::PaymentNotFound(provider_tx_id.to_string()))?;
        if payment.status.is_terminal() {
            debug!("🔄️ Payment {provider_tx_id} is already {}. Ignoring {status}.", payment.status);
            return Ok(ReconcileOutcome::AlreadyProcessed);
        }
        if status == PaymentStatus::Pending {
            return Ok(ReconcileOutcome::StillPending);
        }
        let Some(payment) = self.db.transition_payment_status(provider_tx_id, status, reason.clone()).await? else {
            debug!("🔄️ Payment {provider_tx_id} was processed by another caller");
            return Ok(ReconcileOutcome::AlreadyProcessed);
        };
        info!("🔄️ Payment {provider_tx_id} is now {status}");
        match status {
            PaymentStatus::Completed => Ok(self.on_payment_completed(payment).await),
            _ => self.on_payment_failed(payment, reason.unwrap_or_else(|| status.to_string())).await,
        }
    }

    /// Acts on a completed payment. Any failure from here on is a fulfilment problem, not a reconciliation error: the
    /// payment stays completed and an alert is raised instead.
    async fn on_payment_completed(&self, payment: PaymentTransaction) -> ReconcileOutcome {
        match payment.intent().clone() {
            PaymentIntent::CoinTopUp { account_id, coins } => {
                let entry = NewLedgerEntry::new(
                    account_id,
                    coins,
                    LedgerEntryKind::PurchaseOfCoins,
                    format!("Top-up via {} payment {}", payment.provider, payment.provider_tx_id),
                )
                .with_related(RelatedEntity::payment(payment.id));
                match self.db.credit(entry).await {
                    Ok((account, _)) => {
                        info!("🔄️ Credited {coins} to account #{account_id} for payment {}", payment.provider_tx_id);
                        let notification = Notification::CoinsCredited { amount: coins, balance: account.balance };
                        self.purchases.notify(&account, &notification).await;
                        ReconcileOutcome::CoinsCredited { account, amount: coins }
                    },
                    Err(e) => self.fulfillment_pending(payment, None, e.to_string()).await,
                }
            },
            PaymentIntent::ProductPurchase { account_id, product_id, quantity, unit_price, is_preorder } => {
                let request = PurchaseRequest {
                    account_id,
                    product_id,
                    quantity,
                    note: None,
                    mode: PaymentMode::External {
                        payment_id: payment.id,
                        unit_price,
                        currency: payment.currency.clone(),
                        is_preorder,
                    },
                };
                match self.purchases.purchase(request).await {
                    Ok(outcome) => ReconcileOutcome::Fulfilled(outcome),
                    Err(e) => self.fulfillment_pending(payment, None, e.to_string()).await,
                }
            },
        }
    }

    async fn fulfillment_pending(
        &self,
        payment: PaymentTransaction,
        order: Option<Order>,
        reason: String,
    ) -> ReconcileOutcome {
        self.purchases.publish_fulfillment_pending(payment.clone(), order, reason.clone()).await;
        ReconcileOutcome::FulfillmentPending { payment, reason }
    }

    async fn on_payment_failed(
        &self,
        payment: PaymentTransaction,
        reason: String,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let mut cancelled_order = None;
        if let Some(order_id) = payment.order_id {
            let order = self.db.fetch_order(order_id).await?;
            if let Some(order) = order.filter(|o| o.status == OrderStatusType::Pending) {
                let note = format!("payment {} {reason}", payment.provider_tx_id);
                match self.purchases.cancel_order(order.id, &note).await {
                    Ok(order) => cancelled_order = Some(order),
                    Err(e) => warn!("🔄️ Could not cancel order #{} after payment failure: {e}", order.id),
                }
            }
        }
        if let Some(account) = self.db.fetch_account(payment.account_id).await? {
            let notification =
                Notification::PaymentFailed { provider_tx_id: payment.provider_tx_id.clone(), reason: reason.clone() };
            self.purchases.notify(&account, &notification).await;
        }
        info!("🔄️ Payment {} closed without fulfilment: {reason}", payment.provider_tx_id);
        Ok(ReconcileOutcome::PaymentFailed { payment, cancelled_order })
    }

    /// Asks the provider for the current status of the payment and applies it.
    pub async fn sync_with_provider(&self, provider_tx_id: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let status = self.provider.payment_status(provider_tx_id).await?;
        trace!("🔄️ Provider reports {provider_tx_id} as {status}");
        self.on_provider_status_change(provider_tx_id, status, None).await
    }

    /// Cancels payments that have been pending for longer than `older_than`. Returns the payments that were expired.
    pub async fn expire_stale_payments(&self, older_than: Duration) -> Result<Vec<PaymentTransaction>, ReconcileError> {
        let cutoff = Utc::now() - older_than;
        let stale = self.db.fetch_pending_payments(Some(cutoff)).await?;
        let mut expired = Vec::with_capacity(stale.len());
        for payment in stale {
            let outcome = self
                .on_provider_status_change(&payment.provider_tx_id, PaymentStatus::Cancelled, Some("expired".into()))
                .await?;
            if let ReconcileOutcome::PaymentFailed { payment, .. } = outcome {
                expired.push(payment);
            }
        }
        if !expired.is_empty() {
            info!("🔄️ {} stale payments expired", expired.len());
        }
        Ok(expired)
    }

    pub async fn pending_payments(&self) -> Result<Vec<PaymentTransaction>, ReconcileError> {
        Ok(self.db.fetch_pending_payments(None).await?)
    }

    pub async fn payment_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, ReconcileError> {
        Ok(self.db.fetch_payment_by_provider_id(provider_tx_id).await?)
    }

    pub async fn payments_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<PaymentTransaction>, ReconcileError> {
        Ok(self.db.fetch_payments_for_account(account_id, pagination).await?)
    }

    pub async fn payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentTransaction>, ReconcileError> {
        Ok(self.db.fetch_payments_for_order(order_id).await?)
    }
}

fn payment_reference(kind: &str, account_id: i64) -> String {
    format!("gk-{kind}-{account_id}-{}", Utc::now().timestamp_millis())
}
