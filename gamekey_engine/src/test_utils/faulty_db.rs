use std::sync::{
    atomic::{AtomicBool, AtomicU32, Ordering},
    Arc,
};

use chrono::{DateTime, Utc};
use gamekey_common::{Coins, FiatAmount};

use crate::{
    db_types::{
        Account,
        LedgerEntry,
        NewAccount,
        NewLedgerEntry,
        NewOrder,
        NewPaymentTransaction,
        NewProduct,
        Order,
        OrderStatusType,
        PaymentStatus,
        PaymentTransaction,
        Product,
        Referral,
    },
    traits::{
        AccountApiError,
        AccountManagement,
        InventoryError,
        InventoryManagement,
        LedgerError,
        LedgerManagement,
        LedgerStatistics,
        OrderManagement,
        OrderQueryFilter,
        OrderStoreError,
        Pagination,
        PaymentManagement,
        PaymentStoreError,
        ReferralError,
        ReferralManagement,
        ReferralStatistics,
        SalesStatistics,
        StoreDatabase,
    },
    SqliteDatabase,
};

/// A [`SqliteDatabase`] that can be told to fail selected writes. Everything else is passed straight through.
/// Clones share the same switches.
#[derive(Debug, Clone)]
pub struct FaultyDatabase {
    inner: SqliteDatabase,
    failing_credits: Arc<AtomicBool>,
    failing_payment_links: Arc<AtomicBool>,
    credit_attempts: Arc<AtomicU32>,
}

impl FaultyDatabase {
    pub fn new(inner: SqliteDatabase) -> Self {
        Self {
            inner,
            failing_credits: Arc::new(AtomicBool::new(false)),
            failing_payment_links: Arc::new(AtomicBool::new(false)),
            credit_attempts: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn inner(&self) -> &SqliteDatabase {
        &self.inner
    }

    /// While set, every `credit` is rejected with a database error.
    pub fn set_failing_credits(&self, failing: bool) {
        self.failing_credits.store(failing, Ordering::SeqCst);
    }

    /// While set, `link_order_to_payment` is rejected with a database error.
    pub fn set_failing_payment_links(&self, failing: bool) {
        self.failing_payment_links.store(failing, Ordering::SeqCst);
    }

    /// Number of `credit` calls made so far, successful or not.
    pub fn credit_attempts(&self) -> u32 {
        self.credit_attempts.load(Ordering::SeqCst)
    }
}

impl StoreDatabase for FaultyDatabase {
    fn url(&self) -> &str {
        self.inner.url()
    }

    async fn close(&mut self) {
        self.inner.close().await;
    }
}

impl AccountManagement for FaultyDatabase {
    async fn insert_account(&self, account: NewAccount) -> Result<(Account, bool), AccountApiError> {
        self.inner.insert_account(account).await
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        self.inner.fetch_account(account_id).await
    }

    async fn fetch_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError> {
        self.inner.fetch_account_by_external_id(external_id).await
    }

    async fn fetch_account_by_referral_code(&self, code: &str) -> Result<Option<Account>, AccountApiError> {
        self.inner.fetch_account_by_referral_code(code).await
    }
}

impl LedgerManagement for FaultyDatabase {
    async fn credit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError> {
        self.credit_attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing_credits.load(Ordering::SeqCst) {
            return Err(LedgerError::DatabaseError("database is locked".into()));
        }
        self.inner.credit(entry).await
    }

    async fn debit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError> {
        self.inner.debit(entry).await
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Coins, LedgerError> {
        self.inner.fetch_balance(account_id).await
    }

    async fn fetch_ledger_entries(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.inner.fetch_ledger_entries(account_id, pagination).await
    }

    async fn ledger_sum(&self, account_id: i64) -> Result<Coins, LedgerError> {
        self.inner.ledger_sum(account_id).await
    }

    async fn ledger_statistics(&self) -> Result<LedgerStatistics, LedgerError> {
        self.inner.ledger_statistics().await
    }
}

impl InventoryManagement for FaultyDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        self.inner.insert_product(product).await
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryError> {
        self.inner.fetch_product(product_id).await
    }

    async fn fetch_products(&self, only_available: bool) -> Result<Vec<Product>, InventoryError> {
        self.inner.fetch_products(only_available).await
    }

    async fn available_count(&self, product_id: i64) -> Result<i64, InventoryError> {
        self.inner.available_count(product_id).await
    }

    async fn fetch_stock(&self, product_id: i64) -> Result<Vec<String>, InventoryError> {
        self.inner.fetch_stock(product_id).await
    }

    async fn allocate(&self, product_id: i64, quantity: i64) -> Result<Vec<String>, InventoryError> {
        self.inner.allocate(product_id, quantity).await
    }

    async fn release(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError> {
        self.inner.release(product_id, items).await
    }

    async fn restock(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError> {
        self.inner.restock(product_id, items).await
    }

    async fn set_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, InventoryError> {
        self.inner.set_enabled(product_id, enabled).await
    }

    async fn update_prices(
        &self,
        product_id: i64,
        price_fiat: FiatAmount,
        price_coins: Coins,
    ) -> Result<Product, InventoryError> {
        self.inner.update_prices(product_id, price_fiat, price_coins).await
    }
}

impl OrderManagement for FaultyDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        self.inner.insert_order(order).await
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
        note: Option<String>,
        delivered_items: Vec<String>,
    ) -> Result<Order, OrderStoreError> {
        self.inner.update_order_status(order_id, status, note, delivered_items).await
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderStoreError> {
        self.inner.fetch_order(order_id).await
    }

    async fn fetch_orders_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), OrderStoreError> {
        self.inner.fetch_orders_for_account(account_id, pagination).await
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        self.inner.search_orders(query).await
    }

    async fn fetch_pending_preorders(&self, product_id: i64) -> Result<Vec<Order>, OrderStoreError> {
        self.inner.fetch_pending_preorders(product_id).await
    }

    async fn sales_statistics(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<SalesStatistics, OrderStoreError> {
        self.inner.sales_statistics(since, until).await
    }
}

impl PaymentManagement for FaultyDatabase {
    async fn insert_payment(&self, payment: NewPaymentTransaction) -> Result<PaymentTransaction, PaymentStoreError> {
        self.inner.insert_payment(payment).await
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.inner.fetch_payment(payment_id).await
    }

    async fn fetch_payment_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.inner.fetch_payment_by_provider_id(provider_tx_id).await
    }

    async fn transition_payment_status(
        &self,
        provider_tx_id: &str,
        status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        self.inner.transition_payment_status(provider_tx_id, status, failure_reason).await
    }

    async fn link_order_to_payment(
        &self,
        payment_id: i64,
        order_id: i64,
    ) -> Result<PaymentTransaction, PaymentStoreError> {
        if self.failing_payment_links.load(Ordering::SeqCst) {
            return Err(PaymentStoreError::DatabaseError("database is locked".into()));
        }
        self.inner.link_order_to_payment(payment_id, order_id).await
    }

    async fn fetch_pending_payments(
        &self,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        self.inner.fetch_pending_payments(created_before).await
    }

    async fn fetch_payments_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        self.inner.fetch_payments_for_account(account_id, pagination).await
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        self.inner.fetch_payments_for_order(order_id).await
    }
}

impl ReferralManagement for FaultyDatabase {
    async fn insert_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        signup_bonus: Coins,
    ) -> Result<Option<Referral>, ReferralError> {
        self.inner.insert_referral(referrer_id, referred_id, signup_bonus).await
    }

    async fn claim_first_purchase_bonus(
        &self,
        referred_id: i64,
        bonus: Coins,
    ) -> Result<Option<Referral>, ReferralError> {
        self.inner.claim_first_purchase_bonus(referred_id, bonus).await
    }

    async fn fetch_referral_for_referred(&self, referred_id: i64) -> Result<Option<Referral>, ReferralError> {
        self.inner.fetch_referral_for_referred(referred_id).await
    }

    async fn fetch_referrals_for_referrer(
        &self,
        referrer_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<Referral>, ReferralError> {
        self.inner.fetch_referrals_for_referrer(referrer_id, pagination).await
    }

    async fn referral_statistics(&self, referrer_id: i64) -> Result<ReferralStatistics, ReferralError> {
        self.inner.referral_statistics(referrer_id).await
    }
}
