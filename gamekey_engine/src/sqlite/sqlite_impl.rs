//! `SqliteDatabase` is a concrete implementation of a GameKey store backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
//!
//! Every write method opens its own transaction and calls through to the functions in [`super::db`]. Those functions
//! are arranged so that the first statement of each transaction is a write, which is what makes the conditional
//! updates in `debit`, `allocate` and the status transitions safe under concurrent callers.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use gamekey_common::{Coins, FiatAmount};
use log::*;
use sqlx::{migrate::MigrateError, SqlitePool};

use super::db::{accounts, db_url, ledger, new_pool, orders, payments, products, referrals};
use crate::{
    db_types::{
        Account,
        LedgerEntry,
        LedgerEntryKind,
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
        RelatedEntity,
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
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using `GK_DATABASE_URL` (or the default) to locate the database.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date using the migrations embedded in the binary.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        debug!("🗃️ Migrations complete for {}", self.url);
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl StoreDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) {
        self.pool.close().await;
    }
}

impl AccountManagement for SqliteDatabase {
    async fn insert_account(&self, account: NewAccount) -> Result<(Account, bool), AccountApiError> {
        let mut tx = self.pool.begin().await?;
        let result = accounts::idempotent_insert(account, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account(account_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account_by_external_id(external_id, &mut conn).await?;
        Ok(account)
    }

    async fn fetch_account_by_referral_code(&self, code: &str) -> Result<Option<Account>, AccountApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = accounts::fetch_account_by_referral_code(code, &mut conn).await?;
        Ok(account)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn credit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = ledger::credit(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn debit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = ledger::debit(entry, &mut tx).await?;
        tx.commit().await?;
        Ok(result)
    }

    async fn fetch_balance(&self, account_id: i64) -> Result<Coins, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        ledger::fetch_balance(account_id, &mut conn).await
    }

    async fn fetch_ledger_entries(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let entries = ledger::fetch_entries(account_id, pagination, &mut conn).await?;
        Ok(entries)
    }

    async fn ledger_sum(&self, account_id: i64) -> Result<Coins, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let sum = ledger::ledger_sum(account_id, &mut conn).await?;
        Ok(sum)
    }

    async fn ledger_statistics(&self) -> Result<LedgerStatistics, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let stats = ledger::statistics(&mut conn).await?;
        Ok(stats)
    }
}

impl InventoryManagement for SqliteDatabase {
    async fn insert_product(&self, product: NewProduct) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let product = products::insert_product(product, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_products(&self, only_available: bool) -> Result<Vec<Product>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let products = products::fetch_products(only_available, &mut conn).await?;
        Ok(products)
    }

    async fn available_count(&self, product_id: i64) -> Result<i64, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let count = products::available_count(product_id, &mut conn).await?;
        Ok(count)
    }

    async fn fetch_stock(&self, product_id: i64) -> Result<Vec<String>, InventoryError> {
        let mut conn = self.pool.acquire().await?;
        let stock = products::fetch_stock(product_id, &mut conn).await?;
        Ok(stock)
    }

    /// Takes `quantity` items off the front of the stock. The `DELETE .. RETURNING` is the first statement of the
    /// transaction, so two concurrent allocations are serialised by SQLite's write lock and can never see the same
    /// rows. A short take is rolled back in full.
    async fn allocate(&self, product_id: i64, quantity: i64) -> Result<Vec<String>, InventoryError> {
        if quantity <= 0 {
            return Err(InventoryError::InvalidQuantity(quantity));
        }
        let mut tx = self.pool.begin().await?;
        let items = products::take_from_front(product_id, quantity, &mut tx).await?;
        if (items.len() as i64) < quantity {
            tx.rollback().await?;
            let mut conn = self.pool.acquire().await?;
            if products::fetch_product(product_id, &mut conn).await?.is_none() {
                return Err(InventoryError::ProductNotFound(product_id));
            }
            debug!("📦️ Product #{product_id} cannot cover {quantity} items. Only {} left.", items.len());
            return Err(InventoryError::InsufficientStock {
                product_id,
                requested: quantity,
                available: items.len() as i64,
            });
        }
        let product = products::refresh_availability(product_id, &mut tx).await?;
        tx.commit().await?;
        debug!("📦️ Allocated {quantity} items from product #{product_id}. Available: {}", product.is_available);
        Ok(items)
    }

    async fn release(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        products::lock_product(product_id, &mut tx).await?;
        products::prepend_items(product_id, items, &mut tx).await?;
        let product = products::refresh_availability(product_id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Released {} items back to the front of product #{product_id}", items.len());
        Ok(product)
    }

    async fn restock(&self, product_id: i64, items: &[String]) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        products::lock_product(product_id, &mut tx).await?;
        products::append_items(product_id, items, &mut tx).await?;
        let product = products::refresh_availability(product_id, &mut tx).await?;
        tx.commit().await?;
        info!("📦️ Restocked product #{product_id} with {} items", items.len());
        Ok(product)
    }

    async fn set_enabled(&self, product_id: i64, enabled: bool) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        products::set_enabled(product_id, enabled, &mut tx).await?;
        let product = products::refresh_availability(product_id, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }

    async fn update_prices(
        &self,
        product_id: i64,
        price_fiat: FiatAmount,
        price_coins: Coins,
    ) -> Result<Product, InventoryError> {
        let mut tx = self.pool.begin().await?;
        let product = products::update_prices(product_id, price_fiat, price_coins, &mut tx).await?;
        tx.commit().await?;
        Ok(product)
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
        note: Option<String>,
        delivered_items: Vec<String>,
    ) -> Result<Order, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_order_status(order_id, status, note, delivered_items, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order(order_id, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_orders_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_orders_for_account(account_id, pagination, &mut conn).await?;
        Ok(result)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::search_orders(query, &mut conn).await?;
        Ok(orders)
    }

    async fn fetch_pending_preorders(&self, product_id: i64) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let orders = orders::fetch_pending_preorders(product_id, &mut conn).await?;
        Ok(orders)
    }

    async fn sales_statistics(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<SalesStatistics, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::sales_statistics(since, until, &mut conn).await?;
        Ok(stats)
    }
}

impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPaymentTransaction) -> Result<PaymentTransaction, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::insert_payment(payment, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: i64) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_provider_id(
        &self,
        provider_tx_id: &str,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_provider_id(provider_tx_id, &mut conn).await?;
        Ok(payment)
    }

    async fn transition_payment_status(
        &self,
        provider_tx_id: &str,
        status: PaymentStatus,
        failure_reason: Option<String>,
    ) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::transition_status(provider_tx_id, status, failure_reason, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn link_order_to_payment(
        &self,
        payment_id: i64,
        order_id: i64,
    ) -> Result<PaymentTransaction, PaymentStoreError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::link_order(payment_id, order_id, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fetch_pending_payments(
        &self,
        created_before: Option<DateTime<Utc>>,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_pending_payments(created_before, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_payments_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_account(account_id, pagination, &mut conn).await?;
        Ok(payments)
    }

    async fn fetch_payments_for_order(&self, order_id: i64) -> Result<Vec<PaymentTransaction>, PaymentStoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_payments_for_order(order_id, &mut conn).await?;
        Ok(payments)
    }
}

impl ReferralManagement for SqliteDatabase {
    /// Records the referral, links the referred account to its referrer and pays the signup bonus, all in one
    /// transaction. Returns `None` (and changes nothing) if the account was already referred.
    async fn insert_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        signup_bonus: Coins,
    ) -> Result<Option<Referral>, ReferralError> {
        if referrer_id == referred_id {
            return Err(ReferralError::SelfReferral);
        }
        let mut tx = self.pool.begin().await?;
        let Some(mut referral) = referrals::insert_referral(referrer_id, referred_id, &mut tx).await? else {
            tx.rollback().await?;
            debug!("🤝️ Account #{referred_id} already has a referrer. Nothing to do.");
            return Ok(None);
        };
        if !accounts::set_referrer(referred_id, referrer_id, &mut tx).await? {
            return Err(ReferralError::AccountNotFound(referred_id));
        }
        if signup_bonus.is_positive() {
            let entry = NewLedgerEntry::new(
                referrer_id,
                signup_bonus,
                LedgerEntryKind::ReferralBonus,
                format!("Signup bonus for referring account #{referred_id}"),
            )
            .with_related(RelatedEntity::referral(referral.id));
            ledger::credit(entry, &mut tx).await?;
            referral = referrals::add_coins_earned(referral.id, signup_bonus, &mut tx).await?;
            accounts::add_referral_earnings(referrer_id, signup_bonus, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🤝️ Referral #{} recorded. Account #{referrer_id} earned {signup_bonus}", referral.id);
        Ok(Some(referral))
    }

    /// The flip of the pending/unpaid guard is the first statement, so a second caller finds nothing to claim.
    async fn claim_first_purchase_bonus(&self, referred_id: i64, bonus: Coins) -> Result<Option<Referral>, ReferralError> {
        let mut tx = self.pool.begin().await?;
        let Some(referral) = referrals::claim_first_purchase(referred_id, bonus, &mut tx).await? else {
            tx.rollback().await?;
            trace!("🤝️ No unpaid referral for account #{referred_id}");
            return Ok(None);
        };
        if bonus.is_positive() {
            let entry = NewLedgerEntry::new(
                referral.referrer_id,
                bonus,
                LedgerEntryKind::ReferralBonus,
                format!("First purchase bonus for referred account #{referred_id}"),
            )
            .with_related(RelatedEntity::referral(referral.id));
            ledger::credit(entry, &mut tx).await?;
            accounts::add_referral_earnings(referral.referrer_id, bonus, &mut tx).await?;
        }
        tx.commit().await?;
        info!("🤝️ Referral #{} completed. Account #{} earned {bonus}", referral.id, referral.referrer_id);
        Ok(Some(referral))
    }

    async fn fetch_referral_for_referred(&self, referred_id: i64) -> Result<Option<Referral>, ReferralError> {
        let mut conn = self.pool.acquire().await?;
        let referral = referrals::fetch_referral_for_referred(referred_id, &mut conn).await?;
        Ok(referral)
    }

    async fn fetch_referrals_for_referrer(
        &self,
        referrer_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<Referral>, ReferralError> {
        let mut conn = self.pool.acquire().await?;
        let referrals = referrals::fetch_referrals_for_referrer(referrer_id, pagination, &mut conn).await?;
        Ok(referrals)
    }

    async fn referral_statistics(&self, referrer_id: i64) -> Result<ReferralStatistics, ReferralError> {
        let mut conn = self.pool.acquire().await?;
        let stats = referrals::statistics(referrer_id, &mut conn).await?;
        Ok(stats)
    }
}
