use std::fmt::Debug;

use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType},
    helpers::Credential,
    traits::{OrderManagement, OrderQueryFilter, OrderStoreError, Pagination, SalesStatistics},
};

/// Read and write access to orders and their status history.
///
/// Status changes made here are raw: no refunds, deliveries or notifications happen. The purchase flow and admin
/// fulfilment go through [`crate::PurchaseApi`].
pub struct OrderStoreApi<B> {
    db: B,
}

impl<B: Debug> Debug for OrderStoreApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderStoreApi ({:?})", self.db)
    }
}

impl<B> OrderStoreApi<B>
where B: OrderManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn create(&self, order: NewOrder) -> Result<Order, OrderStoreError> {
        self.db.insert_order(order).await
    }

    pub async fn update_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
        note: Option<String>,
    ) -> Result<Order, OrderStoreError> {
        self.db.update_order_status(order_id, status, note, Vec::new()).await
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Option<Order>, OrderStoreError> {
        self.db.fetch_order(order_id).await
    }

    /// A page of the account's orders, newest first, with the total order count for the account.
    pub async fn orders_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), OrderStoreError> {
        self.db.fetch_orders_for_account(account_id, pagination).await
    }

    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError> {
        self.db.search_orders(query).await
    }

    pub async fn pending_preorders(&self, product_id: i64) -> Result<Vec<Order>, OrderStoreError> {
        self.db.fetch_pending_preorders(product_id).await
    }

    /// The delivered items of an order, ready for display.
    pub async fn delivered_credentials(&self, order_id: i64) -> Result<Vec<Credential>, OrderStoreError> {
        let order = self.db.fetch_order(order_id).await?.ok_or(OrderStoreError::OrderNotFound(order_id))?;
        Ok(order.delivered_items.iter().map(|s| Credential::parse(s)).collect())
    }

    pub async fn sales_statistics(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<SalesStatistics, OrderStoreError> {
        self.db.sales_statistics(since, until).await
    }
}
