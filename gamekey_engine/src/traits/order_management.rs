use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType},
    traits::{OrderQueryFilter, Pagination, SalesStatistics},
};

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(i64),
    #[error("The requested order change would result in a no-op.")]
    OrderModificationNoOp,
    #[error("Order {id} cannot move from {from} to {to}.")]
    OrderModificationForbidden { id: i64, from: OrderStatusType, to: OrderStatusType },
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}

/// Behaviour for storing orders and their status history.
///
/// Status transitions are monotone: `Pending` may move to `Completed` or `Cancelled`, and nothing ever leaves
/// `Completed` or `Cancelled`.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Stores a new order in `Pending` status.
    ///
    /// The total amount is computed here, once, as `quantity * unit_price`. An initial status-history entry is written
    /// in the same transaction.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, OrderStoreError>;

    /// Moves an order to a new status, appending a status-history entry and (for `Completed`) stamping `completed_at`
    /// and recording the delivered items, all in a single atomic update.
    ///
    /// | From \ To | Pending | Completed | Cancelled |
    /// |-----------|---------|-----------|-----------|
    /// | Pending   | NoOp    | Ok        | Ok        |
    /// | Completed | Err     | NoOp      | Err       |
    /// | Cancelled | Err     | Err       | NoOp      |
    async fn update_order_status(
        &self,
        order_id: i64,
        status: OrderStatusType,
        note: Option<String>,
        delivered_items: Vec<String>,
    ) -> Result<Order, OrderStoreError>;

    /// Fetches the order, including its status history. If no order exists, `None` is returned.
    async fn fetch_order(&self, order_id: i64) -> Result<Option<Order>, OrderStoreError>;

    /// A page of the account's orders, newest first, along with the total number of orders the account has.
    async fn fetch_orders_for_account(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<(Vec<Order>, i64), OrderStoreError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`, oldest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, OrderStoreError>;

    /// Pending preorders for the product, in the order they were placed.
    async fn fetch_pending_preorders(&self, product_id: i64) -> Result<Vec<Order>, OrderStoreError>;

    /// Totals for completed orders, optionally restricted to orders created in the given window.
    async fn sales_statistics(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<SalesStatistics, OrderStoreError>;
}
