use std::fmt::Display;

use chrono::{DateTime, Utc};
use gamekey_common::Coins;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::db_types::{LedgerEntryKind, OrderKind, OrderStatusType};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

//--------------------------------------      Pagination      ---------------------------------------------------------
/// One-based page selection for history-style queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, page_size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    /// Out-of-range values are clamped: pages start at 1 and page sizes are between 1 and [`MAX_PAGE_SIZE`].
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page: page.max(1), page_size: page_size.clamp(1, MAX_PAGE_SIZE) }
    }

    pub fn limit(&self) -> i64 {
        self.page_size.clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1) * self.limit()
    }
}

//--------------------------------------   OrderQueryFilter   ---------------------------------------------------------
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub account_id: Option<i64>,
    pub product_id: Option<i64>,
    pub kind: Option<OrderKind>,
    pub currency: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub status: Option<Vec<OrderStatusType>>,
}

impl OrderQueryFilter {
    pub fn with_account_id(mut self, account_id: i64) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_product_id(mut self, product_id: i64) -> Self {
        self.product_id = Some(product_id);
        self
    }

    pub fn with_kind(mut self, kind: OrderKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_currency<S: Into<String>>(mut self, currency: S) -> Self {
        self.currency = Some(currency.into());
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.account_id.is_none() &&
            self.product_id.is_none() &&
            self.kind.is_none() &&
            self.currency.is_none() &&
            self.status.as_ref().map(|s| s.is_empty()).unwrap_or(true) &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No filters.");
        }
        if let Some(id) = self.account_id {
            write!(f, "account_id: {id}. ")?;
        }
        if let Some(id) = self.product_id {
            write!(f, "product_id: {id}. ")?;
        }
        if let Some(kind) = self.kind {
            write!(f, "kind: {kind}. ")?;
        }
        if let Some(currency) = &self.currency {
            write!(f, "currency: {currency}. ")?;
        }
        if let Some(statuses) = &self.status {
            let s = statuses.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(",");
            write!(f, "status: {s}. ")?;
        }
        if let Some(since) = self.since {
            write!(f, "since: {since}. ")?;
        }
        if let Some(until) = self.until {
            write!(f, "until: {until}. ")?;
        }
        Ok(())
    }
}

//--------------------------------------    Sales statistics   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub orders: i64,
    pub total_amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ProductSales {
    pub product_id: i64,
    pub product_name: String,
    pub currency: String,
    pub orders: i64,
    pub quantity: i64,
    pub total_amount: i64,
}

/// Totals for completed orders. Amounts are only ever summed within a currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesStatistics {
    pub total_orders: i64,
    pub totals: Vec<CurrencyTotal>,
    pub products: Vec<ProductSales>,
}

//--------------------------------------   Ledger statistics   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerKindTotal {
    pub kind: LedgerEntryKind,
    pub entries: i64,
    /// The signed sum of all entries of this kind.
    pub amount: Coins,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerStatistics {
    /// The number of distinct accounts with at least one ledger entry.
    pub accounts: i64,
    /// The sum of all credits.
    pub total_issued: Coins,
    /// The magnitude of the sum of all debits.
    pub total_spent: Coins,
    pub by_kind: Vec<LedgerKindTotal>,
}

impl LedgerStatistics {
    /// Coins currently held across all balances.
    pub fn outstanding(&self) -> Coins {
        self.total_issued - self.total_spent
    }
}

//--------------------------------------  Referral statistics  --------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ReferralStatistics {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub coins_earned: Coins,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pagination_offsets() {
        assert_eq!(Pagination::default().offset(), 0);
        assert_eq!(Pagination::new(3, 20).offset(), 40);
        let p = Pagination::new(0, 0);
        assert_eq!((p.page, p.limit(), p.offset()), (1, 1, 0));
        assert_eq!(Pagination::new(1, 1000).limit(), MAX_PAGE_SIZE);
    }

    #[test]
    fn order_filter() {
        let filter = OrderQueryFilter::default();
        assert!(filter.is_empty());
        assert_eq!(filter.to_string(), "No filters.");
        let filter = filter
            .with_product_id(4)
            .with_status(OrderStatusType::Pending)
            .with_status(OrderStatusType::Completed)
            .with_kind(OrderKind::Preorder);
        assert!(!filter.is_empty());
        assert_eq!(filter.status.as_ref().map(Vec::len), Some(2));
        assert_eq!(filter.to_string(), "product_id: 4. kind: Preorder. status: Pending,Completed. ");
    }
}
