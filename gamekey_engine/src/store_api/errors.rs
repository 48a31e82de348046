use gamekey_common::Coins;
use thiserror::Error;

use crate::traits::{
    AccountApiError,
    InventoryError,
    LedgerError,
    OrderStoreError,
    PaymentProviderError,
    PaymentStoreError,
    ReferralError,
};

/// The outcome of a rejected or failed purchase, in terms a chat transport can turn into a message.
///
/// Business-rule rejections carry enough detail to explain themselves. `Internal` covers storage and delivery
/// failures; its message is for the logs, not for customers.
#[derive(Debug, Clone, Error)]
pub enum PurchaseError {
    #[error("Product {0} does not exist")]
    ProductNotFound(i64),
    #[error("Product {0} is not available for purchase")]
    ProductUnavailable(i64),
    #[error("Account {0} does not exist")]
    AccountNotFound(i64),
    #[error("Account {account_id} cannot cover {required}")]
    InsufficientFunds { account_id: i64, required: Coins },
    #[error("Product {product_id} has {available} items in stock, but {requested} were requested")]
    InsufficientStock { product_id: i64, requested: i64, available: i64 },
    #[error("Invalid purchase request: {0}")]
    Validation(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(i64),
    #[error("Order cannot be modified: {0}")]
    OrderModificationForbidden(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<LedgerError> for PurchaseError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(id) => PurchaseError::AccountNotFound(id),
            LedgerError::InsufficientFunds { account_id, requested } => {
                PurchaseError::InsufficientFunds { account_id, required: requested }
            },
            LedgerError::InvalidAmount(a) => PurchaseError::Validation(format!("Invalid amount {a}")),
            LedgerError::DatabaseError(s) => PurchaseError::Internal(s),
        }
    }
}

impl From<InventoryError> for PurchaseError {
    fn from(e: InventoryError) -> Self {
        match e {
            InventoryError::ProductNotFound(id) => PurchaseError::ProductNotFound(id),
            InventoryError::InsufficientStock { product_id, requested, available } => {
                PurchaseError::InsufficientStock { product_id, requested, available }
            },
            InventoryError::InvalidQuantity(q) => PurchaseError::Validation(format!("Invalid quantity {q}")),
            InventoryError::InvalidPrice(s) => PurchaseError::Validation(s),
            InventoryError::DatabaseError(s) => PurchaseError::Internal(s),
        }
    }
}

impl From<OrderStoreError> for PurchaseError {
    fn from(e: OrderStoreError) -> Self {
        match e {
            OrderStoreError::OrderNotFound(id) => PurchaseError::OrderNotFound(id),
            OrderStoreError::InvalidOrder(s) => PurchaseError::Validation(s),
            e @ OrderStoreError::OrderModificationNoOp => PurchaseError::OrderModificationForbidden(e.to_string()),
            e @ OrderStoreError::OrderModificationForbidden { .. } => {
                PurchaseError::OrderModificationForbidden(e.to_string())
            },
            OrderStoreError::DatabaseError(s) => PurchaseError::Internal(s),
        }
    }
}

impl From<AccountApiError> for PurchaseError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::AccountNotFound(id) => PurchaseError::AccountNotFound(id),
            e => PurchaseError::Internal(e.to_string()),
        }
    }
}

impl From<PaymentStoreError> for PurchaseError {
    fn from(e: PaymentStoreError) -> Self {
        PurchaseError::Internal(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconcileError {
    #[error("No payment exists for provider transaction id {0}")]
    PaymentNotFound(String),
    #[error("Checkout rejected: {0}")]
    CheckoutRejected(#[from] PurchaseError),
    #[error("Payment provider error: {0}")]
    ProviderError(#[from] PaymentProviderError),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<PaymentStoreError> for ReconcileError {
    fn from(e: PaymentStoreError) -> Self {
        match e {
            PaymentStoreError::PaymentNotFound(id) => ReconcileError::PaymentNotFound(id),
            e => ReconcileError::DatabaseError(e.to_string()),
        }
    }
}

impl From<OrderStoreError> for ReconcileError {
    fn from(e: OrderStoreError) -> Self {
        ReconcileError::DatabaseError(e.to_string())
    }
}

impl From<AccountApiError> for ReconcileError {
    fn from(e: AccountApiError) -> Self {
        ReconcileError::DatabaseError(e.to_string())
    }
}

impl From<InventoryError> for ReconcileError {
    fn from(e: InventoryError) -> Self {
        ReconcileError::CheckoutRejected(e.into())
    }
}

impl From<ReferralError> for PurchaseError {
    fn from(e: ReferralError) -> Self {
        PurchaseError::Internal(e.to_string())
    }
}
