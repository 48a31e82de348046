use gamekey_common::{Coins, FiatAmount};
use serde::{Deserialize, Serialize};

use crate::db_types::{Account, Order, PaymentTransaction};

/// How a purchase is being paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMode {
    /// Debit the coin balance. The debit happens before the order is created.
    Balance,
    /// The money has already been collected by an external provider. No ledger movement takes place, and the order
    /// records the fiat price that was paid.
    External { payment_id: i64, unit_price: FiatAmount, currency: String, is_preorder: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub account_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub note: Option<String>,
    pub mode: PaymentMode,
}

impl PurchaseRequest {
    pub fn with_balance(account_id: i64, product_id: i64, quantity: i64) -> Self {
        Self { account_id, product_id, quantity, note: None, mode: PaymentMode::Balance }
    }

    pub fn with_note<S: Into<String>>(mut self, note: S) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PurchaseOutcome {
    /// Stock was allocated and the order is complete.
    Completed { order: Order, items: Vec<String> },
    /// The product was out of stock. The order waits in `Pending` for the next restock.
    Preordered { order: Order },
    /// Externally paid, but the stock ran out before it could be allocated. The order was cancelled and a
    /// fulfilment alert raised.
    AwaitingFulfillment { order: Order },
}

impl PurchaseOutcome {
    pub fn order(&self) -> &Order {
        match self {
            PurchaseOutcome::Completed { order, .. } => order,
            PurchaseOutcome::Preordered { order } => order,
            PurchaseOutcome::AwaitingFulfillment { order } => order,
        }
    }
}

/// What a replenishment pass did with the pending preorders of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplenishmentResult {
    pub fulfilled: Vec<Order>,
    /// Preorders that lost a race for the new stock and were annulled.
    pub cancelled: Vec<Order>,
    /// Preorders still waiting after the pass.
    pub still_pending: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReconcileOutcome {
    /// The provider still reports the payment as pending. Nothing changed.
    StillPending,
    /// The payment had already reached a final state. Nothing changed.
    AlreadyProcessed,
    Fulfilled(PurchaseOutcome),
    CoinsCredited { account: Account, amount: Coins },
    /// The payment completed, but the goods could not be handed out. An alert has been raised.
    FulfillmentPending { payment: PaymentTransaction, reason: String },
    PaymentFailed { payment: PaymentTransaction, cancelled_order: Option<Order> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    pub account: Account,
    pub is_new: bool,
    /// True if a referral was recorded during this registration.
    pub referred: bool,
}
