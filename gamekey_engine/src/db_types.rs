use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
pub use gamekey_common::{Coins, FiatAmount, COIN_CURRENCY_CODE};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Conversion error: {0}")]
pub struct ConversionError(String);

//--------------------------------------       Account        ---------------------------------------------------------
/// A registered storefront customer.
///
/// `balance` is a cached running total of the account's ledger entries. It is only ever changed in the same database
/// transaction that appends the corresponding [`LedgerEntry`].
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    /// The identity assigned by the chat platform, e.g. a Telegram user id.
    pub external_id: String,
    pub username: Option<String>,
    pub balance: Coins,
    pub referral_code: String,
    pub referrer_id: Option<i64>,
    pub referral_earnings: Coins,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub external_id: String,
    pub username: Option<String>,
    pub referral_code: String,
}

impl NewAccount {
    pub fn new<S: Into<String>>(external_id: S, referral_code: S) -> Self {
        Self { external_id: external_id.into(), username: None, referral_code: referral_code.into() }
    }

    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }
}

//--------------------------------------   LedgerEntryKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum LedgerEntryKind {
    /// Coins bought with an external payment.
    PurchaseOfCoins,
    /// Coins spent on a catalog product.
    ProductPurchase,
    ReferralBonus,
    AdminAdjustment,
    /// Coins returned after a purchase could not be fulfilled, or was cancelled.
    Refund,
}

impl Display for LedgerEntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryKind::PurchaseOfCoins => write!(f, "PurchaseOfCoins"),
            LedgerEntryKind::ProductPurchase => write!(f, "ProductPurchase"),
            LedgerEntryKind::ReferralBonus => write!(f, "ReferralBonus"),
            LedgerEntryKind::AdminAdjustment => write!(f, "AdminAdjustment"),
            LedgerEntryKind::Refund => write!(f, "Refund"),
        }
    }
}

impl FromStr for LedgerEntryKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PurchaseOfCoins" => Ok(Self::PurchaseOfCoins),
            "ProductPurchase" => Ok(Self::ProductPurchase),
            "ReferralBonus" => Ok(Self::ReferralBonus),
            "AdminAdjustment" => Ok(Self::AdminAdjustment),
            "Refund" => Ok(Self::Refund),
            s => Err(ConversionError(format!("Invalid ledger entry kind: {s}"))),
        }
    }
}

//--------------------------------------    RelatedEntity     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RelatedEntityType {
    Order,
    Payment,
    Referral,
}

/// An optional back-reference from a ledger entry to the record that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEntity {
    pub entity_type: RelatedEntityType,
    pub id: i64,
}

impl RelatedEntity {
    pub fn order(id: i64) -> Self {
        Self { entity_type: RelatedEntityType::Order, id }
    }

    pub fn payment(id: i64) -> Self {
        Self { entity_type: RelatedEntityType::Payment, id }
    }

    pub fn referral(id: i64) -> Self {
        Self { entity_type: RelatedEntityType::Referral, id }
    }
}

//--------------------------------------     LedgerEntry      ---------------------------------------------------------
/// An immutable record of a single balance change. Entries are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub account_id: i64,
    /// Positive for credits, negative for debits.
    pub amount: Coins,
    pub kind: LedgerEntryKind,
    pub description: String,
    pub related_type: Option<RelatedEntityType>,
    pub related_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn related(&self) -> Option<RelatedEntity> {
        match (self.related_type, self.related_id) {
            (Some(entity_type), Some(id)) => Some(RelatedEntity { entity_type, id }),
            _ => None,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount.is_positive()
    }
}

/// A balance change request. `amount` is always the (positive) magnitude. The direction comes from the ledger call
/// that consumes it.
#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub account_id: i64,
    pub amount: Coins,
    pub kind: LedgerEntryKind,
    pub description: String,
    pub related: Option<RelatedEntity>,
}

impl NewLedgerEntry {
    pub fn new<S: Into<String>>(account_id: i64, amount: Coins, kind: LedgerEntryKind, description: S) -> Self {
        Self { account_id, amount, kind, description: description.into(), related: None }
    }

    pub fn with_related(mut self, related: RelatedEntity) -> Self {
        self.related = Some(related);
        self
    }
}

//--------------------------------------       Product        ---------------------------------------------------------
/// A catalog item. The allocatable stock lives in its own table and is not part of this record; use
/// `InventoryManagement::available_count` for the authoritative count.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Price in minor units of `fiat_currency`.
    pub price_fiat: FiatAmount,
    pub fiat_currency: String,
    pub price_coins: Coins,
    /// `false` when an admin has forced the product off sale, regardless of stock.
    pub is_enabled: bool,
    /// Derived: `is_enabled` and the stock is non-empty. Recomputed whenever the stock changes.
    pub is_available: bool,
    pub allow_preorder: bool,
    pub preorder_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price_fiat: FiatAmount,
    pub fiat_currency: String,
    pub price_coins: Coins,
    pub allow_preorder: bool,
    pub preorder_note: Option<String>,
    /// The initial stock, front first.
    pub stock: Vec<String>,
}

impl NewProduct {
    pub fn new<S: Into<String>>(name: S, price_fiat: FiatAmount, price_coins: Coins) -> Self {
        Self {
            name: name.into(),
            description: None,
            category: None,
            price_fiat,
            fiat_currency: "USD".to_string(),
            price_coins,
            allow_preorder: false,
            preorder_note: None,
            stock: Vec::new(),
        }
    }

    pub fn with_stock<S: Into<String>>(mut self, items: Vec<S>) -> Self {
        self.stock = items.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_preorders<S: Into<String>>(mut self, note: Option<S>) -> Self {
        self.allow_preorder = true;
        self.preorder_note = note.map(Into::into);
        self
    }

    pub fn with_category<S: Into<String>>(mut self, category: S) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = Some(description.into());
        self
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Funds are secured but the goods have not been delivered yet. Preorders wait here for stock.
    Pending,
    /// Inventory was allocated and delivery attempted.
    Completed,
    /// The order was annulled. Coin-paid orders are refunded when they are cancelled.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_final(&self) -> bool {
        !matches!(self, OrderStatusType::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      OrderKind       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderKind {
    Purchase,
    Preorder,
}

impl Display for OrderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderKind::Purchase => write!(f, "Purchase"),
            OrderKind::Preorder => write!(f, "Preorder"),
        }
    }
}

//--------------------------------------  StatusHistoryEntry   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub order_id: i64,
    pub status: OrderStatusType,
    pub note: Option<String>,
    /// The content handed out by the transition this entry records, if any.
    pub delivered_items: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------        Order         ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub account_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Frozen at creation time. In coins for balance purchases, or minor units of `currency` for external payments.
    pub unit_price: i64,
    /// Always `quantity * unit_price`, computed once at creation.
    pub total_amount: i64,
    pub currency: String,
    pub kind: OrderKind,
    pub status: OrderStatusType,
    pub customer_note: Option<String>,
    /// Set when the order was paid through an external payment provider.
    pub payment_id: Option<i64>,
    pub delivered_items: Json<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[sqlx(skip)]
    pub status_history: Vec<StatusHistoryEntry>,
}

impl Order {
    /// True if the order was paid from the coin balance, and so must be refunded through the ledger if it is annulled.
    pub fn is_coin_paid(&self) -> bool {
        self.payment_id.is_none() && self.currency == COIN_CURRENCY_CODE
    }

    pub fn total_coins(&self) -> Coins {
        Coins::from(self.total_amount)
    }
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    pub account_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub unit_price: i64,
    pub currency: String,
    pub kind: OrderKind,
    pub customer_note: Option<String>,
    pub payment_id: Option<i64>,
}

impl NewOrder {
    /// A new order paid from the coin balance.
    pub fn for_coins(account_id: i64, product_id: i64, quantity: i64, unit_price: Coins, kind: OrderKind) -> Self {
        Self {
            account_id,
            product_id,
            quantity,
            unit_price: unit_price.value(),
            currency: COIN_CURRENCY_CODE.to_string(),
            kind,
            customer_note: None,
            payment_id: None,
        }
    }

    /// A new order paid through the external payment with the given id.
    pub fn for_external_payment(
        account_id: i64,
        product_id: i64,
        quantity: i64,
        unit_price: FiatAmount,
        currency: &str,
        kind: OrderKind,
        payment_id: i64,
    ) -> Self {
        Self {
            account_id,
            product_id,
            quantity,
            unit_price: unit_price.cents(),
            currency: currency.to_string(),
            kind,
            customer_note: None,
            payment_id: Some(payment_id),
        }
    }

    pub fn with_note<S: Into<String>>(mut self, note: Option<S>) -> Self {
        self.customer_note = note.map(Into::into);
        self
    }
}

//--------------------------------------    PaymentStatus     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
            PaymentStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentIntent     ---------------------------------------------------------
/// What the customer was buying when they were sent off to the payment provider. This is stored with the payment so
/// that the purchase can be resumed when the provider reports back, possibly much later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentIntent {
    ProductPurchase {
        account_id: i64,
        product_id: i64,
        quantity: i64,
        /// Minor units of the payment currency, frozen when the checkout was created.
        unit_price: FiatAmount,
        is_preorder: bool,
    },
    CoinTopUp {
        account_id: i64,
        coins: Coins,
    },
}

impl PaymentIntent {
    pub fn account_id(&self) -> i64 {
        match self {
            PaymentIntent::ProductPurchase { account_id, .. } => *account_id,
            PaymentIntent::CoinTopUp { account_id, .. } => *account_id,
        }
    }
}

//--------------------------------------  PaymentTransaction   --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: i64,
    pub account_id: i64,
    /// Empty until the order is created on provider confirmation.
    pub order_id: Option<i64>,
    pub provider: String,
    pub provider_tx_id: String,
    pub amount: FiatAmount,
    pub currency: String,
    pub status: PaymentStatus,
    pub pay_url: Option<String>,
    pub metadata: Json<PaymentIntent>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentTransaction {
    pub fn intent(&self) -> &PaymentIntent {
        &self.metadata
    }
}

#[derive(Debug, Clone)]
pub struct NewPaymentTransaction {
    pub account_id: i64,
    pub provider: String,
    pub provider_tx_id: String,
    pub amount: FiatAmount,
    pub currency: String,
    pub pay_url: Option<String>,
    pub intent: PaymentIntent,
}

//--------------------------------------    ReferralStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ReferralStatus {
    /// The referred account has signed up but not completed a purchase yet.
    Pending,
    Completed,
    Cancelled,
}

impl Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferralStatus::Pending => write!(f, "Pending"),
            ReferralStatus::Completed => write!(f, "Completed"),
            ReferralStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

//--------------------------------------       Referral       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_id: i64,
    pub coins_earned: Coins,
    pub status: ReferralStatus,
    pub first_purchase_paid: bool,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip_through_strings() {
        for s in [OrderStatusType::Pending, OrderStatusType::Completed, OrderStatusType::Cancelled] {
            assert_eq!(s.to_string().parse::<OrderStatusType>().unwrap(), s);
        }
        assert!("Paid".parse::<OrderStatusType>().is_err());
        assert!("completed".parse::<PaymentStatus>().is_err());
    }

    #[test]
    fn payment_intent_json_shape() {
        let intent = PaymentIntent::ProductPurchase {
            account_id: 1,
            product_id: 2,
            quantity: 3,
            unit_price: FiatAmount::from_cents(499),
            is_preorder: false,
        };
        let json = serde_json::to_value(&intent).unwrap();
        assert_eq!(json["type"], "product_purchase");
        assert_eq!(json["unit_price"], 499);
        let top_up: PaymentIntent =
            serde_json::from_str(r#"{"type":"coin_top_up","account_id":7,"coins":250}"#).unwrap();
        assert_eq!(top_up, PaymentIntent::CoinTopUp { account_id: 7, coins: Coins::from(250) });
        assert_eq!(top_up.account_id(), 7);
    }

    #[test]
    fn terminal_payment_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
        assert!(PaymentStatus::Cancelled.is_terminal());
    }
}
