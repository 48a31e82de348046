use gamekey_common::Coins;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PaymentTransaction};

/// An order reached `Completed` and its items were handed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCompletedEvent {
    pub order: Order,
    pub items: Vec<String>,
}

impl OrderCompletedEvent {
    pub fn new(order: Order, items: Vec<String>) -> Self {
        Self { order, items }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub reason: String,
    /// The coins returned to the customer, for coin-paid orders.
    pub refunded: Option<Coins>,
}

impl OrderAnnulledEvent {
    pub fn new<S: Into<String>>(order: Order, reason: S, refunded: Option<Coins>) -> Self {
        Self { order, reason: reason.into(), refunded }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreorderPlacedEvent {
    pub order: Order,
}

/// Money was collected by the payment provider, but the customer has not received their goods. Someone has to sort
/// this out by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillmentPendingEvent {
    pub payment: PaymentTransaction,
    pub order: Option<Order>,
    pub reason: String,
}

/// A compensating refund could not be written after every retry. The customer is out of pocket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundFailedEvent {
    pub account_id: i64,
    pub order_id: Option<i64>,
    pub amount: Coins,
    pub attempts: u32,
    pub last_error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderCompleted(OrderCompletedEvent),
    OrderAnnulled(OrderAnnulledEvent),
    PreorderPlaced(PreorderPlacedEvent),
    FulfillmentPending(FulfillmentPendingEvent),
    RefundFailed(RefundFailedEvent),
}
