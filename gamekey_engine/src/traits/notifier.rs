use std::fmt::Display;

use gamekey_common::Coins;
use thiserror::Error;

use crate::helpers::Credential;

#[derive(Debug, Clone, Error)]
pub enum NotifierError {
    #[error("Could not deliver message to {recipient}: {reason}")]
    DeliveryFailed { recipient: String, reason: String },
    #[error("Notifier is not configured: {0}")]
    NotConfigured(String),
}

/// A customer-facing message produced by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    OrderDelivered { order_id: i64, product_name: String, items: Vec<String> },
    PreorderPlaced { order_id: i64, product_name: String, note: Option<String> },
    /// Payment was taken but the goods could not be handed out automatically. Staff will follow up.
    AwaitingFulfillment { order_id: i64, product_name: String },
    OrderCancelled { order_id: i64, reason: String, refunded: Option<Coins> },
    PaymentFailed { provider_tx_id: String, reason: String },
    CoinsCredited { amount: Coins, balance: Coins },
}

impl Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::OrderDelivered { order_id, product_name, items } => {
                writeln!(f, "Order #{order_id} is complete. Your {product_name}:")?;
                for (i, item) in items.iter().enumerate() {
                    writeln!(f, "{}. {}", i + 1, Credential::parse(item))?;
                }
                Ok(())
            },
            Notification::PreorderPlaced { order_id, product_name, note } => {
                write!(f, "Preorder #{order_id} for {product_name} is confirmed. We will deliver as soon as it is back in stock.")?;
                if let Some(note) = note {
                    write!(f, " {note}")?;
                }
                Ok(())
            },
            Notification::AwaitingFulfillment { order_id, product_name } => write!(
                f,
                "Payment for order #{order_id} ({product_name}) was received. Delivery is delayed and our team has been \
                 notified."
            ),
            Notification::OrderCancelled { order_id, reason, refunded } => {
                write!(f, "Order #{order_id} was cancelled: {reason}.")?;
                if let Some(amount) = refunded {
                    write!(f, " {amount} has been returned to your balance.")?;
                }
                Ok(())
            },
            Notification::PaymentFailed { provider_tx_id, reason } => {
                write!(f, "Payment {provider_tx_id} did not go through ({reason}). You have not been charged by us.")
            },
            Notification::CoinsCredited { amount, balance } => {
                write!(f, "{amount} has been added to your balance. New balance: {balance}.")
            },
        }
    }
}

/// An outbound messaging sink.
///
/// Delivery is fire-and-forget and at-least-once. The engine logs failures and carries on; any retry policy belongs
/// to the transport.
#[allow(async_fn_in_trait)]
pub trait Notifier {
    async fn notify(&self, recipient: &str, notification: &Notification) -> Result<(), NotifierError>;
}
