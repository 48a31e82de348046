use futures::future::BoxFuture;
use gamekey_engine::events::{EventHandlers, EventHooks, FulfillmentPendingEvent, RefundFailedEvent};
use log::*;

use crate::telegram::TelegramNotifier;

pub const ALERT_EVENT_BUFFER_SIZE: usize = 25;

/// Wires the operational alerts to the admin chat.
///
/// 1. FulfillmentPendingEvent - a customer paid the provider but did not get their goods.
/// 2. RefundFailedEvent - a compensating refund could not be written after every retry.
///
/// Both are already logged by the engine. If no admin chat is configured, the hooks do nothing further.
pub fn create_alert_event_handlers(notifier: TelegramNotifier) -> EventHandlers {
    let mut hooks = EventHooks::default();
    let notifier_clone = notifier.clone();
    hooks.on_fulfillment_pending(move |ev| {
        let text = fulfillment_pending_message(&ev);
        forward(notifier_clone.clone(), text)
    });
    hooks.on_refund_failed(move |ev| {
        let text = refund_failed_message(&ev);
        forward(notifier.clone(), text)
    });
    EventHandlers::new(ALERT_EVENT_BUFFER_SIZE, hooks)
}

fn forward(notifier: TelegramNotifier, text: String) -> BoxFuture<'static, ()> {
    let Some(chat_id) = notifier.admin_chat_id().map(String::from) else {
        return no_op();
    };
    Box::pin(async move {
        match notifier.send_text(&chat_id, &text).await {
            Ok(()) => debug!("🚨️ Alert forwarded to the admin chat"),
            Err(e) => error!("🚨️ Could not forward alert to the admin chat. {e}. Alert: {text}"),
        }
    })
}

pub fn fulfillment_pending_message(ev: &FulfillmentPendingEvent) -> String {
    let order = ev.order.as_ref().map(|o| format!("order #{}", o.id)).unwrap_or_else(|| "no order".to_string());
    format!(
        "🚨 Fulfilment pending\nPayment {} ({} {}) from account #{} was collected, but nothing was delivered ({order}).\n\
         Reason: {}",
        ev.payment.provider_tx_id, ev.payment.amount, ev.payment.currency, ev.payment.account_id, ev.reason
    )
}

pub fn refund_failed_message(ev: &RefundFailedEvent) -> String {
    let order = ev.order_id.map(|id| format!(" for order #{id}")).unwrap_or_default();
    format!(
        "🚨 Refund failed\nA refund of {} to account #{}{order} failed after {} attempts.\nLast error: {}",
        ev.amount, ev.account_id, ev.attempts, ev.last_error
    )
}

fn no_op() -> BoxFuture<'static, ()> {
    Box::pin(async {})
}

#[cfg(test)]
mod test {
    use gamekey_common::Coins;

    use super::*;

    #[test]
    fn refund_failure_message() {
        let ev = RefundFailedEvent {
            account_id: 7,
            order_id: Some(31),
            amount: Coins::from(60),
            attempts: 5,
            last_error: "database is locked".into(),
        };
        let text = refund_failed_message(&ev);
        assert!(text.contains("A refund of 60 GC to account #7 for order #31 failed after 5 attempts."));
        assert!(text.ends_with("Last error: database is locked"));
    }
}
