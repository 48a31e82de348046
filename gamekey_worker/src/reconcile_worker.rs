use std::time::Duration as StdDuration;

use chrono::Duration;
use gamekey_engine::{
    db_types::PaymentTransaction,
    store_api::ReconcileOutcome,
    traits::{Notifier, PaymentProvider},
    ReconcilerApi,
    SqliteDatabase,
    StoreDatabase,
};
use log::*;
use tokio::task::JoinHandle;

use crate::{nowpayments::NowPaymentsProvider, telegram::TelegramNotifier};

pub type WorkerReconciler = ReconcilerApi<SqliteDatabase, TelegramNotifier, NowPaymentsProvider>;

/// What a single pass over the pending payments achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSummary {
    pub checked: usize,
    pub changed: usize,
    pub errors: usize,
    pub expired: usize,
}

/// Starts the payment poller. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_payment_poller(api: WorkerReconciler, interval: StdDuration, stale_after: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        info!("🕰️ Payment poller started. Checking every {}s.", interval.as_secs());
        loop {
            timer.tick().await;
            trace!("🕰️ Running payment poll");
            let summary = poll_once(&api, stale_after).await;
            if summary.changed > 0 || summary.errors > 0 || summary.expired > 0 {
                info!(
                    "🕰️ Payment poll: {} checked, {} changed, {} expired, {} errors",
                    summary.checked, summary.changed, summary.expired, summary.errors
                );
            }
        }
    })
}

/// Asks the provider about every pending payment, applies what it reports, then expires whatever has been pending for
/// longer than `stale_after`. Failures are logged and counted; they never stop the pass.
pub async fn poll_once<B, N, P>(api: &ReconcilerApi<B, N, P>, stale_after: Duration) -> PollSummary
where
    B: StoreDatabase,
    N: Notifier,
    P: PaymentProvider,
{
    let mut summary = PollSummary::default();
    let pending = match api.pending_payments().await {
        Ok(p) => p,
        Err(e) => {
            error!("🕰️ Could not fetch pending payments. {e}");
            summary.errors += 1;
            return summary;
        },
    };
    for payment in pending {
        summary.checked += 1;
        match api.sync_with_provider(&payment.provider_tx_id).await {
            Ok(ReconcileOutcome::StillPending) | Ok(ReconcileOutcome::AlreadyProcessed) => {},
            Ok(outcome) => {
                summary.changed += 1;
                debug!("🕰️ Payment {}: {}", payment.provider_tx_id, describe(&outcome));
            },
            Err(e) => {
                summary.errors += 1;
                warn!("🕰️ Could not sync payment {} with the provider. {e}", payment.provider_tx_id);
            },
        }
    }
    match api.expire_stale_payments(stale_after).await {
        Ok(expired) => {
            summary.expired = expired.len();
            if !expired.is_empty() {
                debug!("🕰️ Expired payments: {}", payment_list(&expired));
            }
        },
        Err(e) => {
            summary.errors += 1;
            error!("🕰️ Error expiring stale payments. {e}");
        },
    }
    summary
}

fn describe(outcome: &ReconcileOutcome) -> String {
    match outcome {
        ReconcileOutcome::StillPending => "still pending".into(),
        ReconcileOutcome::AlreadyProcessed => "already processed".into(),
        ReconcileOutcome::Fulfilled(o) => format!("order #{} created", o.order().id),
        ReconcileOutcome::CoinsCredited { account, amount } => format!("{amount} credited to account #{}", account.id),
        ReconcileOutcome::FulfillmentPending { reason, .. } => format!("fulfilment pending ({reason})"),
        ReconcileOutcome::PaymentFailed { payment, .. } => format!("closed as {}", payment.status),
    }
}

fn payment_list(payments: &[PaymentTransaction]) -> String {
    payments
        .iter()
        .map(|p| format!("[{}] {} account: {}", p.id, p.provider_tx_id, p.account_id))
        .collect::<Vec<String>>()
        .join(", ")
}
