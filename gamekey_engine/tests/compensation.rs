use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use futures_util::FutureExt;
use gamekey_common::{Coins, FiatAmount};
use gamekey_engine::{
    db_types::{LedgerEntryKind, NewAccount, NewLedgerEntry, NewProduct, OrderStatusType, PaymentStatus},
    events::{EventHandlers, EventHooks, FulfillmentPendingEvent, RefundFailedEvent},
    store_api::PurchaseRequest,
    test_utils::{prepare_test_env, random_db_path, FaultyDatabase, RecordingNotifier, StubPaymentProvider},
    traits::{AccountManagement, InventoryManagement, LedgerManagement, PaymentManagement},
    PurchaseApi,
    PurchaseConfig,
    ReconcilerApi,
    ReferralApi,
    ReferralConfig,
    SqliteDatabase,
};

#[derive(Default, Clone)]
struct Alerts {
    refunds: Arc<Mutex<Vec<RefundFailedEvent>>>,
    fulfillments: Arc<Mutex<Vec<FulfillmentPendingEvent>>>,
}

impl Alerts {
    fn refunds(&self) -> Vec<RefundFailedEvent> {
        self.refunds.lock().unwrap().clone()
    }

    fn fulfillments(&self) -> Vec<FulfillmentPendingEvent> {
        self.fulfillments.lock().unwrap().clone()
    }

    async fn wait_for(&self, check: impl Fn(&Self) -> bool) {
        for _ in 0..100 {
            if check(self) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

struct FaultyStore {
    db: FaultyDatabase,
    purchases: PurchaseApi<FaultyDatabase, RecordingNotifier>,
    reconciler: ReconcilerApi<FaultyDatabase, RecordingNotifier, StubPaymentProvider>,
    alerts: Alerts,
}

async fn faulty_store() -> FaultyStore {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = FaultyDatabase::new(SqliteDatabase::new_with_url(&url, 5).await.unwrap());

    let alerts = Alerts::default();
    let mut hooks = EventHooks::default();
    let refunds = alerts.refunds.clone();
    let fulfillments = alerts.fulfillments.clone();
    hooks
        .on_refund_failed(move |ev| {
            refunds.lock().unwrap().push(ev);
            async {}.boxed()
        })
        .on_fulfillment_pending(move |ev| {
            fulfillments.lock().unwrap().push(ev);
            async {}.boxed()
        });
    let handlers = EventHandlers::new(10, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let config = PurchaseConfig { refund_retry_attempts: 3, refund_retry_delay: Duration::from_millis(5) };
    let notifier = RecordingNotifier::new();
    let referrals = ReferralApi::new(db.clone(), ReferralConfig::default());
    let purchases = || PurchaseApi::new(db.clone(), notifier.clone(), referrals.clone(), producers.clone(), config);
    let reconciler = ReconcilerApi::new(db.clone(), StubPaymentProvider::new(), purchases());
    FaultyStore { purchases: purchases(), reconciler, db, alerts }
}

async fn funded_account(db: &FaultyDatabase, external_id: &str, balance: i64) -> i64 {
    let (account, _) = db.insert_account(NewAccount::new(external_id, external_id)).await.unwrap();
    let entry = NewLedgerEntry::new(account.id, Coins::from(balance), LedgerEntryKind::AdminAdjustment, "seed");
    db.credit(entry).await.unwrap();
    account.id
}

#[tokio::test]
async fn failed_refunds_are_retried_then_escalated() {
    let store = faulty_store().await;
    let account = funded_account(&store.db, "tg-700", 100).await;
    let product = NewProduct::new("Outer Wilds key", FiatAmount::from_cents(2499), Coins::from(30))
        .with_preorders(None::<String>);
    let product = store.db.insert_product(product).await.unwrap();
    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account, product.id, 1)).await.unwrap();
    let order_id = outcome.order().id;
    assert_eq!(store.db.fetch_balance(account).await.unwrap(), Coins::from(70));

    store.db.set_failing_credits(true);
    let attempts_before = store.db.credit_attempts();
    let order = store.purchases.cancel_order(order_id, "supplier backed out").await.unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(store.db.credit_attempts() - attempts_before, 3, "Every configured attempt is made");

    store.alerts.wait_for(|a| !a.refunds().is_empty()).await;
    let alerts = store.alerts.refunds();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].account_id, account);
    assert_eq!(alerts[0].order_id, Some(order_id));
    assert_eq!(alerts[0].amount, Coins::from(30));
    assert_eq!(alerts[0].attempts, 3);
    assert!(alerts[0].last_error.contains("database is locked"));

    // Nothing was credited, and the books still balance
    assert_eq!(store.db.fetch_balance(account).await.unwrap(), Coins::from(70));
    assert_eq!(store.db.ledger_sum(account).await.unwrap(), Coins::from(70));
}

#[tokio::test]
async fn refunds_that_recover_do_not_raise_alerts() {
    let store = faulty_store().await;
    let account = funded_account(&store.db, "tg-701", 50).await;
    let product = NewProduct::new("Tunic key", FiatAmount::from_cents(1999), Coins::from(20))
        .with_preorders(None::<String>);
    let product = store.db.insert_product(product).await.unwrap();
    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account, product.id, 1)).await.unwrap();

    store.purchases.cancel_order(outcome.order().id, "changed my mind").await.unwrap();
    assert_eq!(store.db.fetch_balance(account).await.unwrap(), Coins::from(50));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(store.alerts.refunds().is_empty());
}

#[tokio::test]
async fn unlinked_payments_still_reach_the_fulfillment_alert() {
    let store = faulty_store().await;
    let (account, _) = store.db.insert_account(NewAccount::new("tg-702", "TG702REF")).await.unwrap();
    let product =
        NewProduct::new("Balatro key", FiatAmount::from_cents(1499), Coins::from(15)).with_stock(vec!["b:1"]);
    let product = store.db.insert_product(product).await.unwrap();
    let payment = store.reconciler.create_product_checkout(account.id, product.id, 1).await.unwrap();
    // The last item goes elsewhere, and the order cannot be linked back to the payment
    store.db.allocate(product.id, 1).await.unwrap();
    store.db.set_failing_payment_links(true);

    store.reconciler.on_provider_status_change(&payment.provider_tx_id, PaymentStatus::Completed, None).await.unwrap();
    store.alerts.wait_for(|a| !a.fulfillments().is_empty()).await;
    let alerts = store.alerts.fulfillments();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].payment.id, payment.id);
    let order = alerts[0].order.clone().expect("The alert carries the order");
    assert_eq!(order.payment_id, Some(payment.id));
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert!(store.db.fetch_payments_for_order(order.id).await.unwrap().is_empty(), "The link was never written");
    assert!(matches!(
        store.reconciler.payment_by_provider_id(&payment.provider_tx_id).await.unwrap(),
        Some(p) if p.status == PaymentStatus::Completed
    ));
}
