use gamekey_common::{Coins, FiatAmount, COIN_CURRENCY_CODE};
use gamekey_engine::{
    db_types::{Account, LedgerEntryKind, NewLedgerEntry, NewProduct, OrderKind, OrderStatusType, Product},
    helpers::Credential,
    store_api::{PurchaseError, PurchaseOutcome, PurchaseRequest},
    test_utils::TestStore,
    traits::{Notification, OrderQueryFilter, Pagination},
};

async fn funded_account(store: &TestStore, external_id: &str, balance: i64) -> Account {
    let account = store.accounts.register(external_id, None, None).await.expect("Error registering account").account;
    let entry = NewLedgerEntry::new(account.id, Coins::from(balance), LedgerEntryKind::PurchaseOfCoins, "top-up");
    store.ledger.credit(entry).await.expect("Error crediting account")
}

async fn create_product(store: &TestStore, product: NewProduct) -> Product {
    store.inventory.create_product(product).await.expect("Error creating product")
}

fn game_key(price: i64) -> NewProduct {
    NewProduct::new("Elden Ring key", FiatAmount::from_cents(2999), Coins::from(price))
}

#[tokio::test]
async fn purchase_delivers_from_the_front_of_the_stock() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-100", 100).await;
    let product = create_product(&store, game_key(30).with_stock(vec!["a:1", "b:2", "c:3"])).await;

    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 2)).await.unwrap();
    let PurchaseOutcome::Completed { order, items } = outcome else {
        panic!("Expected a completed purchase. Got {outcome:?}");
    };
    assert_eq!(items, vec!["a:1".to_string(), "b:2".to_string()]);
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.kind, OrderKind::Purchase);
    assert_eq!(order.total_amount, 60);
    assert_eq!(order.currency, COIN_CURRENCY_CODE);
    assert!(order.completed_at.is_some());
    assert_eq!(order.delivered_items.0, items);
    assert_eq!(order.status_history.len(), 2);
    assert_eq!(order.status_history[1].delivered_items.0, items);

    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(40));
    assert_eq!(store.inventory.stock(product.id).await.unwrap(), vec!["c:3".to_string()]);

    let credentials = store.orders.delivered_credentials(order.id).await.unwrap();
    assert_eq!(credentials[0], Credential::Pair { login: "a".into(), password: "1".into() });

    let sent = store.notifier.sent_to("tg-100");
    assert!(matches!(&sent[..], [Notification::OrderDelivered { items: i, .. }] if *i == items));
}

#[tokio::test]
async fn insufficient_funds_has_no_side_effects() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-101", 40).await;
    let product = create_product(&store, game_key(30).with_stock(vec!["a:1", "b:2", "c:3"])).await;

    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 2)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::InsufficientFunds { .. }), "{err}");
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(40));
    let (orders, total) = store.orders.orders_for_account(account.id, &Pagination::default()).await.unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
    assert_eq!(store.inventory.available_count(product.id).await.unwrap(), 3);
}

#[tokio::test]
async fn validation_failures() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-102", 100).await;
    let product = create_product(&store, game_key(10).with_stock(vec!["a:1"])).await;
    let sold_out = create_product(&store, game_key(10)).await;

    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 0)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::Validation(_)), "{err}");
    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, 999, 1)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::ProductNotFound(999)), "{err}");
    let err = store.purchases.purchase(PurchaseRequest::with_balance(999, product.id, 1)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::AccountNotFound(999)), "{err}");
    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 2)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::InsufficientStock { requested: 2, available: 1, .. }), "{err}");
    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, sold_out.id, 1)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::ProductUnavailable(_)), "{err}");

    store.inventory.set_enabled(product.id, false).await.unwrap();
    let err = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 1)).await.unwrap_err();
    assert!(matches!(err, PurchaseError::ProductUnavailable(_)), "{err}");

    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(100));
}

#[tokio::test]
async fn preorder_is_fulfilled_on_restock() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-103", 100).await;
    let product = create_product(&store, game_key(25).with_preorders(Some("Ships within a week"))).await;
    assert!(!product.is_available);

    let request = PurchaseRequest::with_balance(account.id, product.id, 1).with_note("gift for my brother");
    let outcome = store.purchases.purchase(request).await.unwrap();
    let PurchaseOutcome::Preordered { order } = outcome else {
        panic!("Expected a preorder. Got {outcome:?}");
    };
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.kind, OrderKind::Preorder);
    assert_eq!(order.customer_note.as_deref(), Some("gift for my brother"));
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(75));
    assert!(matches!(
        store.notifier.sent_to("tg-103").as_slice(),
        [Notification::PreorderPlaced { note: Some(_), .. }]
    ));

    let (product, result) = store.purchases.restock(product.id, vec!["x:9".to_string()]).await.unwrap();
    assert_eq!(result.fulfilled.len(), 1);
    assert!(result.cancelled.is_empty());
    assert_eq!(result.still_pending, 0);
    let fulfilled = &result.fulfilled[0];
    assert_eq!(fulfilled.id, order.id);
    assert_eq!(fulfilled.status, OrderStatusType::Completed);
    assert_eq!(fulfilled.delivered_items.0, vec!["x:9".to_string()]);
    assert!(!product.is_available, "The only restocked item went to the preorder");
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(75));
}

#[tokio::test]
async fn replenishment_is_strict_fifo() {
    let store = TestStore::new().await;
    let alice = funded_account(&store, "tg-104", 100).await;
    let bob = funded_account(&store, "tg-105", 100).await;
    let carol = funded_account(&store, "tg-106", 100).await;
    let product = create_product(&store, game_key(10).with_preorders(None::<String>)).await;

    let mut preorders = Vec::new();
    for (account, qty) in [(&alice, 1), (&bob, 3), (&carol, 1)] {
        let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, qty)).await.unwrap();
        preorders.push(outcome.order().id);
    }

    // Two items cover alice but not bob. Carol must not jump ahead of bob.
    let (_, result) = store.purchases.restock(product.id, vec!["k1".into(), "k2".into()]).await.unwrap();
    assert_eq!(result.fulfilled.iter().map(|o| o.id).collect::<Vec<_>>(), vec![preorders[0]]);
    assert_eq!(result.still_pending, 2);
    assert_eq!(store.inventory.stock(product.id).await.unwrap(), vec!["k2".to_string()]);

    let (_, result) = store.purchases.restock(product.id, vec!["k3".into(), "k4".into(), "k5".into()]).await.unwrap();
    assert_eq!(result.fulfilled.iter().map(|o| o.id).collect::<Vec<_>>(), vec![preorders[1], preorders[2]]);
    assert_eq!(result.still_pending, 0);
    let bob_order = store.orders.order_by_id(preorders[1]).await.unwrap().unwrap();
    assert_eq!(bob_order.delivered_items.0, vec!["k2".to_string(), "k3".to_string(), "k4".to_string()]);
    assert!(store.orders.pending_preorders(product.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn disabled_products_keep_preorders_waiting() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-107", 100).await;
    let product = create_product(&store, game_key(10).with_preorders(None::<String>)).await;
    store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 1)).await.unwrap();
    store.inventory.set_enabled(product.id, false).await.unwrap();

    let (product, result) = store.purchases.restock(product.id, vec!["k1".into()]).await.unwrap();
    assert!(result.fulfilled.is_empty());
    assert_eq!(result.still_pending, 1);
    assert!(!product.is_available);
    assert_eq!(store.inventory.available_count(product.id).await.unwrap(), 1);
}

#[tokio::test]
async fn unit_price_is_frozen_at_order_time() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-108", 100).await;
    let product = create_product(&store, game_key(10).with_preorders(None::<String>)).await;
    let order = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 2)).await.unwrap();
    let order = order.order().clone();

    store.inventory.update_prices(product.id, FiatAmount::from_cents(5000), Coins::from(99)).await.unwrap();
    store.purchases.restock(product.id, vec!["k1".into(), "k2".into()]).await.unwrap();
    let order = store.orders.order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.unit_price, 10);
    assert_eq!(order.total_amount, order.quantity * order.unit_price);
}

#[tokio::test]
async fn admin_cancellation_refunds_coin_orders() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-109", 100).await;
    let product = create_product(&store, game_key(40).with_preorders(None::<String>)).await;
    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 2)).await.unwrap();
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(20));

    let order = store.purchases.cancel_order(outcome.order().id, "supplier backed out").await.unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(100));
    assert!(store.ledger.is_consistent(account.id).await.unwrap());
    let last = store.notifier.sent_to("tg-109").pop();
    assert_eq!(
        last,
        Some(Notification::OrderCancelled {
            order_id: order.id,
            reason: "supplier backed out".into(),
            refunded: Some(Coins::from(80)),
        })
    );

    let err = store.purchases.cancel_order(order.id, "again").await.unwrap_err();
    assert!(matches!(err, PurchaseError::OrderModificationForbidden(_)), "{err}");
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(100), "No double refund");
}

#[tokio::test]
async fn admin_fulfilment_completes_pending_orders() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-110", 100).await;
    let product = create_product(&store, game_key(10).with_preorders(None::<String>)).await;
    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 1)).await.unwrap();

    let order = store.purchases.fulfill_order(outcome.order().id, vec!["MANUAL-KEY-1".into()]).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Completed);
    assert_eq!(order.delivered_items.0, vec!["MANUAL-KEY-1".to_string()]);
    let credentials = store.orders.delivered_credentials(order.id).await.unwrap();
    assert_eq!(credentials, vec![Credential::Raw("MANUAL-KEY-1".into())]);

    let err = store.purchases.fulfill_order(order.id, vec![]).await.unwrap_err();
    assert!(matches!(err, PurchaseError::OrderModificationForbidden(_)), "{err}");
    let err = store.purchases.fulfill_order(999, vec![]).await.unwrap_err();
    assert!(matches!(err, PurchaseError::OrderNotFound(999)), "{err}");
}

#[tokio::test]
async fn notifier_failures_do_not_undo_purchases() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-111", 100).await;
    let product = create_product(&store, game_key(10).with_stock(vec!["a:1"])).await;
    store.notifier.set_failing(true);

    let outcome = store.purchases.purchase(PurchaseRequest::with_balance(account.id, product.id, 1)).await.unwrap();
    assert!(matches!(outcome, PurchaseOutcome::Completed { .. }));
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(90));
    assert!(store.notifier.sent().is_empty());
}

#[tokio::test]
async fn sales_statistics_count_completed_orders_only() {
    let store = TestStore::new().await;
    let account = funded_account(&store, "tg-112", 500).await;
    let keys = create_product(&store, game_key(10).with_stock(vec!["a", "b", "c"])).await;
    let gift = create_product(
        &store,
        NewProduct::new("Gift card", FiatAmount::from_cents(1000), Coins::from(50)).with_preorders(None::<String>),
    )
    .await;
    store.purchases.purchase(PurchaseRequest::with_balance(account.id, keys.id, 2)).await.unwrap();
    store.purchases.purchase(PurchaseRequest::with_balance(account.id, keys.id, 1)).await.unwrap();
    store.purchases.purchase(PurchaseRequest::with_balance(account.id, gift.id, 1)).await.unwrap();

    let stats = store.orders.sales_statistics(None, None).await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.totals.len(), 1);
    assert_eq!(stats.totals[0].currency, COIN_CURRENCY_CODE);
    assert_eq!(stats.totals[0].total_amount, 30);
    assert_eq!(stats.products.len(), 1);
    assert_eq!(stats.products[0].quantity, 3);

    let pending = store
        .orders
        .search_orders(OrderQueryFilter::default().with_account_id(account.id).with_status(OrderStatusType::Pending))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].product_id, gift.id);
}
