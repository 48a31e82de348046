use cucumber::{given, then, when};
use gamekey_common::{Coins, FiatAmount};
use gamekey_engine::{
    db_types::{LedgerEntryKind, NewLedgerEntry, NewProduct, PaymentStatus},
    store_api::{PurchaseError, PurchaseOutcome, PurchaseRequest, ReconcileOutcome},
    traits::Pagination,
};

use crate::cucumber::StoreWorld;

fn parse_items(items: &str) -> Vec<String> {
    items.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect()
}

#[given(expr = "customer '{word}' has {int} coins")]
async fn funded_customer(world: &mut StoreWorld, name: String, balance: i64) {
    let store = world.store();
    let account = store.accounts.register(&name, None, None).await.expect("Error registering account").account;
    if balance > 0 {
        let entry = NewLedgerEntry::new(account.id, Coins::from(balance), LedgerEntryKind::PurchaseOfCoins, "top-up");
        store.ledger.credit(entry).await.expect("Error crediting account");
    }
    world.customers.insert(name, account.id);
}

#[given(expr = "customer '{word}' signs up with the referral code of '{word}'")]
async fn referred_customer(world: &mut StoreWorld, name: String, referrer: String) {
    let store = world.store();
    let referrer_id = world.customer(&referrer);
    let referrer = store.accounts.account_by_id(referrer_id).await.expect("Error fetching account");
    let code = referrer.expect("Referrer does not exist").referral_code;
    let result = store.accounts.register(&name, None, Some(&code)).await.expect("Error registering account");
    assert!(result.referred, "{name} was not linked to a referrer");
    world.customers.insert(name, result.account.id);
}

#[given(expr = "product '{word}' costs {int} coins with stock {string}")]
async fn product_in_stock(world: &mut StoreWorld, name: String, price: i64, items: String) {
    let product = NewProduct::new(&name, FiatAmount::from_cents(price * 10), Coins::from(price))
        .with_stock(parse_items(&items));
    let product = world.store().inventory.create_product(product).await.expect("Error creating product");
    world.products.insert(name, product.id);
}

#[given(expr = "product '{word}' costs {int} coins and accepts preorders")]
async fn preorder_product(world: &mut StoreWorld, name: String, price: i64) {
    let product = NewProduct::new(&name, FiatAmount::from_cents(price * 10), Coins::from(price))
        .with_preorders(Some("Coming soon"));
    let product = world.store().inventory.create_product(product).await.expect("Error creating product");
    world.products.insert(name, product.id);
}

#[when(expr = "'{word}' tops up {int} coins")]
async fn top_up(world: &mut StoreWorld, name: String, amount: i64) {
    let account = world.customer(&name);
    let entry = NewLedgerEntry::new(account, Coins::from(amount), LedgerEntryKind::PurchaseOfCoins, "top-up");
    world.store().ledger.credit(entry).await.expect("Error crediting account");
}

#[when(expr = "'{word}' buys {int} of '{word}'")]
async fn buy(world: &mut StoreWorld, name: String, quantity: i64, product: String) {
    let request = PurchaseRequest::with_balance(world.customer(&name), world.product(&product), quantity);
    let outcome = world.store().purchases.purchase(request).await;
    world.outcomes.push(outcome);
}

#[when(expr = "'{word}' and '{word}' race to buy {int} of '{word}'")]
async fn race(world: &mut StoreWorld, first: String, second: String, quantity: i64, product: String) {
    let product = world.product(&product);
    let a = PurchaseRequest::with_balance(world.customer(&first), product, quantity);
    let b = PurchaseRequest::with_balance(world.customer(&second), product, quantity);
    let purchases = &world.store().purchases;
    let (a, b) = tokio::join!(purchases.purchase(a), purchases.purchase(b));
    world.outcomes.push(a);
    world.outcomes.push(b);
}

#[when(expr = "'{word}' is restocked with {string}")]
async fn restock(world: &mut StoreWorld, product: String, items: String) {
    let product = world.product(&product);
    world.store().purchases.restock(product, parse_items(&items)).await.expect("Error restocking product");
}

#[when(expr = "'{word}' checks out {int} of '{word}' with the payment provider")]
async fn checkout(world: &mut StoreWorld, name: String, quantity: i64, product: String) {
    let (account, product) = (world.customer(&name), world.product(&product));
    let payment = world
        .store()
        .reconciler
        .create_product_checkout(account, product, quantity)
        .await
        .expect("Error creating checkout");
    world.last_payment = Some(payment.provider_tx_id);
}

#[when(expr = "the provider reports the payment as {word}")]
async fn provider_reports(world: &mut StoreWorld, status: String) {
    let status: PaymentStatus = status.parse().expect("Not a payment status");
    let tx_id = world.last_payment.clone().expect("No payment has been opened");
    let outcome =
        world.store().reconciler.on_provider_status_change(&tx_id, status, None).await.expect("Error reconciling");
    if let ReconcileOutcome::Fulfilled(outcome) = outcome {
        world.outcomes.push(Ok(outcome));
    }
}

#[then(expr = "the balance of '{word}' is {int} coins")]
async fn check_balance(world: &mut StoreWorld, name: String, expected: i64) {
    let account = world.customer(&name);
    let balance = world.store().ledger.balance(account).await.expect("Error fetching balance");
    assert_eq!(balance, Coins::from(expected), "Balance of {name} is incorrect");
    let consistent = world.store().ledger.is_consistent(account).await.expect("Error checking ledger");
    assert!(consistent, "The ledger of {name} does not add up to the balance");
}

#[then(expr = "the purchase completes with items {string}")]
async fn check_completed(world: &mut StoreWorld, items: String) {
    match world.last_outcome() {
        Ok(PurchaseOutcome::Completed { items: delivered, .. }) => assert_eq!(delivered, &parse_items(&items)),
        other => panic!("Expected a completed purchase. Got {other:?}"),
    }
}

#[then(expr = "the purchase becomes a preorder")]
async fn check_preordered(world: &mut StoreWorld) {
    assert!(
        matches!(world.last_outcome(), Ok(PurchaseOutcome::Preordered { .. })),
        "Expected a preorder. Got {:?}",
        world.last_outcome()
    );
}

#[then(expr = "the purchase fails with insufficient funds")]
async fn check_insufficient_funds(world: &mut StoreWorld) {
    assert!(
        matches!(world.last_outcome(), Err(PurchaseError::InsufficientFunds { .. })),
        "Expected insufficient funds. Got {:?}",
        world.last_outcome()
    );
}

#[then(expr = "exactly one purchase completes with items {string} and the other runs out of stock")]
async fn check_race(world: &mut StoreWorld, items: String) {
    let expected = parse_items(&items);
    let results = &world.outcomes[world.outcomes.len() - 2..];
    let winners = results
        .iter()
        .filter(|r| matches!(r, Ok(PurchaseOutcome::Completed { items, .. }) if *items == expected))
        .count();
    let losers = results.iter().filter(|r| matches!(r, Err(PurchaseError::InsufficientStock { .. }))).count();
    assert_eq!((winners, losers), (1, 1), "Unexpected race results: {results:?}");
}

#[then(expr = "the stock of '{word}' is {string}")]
async fn check_stock(world: &mut StoreWorld, product: String, items: String) {
    let product = world.product(&product);
    let stock = world.store().inventory.stock(product).await.expect("Error fetching stock");
    assert_eq!(stock, parse_items(&items));
}

#[then(expr = "'{word}' has {int} order(s)")]
async fn check_order_count(world: &mut StoreWorld, name: String, expected: i64) {
    let account = world.customer(&name);
    let (_, total) =
        world.store().orders.orders_for_account(account, &Pagination::default()).await.expect("Error fetching orders");
    assert_eq!(total, expected, "Order count for {name} is incorrect");
}

#[then(expr = "the latest order of '{word}' is {word} with a total of {int}")]
async fn check_latest_order(world: &mut StoreWorld, name: String, status: String, total: i64) {
    let account = world.customer(&name);
    let (orders, _) =
        world.store().orders.orders_for_account(account, &Pagination::default()).await.expect("Error fetching orders");
    let order = orders.first().unwrap_or_else(|| panic!("{name} has no orders"));
    assert_eq!(order.status.to_string(), status);
    assert_eq!(order.total_amount, total);
}

#[then(expr = "the latest order of '{word}' delivered {string}")]
async fn check_delivered(world: &mut StoreWorld, name: String, items: String) {
    let account = world.customer(&name);
    let (orders, _) =
        world.store().orders.orders_for_account(account, &Pagination::default()).await.expect("Error fetching orders");
    let order = orders.first().unwrap_or_else(|| panic!("{name} has no orders"));
    assert_eq!(order.delivered_items.0, parse_items(&items));
}
