use futures_util::future::join_all;
use gamekey_common::{Coins, FiatAmount};
use gamekey_engine::{
    db_types::{LedgerEntryKind, NewLedgerEntry, NewProduct, ReferralStatus},
    store_api::PurchaseRequest,
    test_utils::TestStore,
    traits::Pagination,
};

#[tokio::test]
async fn registration_is_idempotent() {
    let store = TestStore::new().await;
    let first = store.accounts.register("tg-300", Some("alice"), None).await.unwrap();
    assert!(first.is_new);
    assert!(!first.referred);
    assert_eq!(first.account.balance, Coins::from(0));
    assert_eq!(first.account.username.as_deref(), Some("alice"));
    assert!(gamekey_engine::helpers::is_valid_referral_code(&first.account.referral_code));

    let second = store.accounts.register("tg-300", Some("alice"), None).await.unwrap();
    assert!(!second.is_new);
    assert_eq!(second.account.id, first.account.id);
    assert_eq!(second.account.referral_code, first.account.referral_code);

    let found = store.accounts.account_by_referral_code(&first.account.referral_code).await.unwrap().unwrap();
    assert_eq!(found.id, first.account.id);
    assert!(store.accounts.register("  ", None, None).await.is_err());
}

#[tokio::test]
async fn signup_bonus_is_paid_to_the_referrer() {
    let store = TestStore::new().await;
    let referrer = store.accounts.register("tg-301", None, None).await.unwrap().account;
    let code = referrer.referral_code.clone();

    let result = store.accounts.register("tg-302", None, Some(&code)).await.unwrap();
    assert!(result.is_new);
    assert!(result.referred);
    assert_eq!(result.account.referrer_id, Some(referrer.id));

    let referrer = store.accounts.account_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, Coins::from(50));
    assert_eq!(referrer.referral_earnings, Coins::from(50));
    let history = store.ledger.history(referrer.id, &Pagination::default()).await.unwrap();
    assert_eq!(history[0].kind, LedgerEntryKind::ReferralBonus);
    assert!(store.ledger.is_consistent(referrer.id).await.unwrap());

    let referral = store.referrals.referral_for(result.account.id).await.unwrap().unwrap();
    assert_eq!(referral.status, ReferralStatus::Pending);
    assert!(!referral.first_purchase_paid);
    assert_eq!(referral.coins_earned, Coins::from(50));
}

#[tokio::test]
async fn referral_codes_are_ignored_for_existing_accounts_and_unknown_codes() {
    let store = TestStore::new().await;
    let referrer = store.accounts.register("tg-303", None, None).await.unwrap().account;
    store.accounts.register("tg-304", None, None).await.unwrap();

    let again = store.accounts.register("tg-304", None, Some(&referrer.referral_code)).await.unwrap();
    assert!(!again.referred);
    let unknown = store.accounts.register("tg-305", None, Some("ZZZZZZZZ")).await.unwrap();
    assert!(unknown.is_new);
    assert!(!unknown.referred);
    assert_eq!(unknown.account.referrer_id, None);

    let referrer = store.accounts.account_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, Coins::from(0));
}

#[tokio::test]
async fn first_purchase_bonus_is_paid_once() {
    let store = TestStore::new().await;
    let referrer = store.accounts.register("tg-306", None, None).await.unwrap().account;
    let buyer = store.accounts.register("tg-307", None, Some(&referrer.referral_code)).await.unwrap().account;
    let entry = NewLedgerEntry::new(buyer.id, Coins::from(100), LedgerEntryKind::PurchaseOfCoins, "top-up");
    store.ledger.credit(entry).await.unwrap();
    let product = NewProduct::new("Key", FiatAmount::from_cents(100), Coins::from(10)).with_stock(vec!["a", "b", "c"]);
    let product = store.inventory.create_product(product).await.unwrap();

    for _ in 0..3 {
        store.purchases.purchase(PurchaseRequest::with_balance(buyer.id, product.id, 1)).await.unwrap();
    }
    for _ in 0..3 {
        assert!(store.referrals.on_first_purchase_completed(buyer.id).await.unwrap().is_none());
    }

    let referrer = store.accounts.account_by_id(referrer.id).await.unwrap().unwrap();
    assert_eq!(referrer.balance, Coins::from(150), "50 for the signup and 100 for the first purchase");
    assert_eq!(referrer.referral_earnings, Coins::from(150));
    let referral = store.referrals.referral_for(buyer.id).await.unwrap().unwrap();
    assert_eq!(referral.status, ReferralStatus::Completed);
    assert!(referral.first_purchase_paid);
    assert!(referral.completed_at.is_some());
    assert_eq!(referral.coins_earned, Coins::from(150));

    let stats = store.referrals.statistics(referrer.id).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.coins_earned, Coins::from(150));
    let referrals = store.referrals.referrals_for(referrer.id, &Pagination::default()).await.unwrap();
    assert_eq!(referrals.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_purchase_triggers_pay_once() {
    let store = TestStore::new().await;
    let referrer = store.accounts.register("tg-308", None, None).await.unwrap().account;
    let buyer = store.accounts.register("tg-309", None, Some(&referrer.referral_code)).await.unwrap().account;

    let results = join_all((0..10).map(|_| store.referrals.on_first_purchase_completed(buyer.id))).await;
    let paid = results.into_iter().filter(|r| matches!(r, Ok(Some(_)))).count();
    assert_eq!(paid, 1);
    assert_eq!(store.ledger.balance(referrer.id).await.unwrap(), Coins::from(150));
}

#[tokio::test]
async fn accounts_without_a_referrer_trigger_nothing() {
    let store = TestStore::new().await;
    let loner = store.accounts.register("tg-310", None, None).await.unwrap().account;
    assert!(store.referrals.on_first_purchase_completed(loner.id).await.unwrap().is_none());
    assert!(store.referrals.referral_for(loner.id).await.unwrap().is_none());
    let stats = store.referrals.statistics(loner.id).await.unwrap();
    assert_eq!(stats.total, 0);
    assert_eq!(stats.coins_earned, Coins::from(0));
}
