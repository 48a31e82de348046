use gamekey_common::Coins;
use gamekey_engine::{
    db_types::{Account, LedgerEntryKind, NewLedgerEntry, RelatedEntity},
    test_utils::TestStore,
    traits::{LedgerError, Pagination},
};
use rand::Rng;

async fn new_account(store: &TestStore, external_id: &str) -> Account {
    store.accounts.register(external_id, Some("tester"), None).await.expect("Error registering account").account
}

fn entry(account_id: i64, amount: i64, kind: LedgerEntryKind) -> NewLedgerEntry {
    NewLedgerEntry::new(account_id, Coins::from(amount), kind, format!("{kind} of {amount}"))
}

#[tokio::test]
async fn credit_then_debit() {
    let store = TestStore::new().await;
    let account = new_account(&store, "1001").await;
    assert_eq!(account.balance, Coins::from(0));

    let account = store.ledger.credit(entry(account.id, 100, LedgerEntryKind::PurchaseOfCoins)).await.unwrap();
    assert_eq!(account.balance, Coins::from(100));
    let account = store.ledger.debit(entry(account.id, 30, LedgerEntryKind::ProductPurchase)).await.unwrap();
    assert_eq!(account.balance, Coins::from(70));

    let history = store.ledger.history(account.id, &Pagination::default()).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, Coins::from(-30), "Newest entry first, debits are negative");
    assert_eq!(history[1].amount, Coins::from(100));
    assert!(store.ledger.is_consistent(account.id).await.unwrap());
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
    let store = TestStore::new().await;
    let account = new_account(&store, "1002").await;
    for amount in [0, -5] {
        let err = store.ledger.credit(entry(account.id, amount, LedgerEntryKind::Refund)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err}");
        let err = store.ledger.debit(entry(account.id, amount, LedgerEntryKind::ProductPurchase)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount(_)), "{err}");
    }
    let history = store.ledger.history(account.id, &Pagination::default()).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn failed_debit_changes_nothing() {
    let store = TestStore::new().await;
    let account = new_account(&store, "1003").await;
    store.ledger.credit(entry(account.id, 40, LedgerEntryKind::AdminAdjustment)).await.unwrap();
    let err = store.ledger.debit(entry(account.id, 60, LedgerEntryKind::ProductPurchase)).await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }), "{err}");
    assert_eq!(store.ledger.balance(account.id).await.unwrap(), Coins::from(40));
    assert_eq!(store.ledger.history(account.id, &Pagination::default()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_account() {
    let store = TestStore::new().await;
    let err = store.ledger.credit(entry(999, 10, LedgerEntryKind::AdminAdjustment)).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(999)), "{err}");
    let err = store.ledger.debit(entry(999, 10, LedgerEntryKind::AdminAdjustment)).await.unwrap_err();
    assert!(matches!(err, LedgerError::AccountNotFound(999)), "{err}");
}

#[tokio::test]
async fn random_interleaving_keeps_balance_invariant() {
    let store = TestStore::new().await;
    let account = new_account(&store, "1004").await;
    let mut rng = rand::thread_rng();
    let mut expected = 0i64;
    for _ in 0..200 {
        let amount = rng.gen_range(1..50);
        if rng.gen_bool(0.5) {
            store.ledger.credit(entry(account.id, amount, LedgerEntryKind::PurchaseOfCoins)).await.unwrap();
            expected += amount;
        } else {
            match store.ledger.debit(entry(account.id, amount, LedgerEntryKind::ProductPurchase)).await {
                Ok(acc) => {
                    expected -= amount;
                    assert_eq!(acc.balance.value(), expected);
                },
                Err(LedgerError::InsufficientFunds { .. }) => assert!(expected < amount),
                Err(e) => panic!("Unexpected error: {e}"),
            }
        }
        assert!(expected >= 0);
    }
    assert_eq!(store.ledger.balance(account.id).await.unwrap().value(), expected);
    assert!(store.ledger.is_consistent(account.id).await.unwrap());
}

#[tokio::test]
async fn history_pages_newest_first() {
    let store = TestStore::new().await;
    let account = new_account(&store, "1005").await;
    for i in 1..=12 {
        let e = entry(account.id, i, LedgerEntryKind::PurchaseOfCoins).with_related(RelatedEntity::payment(i));
        store.ledger.credit(e).await.unwrap();
    }
    let first = store.ledger.history(account.id, &Pagination::new(1, 5)).await.unwrap();
    let third = store.ledger.history(account.id, &Pagination::new(3, 5)).await.unwrap();
    assert_eq!(first.iter().map(|e| e.amount.value()).collect::<Vec<_>>(), vec![12, 11, 10, 9, 8]);
    assert_eq!(third.iter().map(|e| e.amount.value()).collect::<Vec<_>>(), vec![2, 1]);
    assert_eq!(first[0].related(), Some(RelatedEntity::payment(12)));
}

#[tokio::test]
async fn admin_adjustments_and_statistics() {
    let store = TestStore::new().await;
    let alice = new_account(&store, "1006").await;
    let bob = new_account(&store, "1007").await;
    store.ledger.admin_adjust(alice.id, Coins::from(100), "welcome gift").await.unwrap();
    store.ledger.admin_adjust(bob.id, Coins::from(50), "welcome gift").await.unwrap();
    let alice = store.ledger.admin_adjust(alice.id, Coins::from(-30), "chargeback").await.unwrap();
    assert_eq!(alice.balance, Coins::from(70));
    let err = store.ledger.admin_adjust(bob.id, Coins::from(0), "nothing").await.unwrap_err();
    assert!(matches!(err, LedgerError::InvalidAmount(_)));
    let err = store.ledger.admin_adjust(bob.id, Coins::from(-80), "too much").await.unwrap_err();
    assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

    let stats = store.ledger.statistics().await.unwrap();
    assert_eq!(stats.accounts, 2);
    assert_eq!(stats.total_issued, Coins::from(150));
    assert_eq!(stats.total_spent, Coins::from(30));
    assert_eq!(stats.outstanding(), Coins::from(120));
    let adjustments = stats.by_kind.iter().find(|k| k.kind == LedgerEntryKind::AdminAdjustment).unwrap();
    assert_eq!(adjustments.entries, 3);
    assert_eq!(adjustments.amount, Coins::from(120));
}
