use crate::{
    events::EventProducers,
    test_utils::{prepare_test_env, random_db_path, RecordingNotifier, StubPaymentProvider},
    AccountApi,
    InventoryApi,
    LedgerApi,
    OrderStoreApi,
    PurchaseApi,
    PurchaseConfig,
    ReconcilerApi,
    ReferralApi,
    ReferralConfig,
    SqliteDatabase,
};

pub type TestPurchaseApi = PurchaseApi<SqliteDatabase, RecordingNotifier>;
pub type TestReconcilerApi = ReconcilerApi<SqliteDatabase, RecordingNotifier, StubPaymentProvider>;

/// Every store API wired to one fresh database, a [`RecordingNotifier`] and a [`StubPaymentProvider`].
pub struct TestStore {
    pub db: SqliteDatabase,
    pub notifier: RecordingNotifier,
    pub provider: StubPaymentProvider,
    pub accounts: AccountApi<SqliteDatabase>,
    pub ledger: LedgerApi<SqliteDatabase>,
    pub inventory: InventoryApi<SqliteDatabase>,
    pub orders: OrderStoreApi<SqliteDatabase>,
    pub referrals: ReferralApi<SqliteDatabase>,
    pub purchases: TestPurchaseApi,
    pub reconciler: TestReconcilerApi,
}

impl TestStore {
    pub async fn new() -> Self {
        Self::with_config(EventProducers::default(), PurchaseConfig::default(), ReferralConfig::default()).await
    }

    pub async fn with_producers(producers: EventProducers) -> Self {
        Self::with_config(producers, PurchaseConfig::default(), ReferralConfig::default()).await
    }

    pub async fn with_config(
        producers: EventProducers,
        purchase_config: PurchaseConfig,
        referral_config: ReferralConfig,
    ) -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating connection to database");
        let notifier = RecordingNotifier::new();
        let provider = StubPaymentProvider::new();
        let referrals = ReferralApi::new(db.clone(), referral_config);
        let purchases = || {
            PurchaseApi::new(db.clone(), notifier.clone(), referrals.clone(), producers.clone(), purchase_config)
        };
        Self {
            accounts: AccountApi::new(db.clone(), referrals.clone()),
            ledger: LedgerApi::new(db.clone()),
            inventory: InventoryApi::new(db.clone()),
            orders: OrderStoreApi::new(db.clone()),
            purchases: purchases(),
            reconciler: ReconcilerApi::new(db.clone(), provider.clone(), purchases()),
            referrals,
            db,
            notifier,
            provider,
        }
    }
}
