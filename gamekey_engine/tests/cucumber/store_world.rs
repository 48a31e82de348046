use std::{collections::HashMap, fmt::Debug};

use cucumber::World;
use gamekey_engine::{
    store_api::{PurchaseError, PurchaseOutcome},
    test_utils::TestStore,
};

#[derive(Default, Debug, World)]
pub struct StoreWorld {
    pub system: Option<StoreSystem>,
    /// Customer names used in the feature files, mapped to account ids.
    pub customers: HashMap<String, i64>,
    /// Product names used in the feature files, mapped to product ids.
    pub products: HashMap<String, i64>,
    pub outcomes: Vec<Result<PurchaseOutcome, PurchaseError>>,
    pub last_payment: Option<String>,
}

pub struct StoreSystem {
    pub store: TestStore,
}

impl Debug for StoreSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StoreSystem ({:?})", self.store.db)
    }
}

impl StoreSystem {
    pub async fn new() -> Self {
        Self { store: TestStore::new().await }
    }
}

impl StoreWorld {
    pub fn store(&self) -> &TestStore {
        &self.system.as_ref().expect("Store not initialised").store
    }

    pub fn customer(&self, name: &str) -> i64 {
        *self.customers.get(name).unwrap_or_else(|| panic!("Unknown customer {name}"))
    }

    pub fn product(&self, name: &str) -> i64 {
        *self.products.get(name).unwrap_or_else(|| panic!("Unknown product {name}"))
    }

    pub fn last_outcome(&self) -> &Result<PurchaseOutcome, PurchaseError> {
        self.outcomes.last().expect("No purchase has been attempted")
    }
}
