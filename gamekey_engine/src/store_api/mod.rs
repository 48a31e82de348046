//! # GameKey store engine public API
//!
//! The `store_api` module exposes the programmatic API of the store engine. Each API wraps a backend that implements
//! the storage traits it needs, so clients only pull in the functionality they use.
//!
//! * [`accounts_api`] registers chat users and looks up their accounts.
//! * [`ledger_api`] credits and debits coin balances, and audits the ledger against cached balances.
//! * [`inventory_api`] manages the product catalogue and its stock of digital items.
//! * [`order_store_api`] queries orders, their status history and the sales statistics.
//! * [`purchase_api`] is the primary API for buying products with coins, processing preorders, and the administrator
//!   operations that complete or cancel orders.
//! * [`reconciler_api`] opens checkouts with an external payment provider and acts on the provider's status reports.
//! * [`referral_api`] pays the referral bonuses.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend. The orchestrating APIs also take their collaborators.
//!
//! ```rust,ignore
//! use gamekey_engine::{InventoryApi, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/store.db", 5).await?;
//! let api = InventoryApi::new(db);
//! let products = api.products(true).await?;
//! ```

pub mod accounts_api;
pub mod config;
pub mod errors;
pub mod inventory_api;
pub mod ledger_api;
pub mod objects;
pub mod order_store_api;
pub mod purchase_api;
pub mod reconciler_api;
pub mod referral_api;

pub use accounts_api::AccountApi;
pub use config::{PurchaseConfig, ReferralConfig};
pub use errors::{PurchaseError, ReconcileError};
pub use inventory_api::InventoryApi;
pub use ledger_api::LedgerApi;
pub use objects::{
    PaymentMode,
    PurchaseOutcome,
    PurchaseRequest,
    ReconcileOutcome,
    RegistrationResult,
    ReplenishmentResult,
};
pub use order_store_api::OrderStoreApi;
pub use purchase_api::{PurchaseApi, INVENTORY_EXHAUSTED};
pub use reconciler_api::ReconcilerApi;
pub use referral_api::ReferralApi;
