//! GameKey Store Engine
//!
//! The engine behind the GameKey Telegram storefront. It sells digital goods (game keys, account credentials) for an
//! internal coin currency or through an external payment provider, and keeps every coin movement in an append-only
//! ledger.
//!
//! The library is divided into the following sections:
//! 1. Storage contracts ([`mod@traits`]) and the SQLite backend that implements them ([`mod@sqlite`]). You should
//!    never need to touch the database directly. The exception is the data types stored in it, which live in
//!    [`mod@db_types`] and are public.
//! 2. The public API ([`mod@store_api`]). This is where purchases are orchestrated, external payments reconciled and
//!    referral bonuses paid.
//!
//! The engine also emits events when orders complete or are annulled, and when something needs a human to look at it
//! (a refund that could not be written, or a payment that was collected but not fulfilled). See [`mod@events`] for
//! how to hook into them.
pub mod db_types;
pub mod events;
pub mod helpers;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store_api;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use store_api::{
    AccountApi,
    InventoryApi,
    LedgerApi,
    OrderStoreApi,
    PurchaseApi,
    PurchaseConfig,
    PurchaseError,
    ReconcileError,
    ReconcilerApi,
    ReferralApi,
    ReferralConfig,
};
pub use traits::StoreDatabase;
