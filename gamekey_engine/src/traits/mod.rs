//! # Storage and collaborator contracts
//!
//! This module defines the behaviour that backends need to expose in order to be driven by the store APIs, plus the
//! outbound collaborators (messaging and external payments) that the engine calls but does not implement.
//!
//! ## Storage
//! * [`AccountManagement`] registers accounts and looks them up by id, chat identity or referral code.
//! * [`LedgerManagement`] owns every balance mutation. A balance only ever changes in the same transaction that
//!   appends the matching ledger entry.
//! * [`InventoryManagement`] owns product stock and the atomic take/release of digital content.
//! * [`OrderManagement`] owns order records and their append-only status history.
//! * [`PaymentManagement`] tracks external payment attempts and their (idempotent) status transitions.
//! * [`ReferralManagement`] records referrer relationships and pays the referral bonuses.
//! * [`StoreDatabase`] bundles all of the above into a single backend.
//!
//! `debit` and `allocate` are the two check-then-act operations in the system. Backends must implement each of them as
//! a single conditional write so that two concurrent callers can never both pass the precondition.
//!
//! ## Collaborators
//! * [`Notifier`] sends rendered messages to customers. Failures are logged by callers and never roll anything back.
//! * [`PaymentProvider`] creates external payments and reports their status.
mod account_management;
mod data_objects;
mod inventory_management;
mod ledger_management;
mod notifier;
mod order_management;
mod payment_management;
mod payment_provider;
mod referral_management;
mod store_database;

pub use account_management::{AccountApiError, AccountManagement};
pub use data_objects::{
    CurrencyTotal,
    LedgerKindTotal,
    LedgerStatistics,
    OrderQueryFilter,
    Pagination,
    ProductSales,
    ReferralStatistics,
    SalesStatistics,
};
pub use inventory_management::{InventoryError, InventoryManagement};
pub use ledger_management::{LedgerError, LedgerManagement};
pub use notifier::{Notification, Notifier, NotifierError};
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_management::{PaymentManagement, PaymentStoreError};
pub use payment_provider::{ExternalPayment, ExternalPaymentRequest, PaymentProvider, PaymentProviderError};
pub use referral_management::{ReferralError, ReferralManagement};
pub use store_database::StoreDatabase;
