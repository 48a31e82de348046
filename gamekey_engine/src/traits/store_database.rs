use crate::traits::{
    AccountManagement,
    InventoryManagement,
    LedgerManagement,
    OrderManagement,
    PaymentManagement,
    ReferralManagement,
};

/// This trait bundles the behaviour a backend needs in order to drive every store API.
///
/// The store APIs only ever ask for the narrow trait(s) they use, but the orchestrating APIs clone the backend into
/// their collaborators, so a full backend must be cheap to clone (e.g. a handle to a connection pool).
#[allow(async_fn_in_trait)]
pub trait StoreDatabase:
    Clone + AccountManagement + LedgerManagement + InventoryManagement + OrderManagement + PaymentManagement + ReferralManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes the database connection.
    async fn close(&mut self) {}
}
