use thiserror::Error;

use crate::db_types::{Account, NewAccount};

#[derive(Debug, Clone, Error)]
pub enum AccountApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested account {0} does not exist")]
    AccountNotFound(i64),
    #[error("The referral code {0} is already in use")]
    ReferralCodeTaken(String),
    #[error("Invalid account details: {0}")]
    InvalidAccount(String),
}

impl From<sqlx::Error> for AccountApiError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() && db.message().contains("referral_code") => {
                AccountApiError::ReferralCodeTaken(db.message().to_string())
            },
            e => AccountApiError::DatabaseError(e.to_string()),
        }
    }
}

/// The `AccountManagement` trait defines behaviour for registering and finding storefront accounts.
///
/// Accounts are never hard-deleted, and their balances are never written through this trait. See
/// [`crate::traits::LedgerManagement`] for balance changes.
#[allow(async_fn_in_trait)]
pub trait AccountManagement {
    /// Creates an account for the given chat identity, if one does not exist yet.
    ///
    /// This call is idempotent on `external_id`. The second value in the result is `true` if the account was created by
    /// this call, and `false` if it already existed (in which case the existing record is returned untouched).
    ///
    /// Fails with [`AccountApiError::ReferralCodeTaken`] if another account already uses the referral code.
    async fn insert_account(&self, account: NewAccount) -> Result<(Account, bool), AccountApiError>;

    /// Fetches the account with the given id. If no account exists, `None` is returned.
    async fn fetch_account(&self, account_id: i64) -> Result<Option<Account>, AccountApiError>;

    async fn fetch_account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError>;

    async fn fetch_account_by_referral_code(&self, code: &str) -> Result<Option<Account>, AccountApiError>;
}
