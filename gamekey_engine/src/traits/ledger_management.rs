use gamekey_common::Coins;
use thiserror::Error;

use crate::{
    db_types::{Account, LedgerEntry, NewLedgerEntry},
    traits::{LedgerStatistics, Pagination},
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested account {0} does not exist")]
    AccountNotFound(i64),
    #[error("Account {account_id} has insufficient funds to cover {requested}")]
    InsufficientFunds { account_id: i64, requested: Coins },
    #[error("Ledger amounts must be strictly positive. Got {0}")]
    InvalidAmount(Coins),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// The ledger owns every change to an account balance.
///
/// Implementations must keep the cached `Account::balance` equal to the sum of the account's ledger entries at all
/// times. In practice this means the balance update and the entry insert happen in one database transaction.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// Adds `entry.amount` to the account balance and appends a positive ledger entry.
    ///
    /// Returns the updated account and the new entry. Fails with `InvalidAmount` if the amount is not positive, and with
    /// `AccountNotFound` if the account does not exist.
    async fn credit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError>;

    /// Subtracts `entry.amount` from the account balance and appends a negative ledger entry.
    ///
    /// The sufficiency check and the balance change must be a single conditional write. If the balance cannot cover
    /// the amount at write time, nothing is written and `InsufficientFunds` is returned. There are no partial debits.
    async fn debit(&self, entry: NewLedgerEntry) -> Result<(Account, LedgerEntry), LedgerError>;

    /// The cached balance for the account.
    async fn fetch_balance(&self, account_id: i64) -> Result<Coins, LedgerError>;

    /// The account's ledger entries, newest first.
    async fn fetch_ledger_entries(
        &self,
        account_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;

    /// The sum of all ledger entries for the account, computed from the log rather than the cached balance.
    async fn ledger_sum(&self, account_id: i64) -> Result<Coins, LedgerError>;

    /// Store-wide totals of coins issued and spent.
    async fn ledger_statistics(&self) -> Result<LedgerStatistics, LedgerError>;
}
