//! The ledger engine. Every coin balance change in the store goes through here.
use std::fmt::Debug;

use gamekey_common::Coins;
use log::*;

use crate::{
    db_types::{Account, LedgerEntry, LedgerEntryKind, NewLedgerEntry},
    traits::{LedgerError, LedgerManagement, LedgerStatistics, Pagination},
};

pub struct LedgerApi<B> {
    db: B,
}

impl<B: Debug> Debug for LedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LedgerApi ({:?})", self.db)
    }
}

impl<B> LedgerApi<B>
where B: LedgerManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Appends a credit entry and raises the balance by `entry.amount`, which must be positive.
    pub async fn credit(&self, entry: NewLedgerEntry) -> Result<Account, LedgerError> {
        let (account, _) = self.db.credit(entry).await?;
        Ok(account)
    }

    /// Appends a debit entry and lowers the balance by `entry.amount`, which must be positive.
    ///
    /// Fails with [`LedgerError::InsufficientFunds`] and changes nothing if the balance at the time of the write cannot
    /// cover the amount.
    pub async fn debit(&self, entry: NewLedgerEntry) -> Result<Account, LedgerError> {
        let (account, _) = self.db.debit(entry).await?;
        Ok(account)
    }

    pub async fn balance(&self, account_id: i64) -> Result<Coins, LedgerError> {
        self.db.fetch_balance(account_id).await
    }

    /// The account's ledger entries, newest first.
    pub async fn history(&self, account_id: i64, pagination: &Pagination) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.db.fetch_ledger_entries(account_id, pagination).await
    }

    /// The sum of every ledger entry for the account, computed from the log rather than the cached balance.
    pub async fn ledger_sum(&self, account_id: i64) -> Result<Coins, LedgerError> {
        self.db.ledger_sum(account_id).await
    }

    /// True if the cached balance agrees with the entry log.
    pub async fn is_consistent(&self, account_id: i64) -> Result<bool, LedgerError> {
        let balance = self.balance(account_id).await?;
        let sum = self.ledger_sum(account_id).await?;
        if balance != sum {
            error!("🪙️🚨️ Account #{account_id} balance {balance} does not match its ledger sum {sum}");
        }
        Ok(balance == sum)
    }

    /// A manual correction by an administrator. Positive amounts are credited and negative amounts debited.
    pub async fn admin_adjust(&self, account_id: i64, amount: Coins, description: &str) -> Result<Account, LedgerError> {
        let entry = NewLedgerEntry::new(account_id, amount.abs(), LedgerEntryKind::AdminAdjustment, description);
        let account = if amount.is_positive() {
            self.credit(entry).await?
        } else if amount.value() < 0 {
            self.debit(entry).await?
        } else {
            return Err(LedgerError::InvalidAmount(amount));
        };
        info!("🪙️ Admin adjustment of {amount} applied to account #{account_id}: {description}");
        Ok(account)
    }

    pub async fn statistics(&self) -> Result<LedgerStatistics, LedgerError> {
        self.db.ledger_statistics().await
    }
}
