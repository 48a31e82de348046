use gamekey_common::Coins;
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, LedgerEntry, LedgerEntryKind, NewLedgerEntry, RelatedEntity},
    sqlite::db::accounts,
    traits::{LedgerError, LedgerKindTotal, LedgerStatistics, Pagination},
};

/// Adds `entry.amount` to the account balance and appends the matching ledger entry.
///
/// This is not atomic on its own. Run it inside a transaction and pass `&mut *tx` as the connection. The balance update
/// is the first statement, so it also serves to take the write lock.
pub async fn credit(entry: NewLedgerEntry, conn: &mut SqliteConnection) -> Result<(Account, LedgerEntry), LedgerError> {
    if !entry.amount.is_positive() {
        return Err(LedgerError::InvalidAmount(entry.amount));
    }
    let account: Option<Account> = sqlx::query_as(
        "UPDATE accounts SET balance = balance + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(entry.amount)
    .bind(entry.account_id)
    .fetch_optional(&mut *conn)
    .await?;
    let account = account.ok_or(LedgerError::AccountNotFound(entry.account_id))?;
    let amount = entry.amount;
    let entry = insert_entry(entry.account_id, amount, entry.kind, &entry.description, entry.related, conn).await?;
    debug!("🪙️ Credited {amount} to account #{}. New balance: {}", account.id, account.balance);
    Ok((account, entry))
}

/// Subtracts `entry.amount` from the account balance and appends the matching (negative) ledger entry.
///
/// The sufficiency check is part of the `UPDATE` itself, so it is evaluated against the balance at write time. If no
/// row is updated, the account either does not exist or cannot cover the amount, and nothing has been written.
pub async fn debit(entry: NewLedgerEntry, conn: &mut SqliteConnection) -> Result<(Account, LedgerEntry), LedgerError> {
    if !entry.amount.is_positive() {
        return Err(LedgerError::InvalidAmount(entry.amount));
    }
    let account: Option<Account> = sqlx::query_as(
        r#"
            UPDATE accounts SET balance = balance - $1, updated_at = CURRENT_TIMESTAMP
            WHERE id = $2 AND balance >= $1
            RETURNING *
        "#,
    )
    .bind(entry.amount)
    .bind(entry.account_id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(account) = account else {
        if accounts::account_exists(entry.account_id, conn).await? {
            trace!("🪙️ Account #{} cannot cover a debit of {}", entry.account_id, entry.amount);
            return Err(LedgerError::InsufficientFunds { account_id: entry.account_id, requested: entry.amount });
        }
        return Err(LedgerError::AccountNotFound(entry.account_id));
    };
    let amount = -entry.amount;
    let entry = insert_entry(entry.account_id, amount, entry.kind, &entry.description, entry.related, conn).await?;
    debug!("🪙️ Debited {} from account #{}. New balance: {}", -amount, account.id, account.balance);
    Ok((account, entry))
}

async fn insert_entry(
    account_id: i64,
    amount: Coins,
    kind: LedgerEntryKind,
    description: &str,
    related: Option<RelatedEntity>,
    conn: &mut SqliteConnection,
) -> Result<LedgerEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO ledger_entries (account_id, amount, kind, description, related_type, related_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(account_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .bind(related.map(|r| r.entity_type))
    .bind(related.map(|r| r.id))
    .fetch_one(conn)
    .await
}

pub async fn fetch_balance(account_id: i64, conn: &mut SqliteConnection) -> Result<Coins, LedgerError> {
    let balance: Option<Coins> = sqlx::query_scalar("SELECT balance FROM accounts WHERE id = $1")
        .bind(account_id)
        .fetch_optional(conn)
        .await?;
    balance.ok_or(LedgerError::AccountNotFound(account_id))
}

/// Newest entries first. Ties on `created_at` are broken by insertion order.
pub async fn fetch_entries(
    account_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM ledger_entries WHERE account_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3")
        .bind(account_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(conn)
        .await
}

pub async fn ledger_sum(account_id: i64, conn: &mut SqliteConnection) -> Result<Coins, sqlx::Error> {
    let sum: i64 = sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0) FROM ledger_entries WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(conn)
        .await?;
    Ok(Coins::from(sum))
}

pub async fn statistics(conn: &mut SqliteConnection) -> Result<LedgerStatistics, sqlx::Error> {
    let (accounts, issued, spent): (i64, i64, i64) = sqlx::query_as(
        r#"
            SELECT
                COUNT(DISTINCT account_id),
                COALESCE(SUM(CASE WHEN amount > 0 THEN amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN amount < 0 THEN -amount ELSE 0 END), 0)
            FROM ledger_entries
        "#,
    )
    .fetch_one(&mut *conn)
    .await?;
    let by_kind: Vec<LedgerKindTotal> = sqlx::query_as(
        "SELECT kind, COUNT(*) AS entries, SUM(amount) AS amount FROM ledger_entries GROUP BY kind ORDER BY kind",
    )
    .fetch_all(conn)
    .await?;
    Ok(LedgerStatistics { accounts, total_issued: Coins::from(issued), total_spent: Coins::from(spent), by_kind })
}
