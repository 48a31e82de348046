use gamekey_common::Coins;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Account, NewAccount},
    traits::AccountApiError,
};

/// Inserts the account, returning `false` in the second parameter if an account with the same external id already
/// exists. In that case the existing account is returned unchanged.
pub async fn idempotent_insert(
    account: NewAccount,
    conn: &mut SqliteConnection,
) -> Result<(Account, bool), AccountApiError> {
    let external_id = account.external_id.clone();
    let inserted: Option<Account> = sqlx::query_as(
        r#"
            INSERT INTO accounts (external_id, username, referral_code)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(account.external_id)
    .bind(account.username)
    .bind(account.referral_code)
    .fetch_optional(&mut *conn)
    .await?;
    match inserted {
        Some(account) => {
            debug!("🗃️ Account #{} created for [{external_id}]", account.id);
            Ok((account, true))
        },
        None => {
            let existing = fetch_account_by_external_id(&external_id, conn).await?.ok_or_else(|| {
                AccountApiError::DatabaseError(format!("Account for {external_id} conflicted but cannot be found"))
            })?;
            Ok((existing, false))
        },
    }
}

pub async fn fetch_account(id: i64, conn: &mut SqliteConnection) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_account_by_external_id(
    external_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE external_id = $1").bind(external_id).fetch_optional(conn).await
}

pub async fn fetch_account_by_referral_code(
    code: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Account>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM accounts WHERE referral_code = $1")
        .bind(code.trim().to_ascii_uppercase())
        .fetch_optional(conn)
        .await
}

pub async fn account_exists(id: i64, conn: &mut SqliteConnection) -> Result<bool, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM accounts WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(id.is_some())
}

/// Sets the referrer for an account that does not have one yet. Returns `false` if the account already had a referrer.
pub async fn set_referrer(
    account_id: i64,
    referrer_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE accounts SET referrer_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND referrer_id IS NULL",
    )
    .bind(referrer_id)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Adds to the cumulative referral earnings. This is a statistic only. The coins themselves must be credited through the
/// ledger in the same transaction.
pub async fn add_referral_earnings(
    account_id: i64,
    amount: Coins,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE accounts SET referral_earnings = referral_earnings + $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2",
    )
    .bind(amount)
    .bind(account_id)
    .execute(conn)
    .await?;
    Ok(())
}
