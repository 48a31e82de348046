use gamekey_common::Coins;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::Referral,
    traits::{Pagination, ReferralStatistics},
};

/// Inserts a pending referral. The unique constraint on `referred_id` means an account can only be referred once. If
/// a referral already exists, nothing is written and `None` is returned.
pub async fn insert_referral(
    referrer_id: i64,
    referred_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Referral>, sqlx::Error> {
    let referral: Option<Referral> = sqlx::query_as(
        r#"
            INSERT INTO referrals (referrer_id, referred_id) VALUES ($1, $2)
            ON CONFLICT (referred_id) DO NOTHING
            RETURNING *;
        "#,
    )
    .bind(referrer_id)
    .bind(referred_id)
    .fetch_optional(conn)
    .await?;
    if let Some(r) = &referral {
        debug!("🤝️ Referral #{} recorded: #{referrer_id} referred #{referred_id}", r.id);
    }
    Ok(referral)
}

pub async fn add_coins_earned(
    referral_id: i64,
    amount: Coins,
    conn: &mut SqliteConnection,
) -> Result<Referral, sqlx::Error> {
    sqlx::query_as("UPDATE referrals SET coins_earned = coins_earned + $1 WHERE id = $2 RETURNING *")
        .bind(amount)
        .bind(referral_id)
        .fetch_one(conn)
        .await
}

/// Flips the referral of `referred_id` to completed, but only if it is still pending and the first-purchase bonus has
/// not been paid. The guard and the flip are one statement, so only one caller can ever get the row back.
pub async fn claim_first_purchase(
    referred_id: i64,
    bonus: Coins,
    conn: &mut SqliteConnection,
) -> Result<Option<Referral>, sqlx::Error> {
    sqlx::query_as(
        r#"
            UPDATE referrals SET
                status = 'Completed',
                first_purchase_paid = 1,
                coins_earned = coins_earned + $1,
                completed_at = CURRENT_TIMESTAMP
            WHERE referred_id = $2 AND status = 'Pending' AND first_purchase_paid = 0
            RETURNING *
        "#,
    )
    .bind(bonus)
    .bind(referred_id)
    .fetch_optional(conn)
    .await
}

pub async fn fetch_referral_for_referred(
    referred_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Referral>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM referrals WHERE referred_id = $1").bind(referred_id).fetch_optional(conn).await
}

pub async fn fetch_referrals_for_referrer(
    referrer_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<Referral>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM referrals WHERE referrer_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3")
        .bind(referrer_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(conn)
        .await
}

pub async fn statistics(referrer_id: i64, conn: &mut SqliteConnection) -> Result<ReferralStatistics, sqlx::Error> {
    sqlx::query_as(
        r#"
            SELECT
                COUNT(*) AS total,
                COALESCE(SUM(CASE WHEN status = 'Completed' THEN 1 ELSE 0 END), 0) AS completed,
                COALESCE(SUM(CASE WHEN status = 'Pending' THEN 1 ELSE 0 END), 0) AS pending,
                COALESCE(SUM(coins_earned), 0) AS coins_earned
            FROM referrals
            WHERE referrer_id = $1
        "#,
    )
    .bind(referrer_id)
    .fetch_one(conn)
    .await
}
