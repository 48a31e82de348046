use chrono::{DateTime, Utc};
use log::debug;
use sqlx::{types::Json, SqliteConnection};

use crate::{
    db_types::{NewPaymentTransaction, PaymentStatus, PaymentTransaction},
    traits::{Pagination, PaymentStoreError},
};

pub async fn insert_payment(
    payment: NewPaymentTransaction,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentStoreError> {
    let provider_tx_id = payment.provider_tx_id.clone();
    let result = sqlx::query_as(
        r#"
            INSERT INTO payment_transactions (
                account_id,
                provider,
                provider_tx_id,
                amount,
                currency,
                pay_url,
                metadata
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(payment.account_id)
    .bind(payment.provider)
    .bind(payment.provider_tx_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.pay_url)
    .bind(Json(payment.intent))
    .fetch_one(conn)
    .await;
    match result {
        Ok(payment) => {
            debug!("🔄️ Payment [{provider_tx_id}] recorded as pending");
            Ok(payment)
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            Err(PaymentStoreError::PaymentAlreadyExists(provider_tx_id))
        },
        Err(e) => Err(e.into()),
    }
}

pub async fn fetch_payment(id: i64, conn: &mut SqliteConnection) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_payment_by_provider_id(
    provider_tx_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE provider_tx_id = $1")
        .bind(provider_tx_id)
        .fetch_optional(conn)
        .await
}

/// Moves a pending payment to `status`. The `status = 'Pending'` guard in the `UPDATE` means that, of any number of
/// concurrent or repeated calls, only the first one gets a row back.
pub async fn transition_status(
    provider_tx_id: &str,
    status: PaymentStatus,
    failure_reason: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Option<PaymentTransaction>, PaymentStoreError> {
    let updated: Option<PaymentTransaction> = sqlx::query_as(
        r#"
            UPDATE payment_transactions SET
                status = $1,
                failure_reason = COALESCE($2, failure_reason),
                updated_at = CURRENT_TIMESTAMP
            WHERE provider_tx_id = $3 AND status = 'Pending' AND $1 <> 'Pending'
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(failure_reason)
    .bind(provider_tx_id)
    .fetch_optional(&mut *conn)
    .await?;
    if updated.is_none() && fetch_payment_by_provider_id(provider_tx_id, conn).await?.is_none() {
        return Err(PaymentStoreError::PaymentNotFound(provider_tx_id.to_string()));
    }
    Ok(updated)
}

pub async fn link_order(
    payment_id: i64,
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<PaymentTransaction, PaymentStoreError> {
    let updated: Option<PaymentTransaction> = sqlx::query_as(
        "UPDATE payment_transactions SET order_id = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *",
    )
    .bind(order_id)
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    updated.ok_or(PaymentStoreError::PaymentIdNotFound(payment_id))
}

pub async fn fetch_pending_payments(
    created_before: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    match created_before {
        Some(before) => {
            sqlx::query_as(
                r#"
                    SELECT * FROM payment_transactions
                    WHERE status = 'Pending' AND datetime(created_at) <= datetime($1)
                    ORDER BY created_at, id
                "#,
            )
            .bind(before)
            .fetch_all(conn)
            .await
        },
        None => {
            sqlx::query_as("SELECT * FROM payment_transactions WHERE status = 'Pending' ORDER BY created_at, id")
                .fetch_all(conn)
                .await
        },
    }
}

pub async fn fetch_payments_for_account(
    account_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE account_id = $1 ORDER BY id DESC LIMIT $2 OFFSET $3")
        .bind(account_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(conn)
        .await
}

pub async fn fetch_payments_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<PaymentTransaction>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}
