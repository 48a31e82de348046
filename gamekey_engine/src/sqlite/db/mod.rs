//! Low-level SQLite queries, one sub-module per table group.
//!
//! Everything here is a free function taking `&mut SqliteConnection`, so the same call works on a pooled connection
//! or inside a transaction opened by [`crate::SqliteDatabase`].
//!
//! Functions that are meant to run inside a write transaction are written so that the transaction's first statement
//! is a write. This takes SQLite's write lock up front, so concurrent writers queue behind each other on the busy
//! timeout instead of failing on a read-to-write lock upgrade.

use std::{env, str::FromStr, time::Duration};

use log::info;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Error as SqlxError,
    SqlitePool,
};

pub mod accounts;
pub mod ledger;
pub mod orders;
pub mod payments;
pub mod products;
pub mod referrals;

const SQLITE_DB_URL: &str = "sqlite://data/gamekey_store.db";
/// How long a writer waits for the lock before giving up with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

pub fn db_url() -> String {
    let result = env::var("GK_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ GK_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let options = SqliteConnectOptions::from_str(url)?.busy_timeout(BUSY_TIMEOUT).foreign_keys(true);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}
