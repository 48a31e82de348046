use gamekey_common::{Coins, FiatAmount};
use log::{debug, trace};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewProduct, Product},
    traits::InventoryError,
};

/// Inserts the product and its initial stock. Run this inside a transaction so that the product never exists without
/// its stock.
pub async fn insert_product(product: NewProduct, conn: &mut SqliteConnection) -> Result<Product, InventoryError> {
    let stock_len = product.stock.len();
    let inserted: Product = sqlx::query_as(
        r#"
            INSERT INTO products (
                name,
                description,
                category,
                price_fiat,
                fiat_currency,
                price_coins,
                allow_preorder,
                preorder_note
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(product.name)
    .bind(product.description)
    .bind(product.category)
    .bind(product.price_fiat)
    .bind(product.fiat_currency)
    .bind(product.price_coins)
    .bind(product.allow_preorder)
    .bind(product.preorder_note)
    .fetch_one(&mut *conn)
    .await?;
    append_items(inserted.id, &product.stock, conn).await?;
    let product = refresh_availability(inserted.id, conn).await?;
    debug!("📦️ Product #{} [{}] created with {} items in stock", product.id, product.name, stock_len);
    Ok(product)
}

pub async fn fetch_product(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_products(only_available: bool, conn: &mut SqliteConnection) -> Result<Vec<Product>, sqlx::Error> {
    let sql = if only_available {
        "SELECT * FROM products WHERE is_available = 1 OR (is_enabled = 1 AND allow_preorder = 1) ORDER BY name, id"
    } else {
        "SELECT * FROM products ORDER BY name, id"
    };
    sqlx::query_as(sql).fetch_all(conn).await
}

pub async fn available_count(product_id: i64, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM product_stock WHERE product_id = $1").bind(product_id).fetch_one(conn).await
}

pub async fn fetch_stock(product_id: i64, conn: &mut SqliteConnection) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT content FROM product_stock WHERE product_id = $1 ORDER BY position")
        .bind(product_id)
        .fetch_all(conn)
        .await
}

/// Removes up to `quantity` items from the front of the stock in a single statement and returns them in stock order.
///
/// The caller must check that the full quantity came back, and roll the transaction back if it did not.
pub async fn take_from_front(
    product_id: i64,
    quantity: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, sqlx::Error> {
    let mut rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
            DELETE FROM product_stock
            WHERE id IN (
                SELECT id FROM product_stock WHERE product_id = $1 ORDER BY position LIMIT $2
            )
            RETURNING content, position
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_all(conn)
    .await?;
    // RETURNING makes no promises about row order
    rows.sort_by_key(|(_, position)| *position);
    trace!("📦️ Took {} items from the front of product #{product_id}", rows.len());
    Ok(rows.into_iter().map(|(content, _)| content).collect())
}

/// Puts items back at the front of the stock. Each item goes in just ahead of the current front, so inserting in
/// reverse keeps the items in their original relative order.
pub async fn prepend_items(product_id: i64, items: &[String], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for item in items.iter().rev() {
        sqlx::query(
            r#"
                INSERT INTO product_stock (product_id, position, content)
                VALUES ($1, (SELECT COALESCE(MIN(position), 1) FROM product_stock WHERE product_id = $1) - 1, $2)
            "#,
        )
        .bind(product_id)
        .bind(item)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Appends items to the back of the stock, in the order given.
pub async fn append_items(product_id: i64, items: &[String], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for item in items {
        sqlx::query(
            r#"
                INSERT INTO product_stock (product_id, position, content)
                VALUES ($1, (SELECT COALESCE(MAX(position), 0) FROM product_stock WHERE product_id = $1) + 1, $2)
            "#,
        )
        .bind(product_id)
        .bind(item)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Recomputes the derived availability flag from the admin switch and the current stock.
pub async fn refresh_availability(product_id: i64, conn: &mut SqliteConnection) -> Result<Product, InventoryError> {
    let product: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET
                is_available = (is_enabled AND EXISTS (SELECT 1 FROM product_stock WHERE product_id = products.id)),
                updated_at = CURRENT_TIMESTAMP
            WHERE id = $1
            RETURNING *
        "#,
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    product.ok_or(InventoryError::ProductNotFound(product_id))
}

/// A no-op write that checks the product exists and takes the database write lock for the rest of the transaction.
pub async fn lock_product(product_id: i64, conn: &mut SqliteConnection) -> Result<(), InventoryError> {
    let result = sqlx::query("UPDATE products SET updated_at = CURRENT_TIMESTAMP WHERE id = $1")
        .bind(product_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(InventoryError::ProductNotFound(product_id));
    }
    Ok(())
}

pub async fn set_enabled(product_id: i64, enabled: bool, conn: &mut SqliteConnection) -> Result<(), InventoryError> {
    let result = sqlx::query("UPDATE products SET is_enabled = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(enabled)
        .bind(product_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(InventoryError::ProductNotFound(product_id));
    }
    Ok(())
}

pub async fn update_prices(
    product_id: i64,
    price_fiat: FiatAmount,
    price_coins: Coins,
    conn: &mut SqliteConnection,
) -> Result<Product, InventoryError> {
    let product: Option<Product> = sqlx::query_as(
        r#"
            UPDATE products SET price_fiat = $1, price_coins = $2, updated_at = CURRENT_TIMESTAMP
            WHERE id = $3
            RETURNING *
        "#,
    )
    .bind(price_fiat)
    .bind(price_coins)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    product.ok_or(InventoryError::ProductNotFound(product_id))
}
