use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{types::Json, QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderKind, OrderStatusType, StatusHistoryEntry},
    traits::{CurrencyTotal, OrderQueryFilter, OrderStoreError, Pagination, ProductSales, SalesStatistics},
};

/// Inserts a new order in `Pending` status, along with its first status-history entry.
///
/// This is not atomic. You can embed this call inside a transaction if you need to ensure atomicity, and pass
/// `&mut *tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, OrderStoreError> {
    if order.quantity <= 0 {
        return Err(OrderStoreError::InvalidOrder(format!("Quantity must be positive. Got {}", order.quantity)));
    }
    if order.unit_price < 0 {
        return Err(OrderStoreError::InvalidOrder(format!("Unit price cannot be negative. Got {}", order.unit_price)));
    }
    let total_amount = order.quantity.checked_mul(order.unit_price).ok_or_else(|| {
        OrderStoreError::InvalidOrder(format!("{} x {} overflows", order.quantity, order.unit_price))
    })?;
    let mut inserted: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                account_id,
                product_id,
                quantity,
                unit_price,
                total_amount,
                currency,
                kind,
                status,
                customer_note,
                payment_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *;
        "#,
    )
    .bind(order.account_id)
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(total_amount)
    .bind(order.currency)
    .bind(order.kind)
    .bind(OrderStatusType::Pending)
    .bind(order.customer_note)
    .bind(order.payment_id)
    .fetch_one(&mut *conn)
    .await?;
    let note = format!("{} created", inserted.kind);
    let entry = insert_history_entry(inserted.id, OrderStatusType::Pending, Some(note), Vec::new(), conn).await?;
    inserted.status_history.push(entry);
    debug!("📝️ Order #{} inserted for account #{}", inserted.id, inserted.account_id);
    Ok(inserted)
}

async fn insert_history_entry(
    order_id: i64,
    status: OrderStatusType,
    note: Option<String>,
    delivered_items: Vec<String>,
    conn: &mut SqliteConnection,
) -> Result<StatusHistoryEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO order_status_history (order_id, status, note, delivered_items)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(status)
    .bind(note)
    .bind(Json(delivered_items))
    .fetch_one(conn)
    .await
}

pub async fn fetch_status_history(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_status_history WHERE order_id = $1 ORDER BY id")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

/// Fetches the order with its status history attached.
pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    match order {
        Some(mut order) => {
            order.status_history = fetch_status_history(order.id, conn).await?;
            Ok(Some(order))
        },
        None => Ok(None),
    }
}

async fn attach_history(orders: &mut [Order], conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    for order in orders.iter_mut() {
        order.status_history = fetch_status_history(order.id, &mut *conn).await?;
    }
    Ok(())
}

/// Moves a `Pending` order to `status`, and appends the status-history entry.
///
/// The status check is part of the `UPDATE`, which is also the first statement, so this is safe to run in a
/// transaction alongside concurrent writers. If nothing was updated, the order is re-read to report why.
pub async fn update_order_status(
    id: i64,
    status: OrderStatusType,
    note: Option<String>,
    delivered_items: Vec<String>,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                status = $1,
                updated_at = CURRENT_TIMESTAMP,
                completed_at = CASE WHEN $1 = 'Completed' THEN CURRENT_TIMESTAMP ELSE completed_at END,
                delivered_items = CASE WHEN json_array_length($2) > 0 THEN $2 ELSE delivered_items END
            WHERE id = $3 AND status = 'Pending' AND $1 <> 'Pending'
            RETURNING *
        "#,
    )
    .bind(status)
    .bind(Json(&delivered_items))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    let Some(mut order) = updated else {
        let current = fetch_order(id, conn).await?.ok_or(OrderStoreError::OrderNotFound(id))?;
        if current.status == status {
            debug!("📝️ Order #{id} is already {status}. Update request skipped.");
            return Err(OrderStoreError::OrderModificationNoOp);
        }
        return Err(OrderStoreError::OrderModificationForbidden { id, from: current.status, to: status });
    };
    insert_history_entry(id, status, note, delivered_items, conn).await?;
    order.status_history = fetch_status_history(id, conn).await?;
    debug!("📝️ Order #{id} is now {status}");
    Ok(order)
}

/// A page of the account's orders, newest first, and the total number of orders for the account.
pub async fn fetch_orders_for_account(
    account_id: i64,
    pagination: &Pagination,
    conn: &mut SqliteConnection,
) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE account_id = $1")
        .bind(account_id)
        .fetch_one(&mut *conn)
        .await?;
    let mut orders: Vec<Order> = sqlx::query_as(
        "SELECT * FROM orders WHERE account_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
    )
    .bind(account_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&mut *conn)
    .await?;
    attach_history(&mut orders, conn).await?;
    Ok((orders, total))
}

/// Pending preorders for the product, first come first served.
pub async fn fetch_pending_preorders(product_id: i64, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let query = OrderQueryFilter::default()
        .with_product_id(product_id)
        .with_kind(OrderKind::Preorder)
        .with_status(OrderStatusType::Pending);
    search_orders(query, conn).await
}

/// Fetches orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting orders are ordered by `created_at` in ascending order, with ties broken by id.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    push_order_filters(&mut builder, &query, "");
    builder.push(" ORDER BY created_at ASC, id ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let mut orders = builder.build_query_as::<Order>().fetch_all(&mut *conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    attach_history(&mut orders, conn).await?;
    Ok(orders)
}

fn push_order_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &OrderQueryFilter, prefix: &str) {
    if query.is_empty() {
        return;
    }
    builder.push("WHERE ");
    let mut where_clause = builder.separated(" AND ");
    if let Some(account_id) = query.account_id {
        where_clause.push(format!("{prefix}account_id = "));
        where_clause.push_bind_unseparated(account_id);
    }
    if let Some(product_id) = query.product_id {
        where_clause.push(format!("{prefix}product_id = "));
        where_clause.push_bind_unseparated(product_id);
    }
    if let Some(kind) = query.kind {
        where_clause.push(format!("{prefix}kind = "));
        where_clause.push_bind_unseparated(kind.to_string());
    }
    if let Some(currency) = &query.currency {
        where_clause.push(format!("{prefix}currency = "));
        where_clause.push_bind_unseparated(currency.clone());
    }
    if let Some(statuses) = query.status.as_ref().filter(|s| !s.is_empty()) {
        where_clause.push(format!("{prefix}status IN ("));
        for (i, status) in statuses.iter().enumerate() {
            if i > 0 {
                where_clause.push_unseparated(", ");
            }
            where_clause.push_bind_unseparated(status.to_string());
        }
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push(format!("datetime({prefix}created_at) >= datetime("));
        where_clause.push_bind_unseparated(since);
        where_clause.push_unseparated(")");
    }
    if let Some(until) = query.until {
        where_clause.push(format!("datetime({prefix}created_at) <= datetime("));
        where_clause.push_bind_unseparated(until);
        where_clause.push_unseparated(")");
    }
}

pub async fn sales_statistics(
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
    conn: &mut SqliteConnection,
) -> Result<SalesStatistics, sqlx::Error> {
    let mut filter = OrderQueryFilter::default().with_status(OrderStatusType::Completed);
    filter.since = since;
    filter.until = until;

    let mut builder =
        QueryBuilder::new("SELECT currency, COUNT(*) AS orders, SUM(total_amount) AS total_amount FROM orders ");
    push_order_filters(&mut builder, &filter, "");
    builder.push(" GROUP BY currency ORDER BY currency");
    let totals = builder.build_query_as::<CurrencyTotal>().fetch_all(&mut *conn).await?;

    let mut builder = QueryBuilder::new(
        r#"
        SELECT
            o.product_id AS product_id,
            p.name AS product_name,
            o.currency AS currency,
            COUNT(*) AS orders,
            SUM(o.quantity) AS quantity,
            SUM(o.total_amount) AS total_amount
        FROM orders o JOIN products p ON p.id = o.product_id
        "#,
    );
    push_order_filters(&mut builder, &filter, "o.");
    builder.push(" GROUP BY o.product_id, o.currency ORDER BY total_amount DESC, o.product_id");
    let products = builder.build_query_as::<ProductSales>().fetch_all(conn).await?;

    let total_orders = totals.iter().map(|t| t.orders).sum();
    Ok(SalesStatistics { total_orders, totals, products })
}
