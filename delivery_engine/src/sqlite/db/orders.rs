use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{NewOrder, NewOrderItem, NewShopOrder, Order, OrderCode, OrderItem, Shop, ShopOrder, ShopOrderStatus},
    helpers::new_order_code,
    order_objects::OrderQueryFilter,
    traits::{DeliveryGatewayError, FullOrder, ShopOrderDetail},
};

/// Inserts the order row, one shop order per merchant, and all line items. Callers wrap this in a transaction.
/// A fresh order code is generated here; the unique index on `order_code` backstops collisions.
pub async fn insert_order_aggregate(
    order: NewOrder,
    conn: &mut SqliteConnection,
) -> Result<FullOrder, DeliveryGatewayError> {
    let code = new_order_code();
    let order_row: Order = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_code,
                customer_id,
                payment_method,
                address_text,
                address_lat,
                address_lng,
                delivery_fee,
                total_amount
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(code.as_str())
    .bind(&order.customer_id)
    .bind(order.payment_method.to_string())
    .bind(&order.address.text)
    .bind(order.address.latitude)
    .bind(order.address.longitude)
    .bind(order.delivery_fee)
    .bind(order.total_amount)
    .fetch_one(&mut *conn)
    .await?;
    debug!("📝️ Order {} inserted with id {}", order_row.order_code, order_row.id);
    let mut shop_orders = Vec::with_capacity(order.shop_orders.len());
    for group in &order.shop_orders {
        let so = insert_shop_order(order_row.id, group, &mut *conn).await?;
        let mut items = Vec::with_capacity(group.items.len());
        for item in &group.items {
            items.push(insert_order_item(so.id, item, &mut *conn).await?);
        }
        shop_orders.push(ShopOrderDetail { shop_order: so, items });
    }
    Ok(FullOrder { order: order_row, shop_orders })
}

async fn insert_shop_order(
    order_id: i64,
    group: &NewShopOrder,
    conn: &mut SqliteConnection,
) -> Result<ShopOrder, DeliveryGatewayError> {
    let so = sqlx::query_as(
        r#"
            INSERT INTO shop_orders (order_id, shop_id, owner_id, subtotal)
            VALUES ($1, $2, $3, $4)
            RETURNING *;
        "#,
    )
    .bind(order_id)
    .bind(&group.shop_id)
    .bind(&group.owner_id)
    .bind(group.subtotal)
    .fetch_one(conn)
    .await?;
    Ok(so)
}

async fn insert_order_item(
    shop_order_id: i64,
    item: &NewOrderItem,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, DeliveryGatewayError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO order_items (shop_order_id, item_id, name, unit_price, quantity, options, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(shop_order_id)
    .bind(&item.item_id)
    .bind(&item.name)
    .bind(item.unit_price)
    .bind(item.quantity)
    .bind(&item.options)
    .bind(&item.note)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

pub async fn fetch_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_order_by_code(code: &OrderCode, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_code = $1").bind(code.as_str()).fetch_optional(conn).await
}

pub async fn fetch_shop_order(id: i64, conn: &mut SqliteConnection) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shop_orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn fetch_shop_orders_for_order(
    order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShopOrder>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shop_orders WHERE order_id = $1 ORDER BY id ASC").bind(order_id).fetch_all(conn).await
}

pub async fn fetch_order_items(
    shop_order_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE shop_order_id = $1 ORDER BY id ASC")
        .bind(shop_order_id)
        .fetch_all(conn)
        .await
}

/// Assembles the full aggregate for the given order row.
pub async fn assemble_full_order(order: Order, conn: &mut SqliteConnection) -> Result<FullOrder, sqlx::Error> {
    let shop_orders = fetch_shop_orders_for_order(order.id, &mut *conn).await?;
    let mut details = Vec::with_capacity(shop_orders.len());
    for so in shop_orders {
        let items = fetch_order_items(so.id, &mut *conn).await?;
        details.push(ShopOrderDetail { shop_order: so, items });
    }
    Ok(FullOrder { order, shop_orders: details })
}

/// Fetches shop orders according to criteria specified in the `OrderQueryFilter`
///
/// Resulting rows are ordered by `created_at` in ascending order
pub async fn search_shop_orders(
    query: OrderQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShopOrder>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM shop_orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id);
    }
    if let Some(shop_id) = query.shop_id {
        where_clause.push("shop_id = ");
        where_clause.push_bind_unseparated(shop_id);
    }
    if let Some(owner_id) = query.owner_id {
        where_clause.push("owner_id = ");
        where_clause.push_bind_unseparated(owner_id);
    }
    if let Some(courier_id) = query.courier_id {
        where_clause.push("courier_id = ");
        where_clause.push_bind_unseparated(courier_id);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<ShopOrder>();
    let rows = query.fetch_all(conn).await?;
    trace!("Result of search_shop_orders: {:?}", rows.len());
    Ok(rows)
}

/// Single conditional update driving the merchant state machine. The `WHERE status = from` clause means a stale
/// caller matches nothing and gets a conflict instead of overwriting a newer state.
pub async fn advance_status(
    id: i64,
    from: ShopOrderStatus,
    to: ShopOrderStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    let stamp = match to {
        ShopOrderStatus::Preparing => ", preparing_started_at = COALESCE(preparing_started_at, CURRENT_TIMESTAMP)",
        ShopOrderStatus::OutForDelivery => ", ready_at = COALESCE(ready_at, CURRENT_TIMESTAMP)",
        _ => "",
    };
    let sql = format!(
        "UPDATE shop_orders SET status = $1, updated_at = CURRENT_TIMESTAMP{stamp} WHERE id = $2 AND status = $3 \
         RETURNING *"
    );
    sqlx::query_as(&sql).bind(to.to_string()).bind(id).bind(from.to_string()).fetch_optional(conn).await
}

/// Cancels the shop order if its current status is within `allowed_from`. Clears the assignment so a courier
/// holding the job sees it disappear rather than linger in a dead state.
///
/// `guard_pickup` adds `picked_up_at IS NULL` to the condition, so a cancel that read the row before a
/// concurrent pickup settlement committed still matches nothing.
pub async fn cancel_shop_order(
    id: i64,
    allowed_from: &[ShopOrderStatus],
    reason: &str,
    guard_pickup: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    let statuses = allowed_from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let pickup_clause = if guard_pickup { " AND picked_up_at IS NULL" } else { "" };
    let sql = format!(
        "UPDATE shop_orders SET status = 'Cancelled', cancel_reason = $1, cancelled_at = CURRENT_TIMESTAMP, \
         courier_id = NULL, updated_at = CURRENT_TIMESTAMP WHERE id = $2 AND status IN ({statuses}){pickup_clause} \
         RETURNING *"
    );
    sqlx::query_as(&sql).bind(reason).bind(id).fetch_optional(conn).await
}

/// Replaces the line items of a shop order and recomputes its subtotal. The order total is refreshed from the
/// stored subtotals so the aggregate invariant holds after the edit.
pub async fn replace_order_items(
    shop_order_id: i64,
    order_id: i64,
    items: &[NewOrderItem],
    conn: &mut SqliteConnection,
) -> Result<(), DeliveryGatewayError> {
    sqlx::query("DELETE FROM order_items WHERE shop_order_id = $1").bind(shop_order_id).execute(&mut *conn).await?;
    for item in items {
        insert_order_item(shop_order_id, item, &mut *conn).await?;
    }
    let subtotal: i64 = items.iter().map(|i| i.line_total().value()).sum();
    sqlx::query("UPDATE shop_orders SET subtotal = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2")
        .bind(subtotal)
        .bind(shop_order_id)
        .execute(&mut *conn)
        .await?;
    refresh_order_total(order_id, &mut *conn).await?;
    Ok(())
}

/// Recomputes `orders.total_amount` as the sum of live (non-cancelled) shop order subtotals plus the delivery fee.
pub async fn refresh_order_total(order_id: i64, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE orders SET
            total_amount = delivery_fee + (
                SELECT COALESCE(SUM(subtotal), 0) FROM shop_orders
                WHERE order_id = $1 AND status != 'Cancelled'
            ),
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $1
        "#,
    )
    .bind(order_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Unassigned shop orders in the courier-eligible set, joined with their shop.
pub async fn open_assignments(conn: &mut SqliteConnection) -> Result<Vec<(ShopOrder, Shop)>, sqlx::Error> {
    let shop_orders: Vec<ShopOrder> = sqlx::query_as(
        "SELECT * FROM shop_orders WHERE courier_id IS NULL AND status IN ('Preparing', 'OutForDelivery') ORDER BY \
         created_at ASC",
    )
    .fetch_all(&mut *conn)
    .await?;
    let mut result = Vec::with_capacity(shop_orders.len());
    for so in shop_orders {
        let shop: Option<Shop> =
            sqlx::query_as("SELECT * FROM shops WHERE shop_id = $1").bind(&so.shop_id).fetch_optional(&mut *conn).await?;
        if let Some(shop) = shop {
            result.push((so, shop));
        } else {
            trace!("📝️ Shop {} missing for open shop order {}. Skipping offer.", so.shop_id, so.id);
        }
    }
    Ok(result)
}

/// The claim. Zero rows updated means the assignment was already taken or left the eligible set; the caller lost
/// the race and nothing was written.
pub async fn try_claim(
    shop_order_id: i64,
    courier_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE shop_orders SET courier_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND courier_id IS NULL AND status IN ('Preparing', 'OutForDelivery')
        RETURNING *
        "#,
    )
    .bind(courier_id)
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

/// Releases a claim. Only the current assignee, only before pickup, only while still claimable.
pub async fn release_claim(
    shop_order_id: i64,
    courier_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE shop_orders SET courier_id = NULL, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND courier_id = $2 AND picked_up_at IS NULL
            AND status IN ('Preparing', 'OutForDelivery')
        RETURNING *
        "#,
    )
    .bind(shop_order_id)
    .bind(courier_id)
    .fetch_optional(conn)
    .await
}

/// Admin override: replaces or clears the assignee regardless of who currently holds the job.
pub async fn reassign(
    shop_order_id: i64,
    courier_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE shop_orders SET courier_id = $1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $2 AND status IN ('Preparing', 'OutForDelivery')
        RETURNING *
        "#,
    )
    .bind(courier_id)
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

pub async fn set_delivery_otp(
    shop_order_id: i64,
    otp: &str,
    expires_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE shop_orders SET otp = $1, otp_expires_at = $2, updated_at = CURRENT_TIMESTAMP WHERE id = $3 \
         RETURNING *",
    )
    .bind(otp)
    .bind(expires_at)
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

pub async fn confirm_arrival(shop_order_id: i64, conn: &mut SqliteConnection) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE shop_orders SET arrived_at_customer_at = COALESCE(arrived_at_customer_at, CURRENT_TIMESTAMP), \
         updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

/// Stamps `picked_up_at` if it is not already set. Zero rows means the pickup was already settled.
pub async fn stamp_picked_up(shop_order_id: i64, conn: &mut SqliteConnection) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE shop_orders SET picked_up_at = CURRENT_TIMESTAMP, updated_at = CURRENT_TIMESTAMP WHERE id = $1 AND \
         picked_up_at IS NULL RETURNING *",
    )
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

/// Terminal transition to `Delivered`. Zero rows means the shop order was already delivered.
pub async fn mark_delivered(shop_order_id: i64, conn: &mut SqliteConnection) -> Result<Option<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE shop_orders SET status = 'Delivered', delivered_at = CURRENT_TIMESTAMP, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $1 AND status != 'Delivered' RETURNING *",
    )
    .bind(shop_order_id)
    .fetch_optional(conn)
    .await
}

/// Marks an order as paid with the gateway's reference. Zero rows means the order was already paid (a webhook
/// replay) or the code did not match.
pub async fn mark_order_paid(
    order_code: &OrderCode,
    payment_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE orders SET paid = 1, payment_ref = $1, updated_at = CURRENT_TIMESTAMP WHERE order_code = $2 AND \
         paid = 0 RETURNING *",
    )
    .bind(payment_ref)
    .bind(order_code.as_str())
    .fetch_optional(conn)
    .await
}

pub async fn deliveries_for_courier_since(
    courier_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<ShopOrder>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM shop_orders WHERE courier_id = $1 AND status = 'Delivered' AND delivered_at >= $2 ORDER BY \
         delivered_at ASC",
    )
    .bind(courier_id)
    .bind(since)
    .fetch_all(conn)
    .await
}

pub async fn cancellation_count_for_customer(
    customer_id: &str,
    since: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*) FROM shop_orders
        JOIN orders ON shop_orders.order_id = orders.id
        WHERE orders.customer_id = $1 AND shop_orders.status = 'Cancelled' AND shop_orders.cancelled_at >= $2
        "#,
    )
    .bind(customer_id)
    .bind(since)
    .fetch_one(conn)
    .await?;
    Ok(count)
}
