use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{NewShop, Shop};

pub async fn fetch_shop(shop_id: &str, conn: &mut SqliteConnection) -> Result<Option<Shop>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shops WHERE shop_id = $1").bind(shop_id).fetch_optional(conn).await
}

pub async fn upsert_shop(shop: NewShop, conn: &mut SqliteConnection) -> Result<Shop, sqlx::Error> {
    let shop: Shop = sqlx::query_as(
        r#"
        INSERT INTO shops (shop_id, name, owner_id, cafeteria, latitude, longitude, approved)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (shop_id) DO UPDATE SET
            name = excluded.name,
            owner_id = excluded.owner_id,
            cafeteria = excluded.cafeteria,
            latitude = excluded.latitude,
            longitude = excluded.longitude,
            approved = excluded.approved,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *
        "#,
    )
    .bind(&shop.shop_id)
    .bind(&shop.name)
    .bind(&shop.owner_id)
    .bind(&shop.cafeteria)
    .bind(shop.latitude)
    .bind(shop.longitude)
    .bind(shop.approved)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Shop record saved: {}", shop.shop_id);
    Ok(shop)
}

pub async fn close_shop_until(
    shop_id: &str,
    until: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Shop>, sqlx::Error> {
    sqlx::query_as(
        "UPDATE shops SET closed_until = $1, updated_at = CURRENT_TIMESTAMP WHERE shop_id = $2 RETURNING *",
    )
    .bind(until)
    .bind(shop_id)
    .fetch_optional(conn)
    .await
}

/// Clears expired temporary closures in one sweep. Returns the number of shops reopened.
pub async fn reopen_expired_closures(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE shops SET closed_until = NULL, updated_at = CURRENT_TIMESTAMP WHERE closed_until IS NOT NULL AND \
         closed_until <= $1",
    )
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}
