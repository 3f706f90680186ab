use log::debug;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::{
    db_types::{PickupLocation, SystemSettings},
    traits::SettingsUpdate,
};

/// The settings row is a singleton seeded by the migrations, so this never returns zero rows.
pub async fn fetch_settings(conn: &mut SqliteConnection) -> Result<SystemSettings, sqlx::Error> {
    sqlx::query_as("SELECT * FROM system_settings WHERE id = 1").fetch_one(conn).await
}

pub async fn update_settings(
    update: SettingsUpdate,
    conn: &mut SqliteConnection,
) -> Result<SystemSettings, sqlx::Error> {
    if update.is_empty() {
        return fetch_settings(conn).await;
    }
    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE system_settings SET ");
    let mut fields = builder.separated(", ");
    if let Some(maintenance) = update.maintenance_mode {
        fields.push("maintenance_mode = ").push_bind_unseparated(maintenance);
    }
    if let Some(pct) = update.commission_percentage {
        fields.push("commission_percentage = ").push_bind_unseparated(pct);
    }
    if let Some(fee) = update.base_delivery_fee {
        fields.push("base_delivery_fee = ").push_bind_unseparated(fee);
    }
    if let Some(rate) = update.per_km_rate {
        fields.push("per_km_rate = ").push_bind_unseparated(rate);
    }
    if let Some(area) = update.service_area {
        fields.push("service_area = ").push_bind_unseparated(area);
    }
    fields.push("updated_at = CURRENT_TIMESTAMP");
    builder.push(" WHERE id = 1 RETURNING *");
    let settings = builder.build_query_as::<SystemSettings>().fetch_one(conn).await?;
    debug!("🗃️ System settings updated");
    Ok(settings)
}

pub async fn fetch_pickup_locations(conn: &mut SqliteConnection) -> Result<Vec<PickupLocation>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM pickup_locations ORDER BY name ASC").fetch_all(conn).await
}

pub async fn upsert_pickup_location(
    location: &PickupLocation,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO pickup_locations (name, latitude, longitude) VALUES ($1, $2, $3)
        ON CONFLICT (name) DO UPDATE SET latitude = excluded.latitude, longitude = excluded.longitude
        "#,
    )
    .bind(&location.name)
    .bind(location.latitude)
    .bind(location.longitude)
    .execute(conn)
    .await?;
    Ok(())
}
