use chrono::Utc;
use dpe_common::Money;
use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::{PayoutRequest, PayoutRequestStatus, RequesterType};

pub async fn insert_payout_request(
    requester_type: RequesterType,
    requester_id: &str,
    amount: Money,
    payout_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<PayoutRequest, sqlx::Error> {
    let request = sqlx::query_as(
        r#"
        INSERT INTO payout_requests (requester_type, requester_id, amount, payout_ref)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(requester_type.to_string())
    .bind(requester_id)
    .bind(amount)
    .bind(payout_ref)
    .fetch_one(conn)
    .await?;
    debug!("🗃️ Payout request {payout_ref} recorded");
    Ok(request)
}

pub async fn fetch_payout_request(id: i64, conn: &mut SqliteConnection) -> Result<Option<PayoutRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_requests WHERE id = $1").bind(id).fetch_optional(conn).await
}

pub async fn pending_request_for_actor(
    requester_type: RequesterType,
    requester_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRequest>, sqlx::Error> {
    sqlx::query_as(
        "SELECT * FROM payout_requests WHERE requester_type = $1 AND requester_id = $2 AND status = 'Pending' LIMIT 1",
    )
    .bind(requester_type.to_string())
    .bind(requester_id)
    .fetch_optional(conn)
    .await
}

pub async fn pending_payout_requests(conn: &mut SqliteConnection) -> Result<Vec<PayoutRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payout_requests WHERE status = 'Pending' ORDER BY created_at ASC")
        .fetch_all(conn)
        .await
}

/// Moves a request to its resolved status, guarded on the current status being in `allowed_from`. Returns `None`
/// when the guard fails, which the caller maps to either a replay no-op or a conflict.
pub async fn update_request_status(
    id: i64,
    allowed_from: &[PayoutRequestStatus],
    to: PayoutRequestStatus,
    admin_id: &str,
    note: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<PayoutRequest>, sqlx::Error> {
    let statuses = allowed_from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE payout_requests SET status = $1, admin_note = $2, processed_by = $3, processed_at = $4, updated_at = \
         CURRENT_TIMESTAMP WHERE id = $5 AND status IN ({statuses}) RETURNING *"
    );
    sqlx::query_as(&sql)
        .bind(to.to_string())
        .bind(note)
        .bind(admin_id)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await
}
