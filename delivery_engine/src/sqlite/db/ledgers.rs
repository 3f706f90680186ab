//! The append-only money ledgers: merchant payments, courier/merchant wallet entries, job credit and platform
//! income. Every settlement insert here is an insert-if-absent keyed on the order reference, which is what makes
//! the settlement transactions replay-safe.
use dpe_common::Money;
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{
    CourierAccount,
    LedgerEntrySource,
    LedgerEntryStatus,
    LedgerEntryType,
    MerchantPayment,
    RequesterType,
    WalletEntry,
};

pub async fn ensure_courier_account(courier_id: &str, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO couriers (courier_id) VALUES ($1) ON CONFLICT (courier_id) DO NOTHING")
        .bind(courier_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn fetch_courier_account(
    courier_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<CourierAccount>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM couriers WHERE courier_id = $1").bind(courier_id).fetch_optional(conn).await
}

/// Adjusts the courier's cash float by `delta` (negative for debits). The account row is created on first touch.
pub async fn adjust_job_credit(
    courier_id: &str,
    delta: Money,
    conn: &mut SqliteConnection,
) -> Result<CourierAccount, sqlx::Error> {
    ensure_courier_account(courier_id, &mut *conn).await?;
    let account = sqlx::query_as(
        "UPDATE couriers SET job_credit = job_credit + $1, updated_at = CURRENT_TIMESTAMP WHERE courier_id = $2 \
         RETURNING *",
    )
    .bind(delta)
    .bind(courier_id)
    .fetch_one(conn)
    .await?;
    Ok(account)
}

/// Appends a merchant settlement row. Returns `false` when a row for this (shop, order, kind) already exists; the
/// caller treats that as an idempotent replay.
pub async fn insert_merchant_payment(
    shop_id: &str,
    charge_ref: &str,
    order_id: i64,
    amount: Money,
    wallet_credit: bool,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO merchant_payments (shop_id, charge_ref, order_id, amount, wallet_credit)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (shop_id, order_id, wallet_credit) DO NOTHING
        "#,
    )
    .bind(shop_id)
    .bind(charge_ref)
    .bind(order_id)
    .bind(amount)
    .bind(wallet_credit)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn merchant_payments_for_shop(
    shop_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<MerchantPayment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM merchant_payments WHERE shop_id = $1 ORDER BY created_at ASC")
        .bind(shop_id)
        .fetch_all(conn)
        .await
}

/// Records commission income for a shop order. Returns `false` on replay.
pub async fn insert_platform_income(
    shop_order_id: i64,
    amount: Money,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO platform_income (shop_order_id, amount) VALUES ($1, $2) ON CONFLICT (shop_order_id) DO NOTHING",
    )
    .bind(shop_order_id)
    .bind(amount)
    .execute(conn)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn platform_income_total(conn: &mut SqliteConnection) -> Result<Money, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as("SELECT COALESCE(SUM(amount), 0) FROM platform_income").fetch_one(conn).await?;
    Ok(Money::from_cents(total))
}

/// Appends a wallet ledger entry. For automatic settlement credits the partial unique index on
/// (actor, order, source, type) absorbs replays; returns `false` when nothing was inserted.
#[allow(clippy::too_many_arguments)]
pub async fn insert_wallet_entry(
    actor_type: RequesterType,
    actor_id: &str,
    payout_ref: &str,
    amount: Money,
    status: LedgerEntryStatus,
    entry_type: LedgerEntryType,
    source: LedgerEntrySource,
    order_id: Option<i64>,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO wallet_entries (actor_type, actor_id, payout_ref, amount, status, entry_type, source, order_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(actor_type.to_string())
    .bind(actor_id)
    .bind(payout_ref)
    .bind(amount)
    .bind(status.to_string())
    .bind(entry_type.to_string())
    .bind(source.to_string())
    .bind(order_id)
    .execute(conn)
    .await?;
    trace!("🗃️ Wallet entry {payout_ref}: inserted = {}", result.rows_affected() > 0);
    Ok(result.rows_affected() > 0)
}

pub async fn fetch_entry_by_ref(
    payout_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_entries WHERE payout_ref = $1").bind(payout_ref).fetch_optional(conn).await
}

pub async fn entries_for_actor(
    actor_type: RequesterType,
    actor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<WalletEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM wallet_entries WHERE actor_type = $1 AND actor_id = $2 ORDER BY created_at ASC")
        .bind(actor_type.to_string())
        .bind(actor_id)
        .fetch_all(conn)
        .await
}

/// Moves a ledger entry's status, but only when its current status is in `allowed_from`. Returns the updated
/// entry, or `None` when the entry was missing or already past the allowed set (a replay).
pub async fn update_entry_status(
    payout_ref: &str,
    allowed_from: &[LedgerEntryStatus],
    to: LedgerEntryStatus,
    conn: &mut SqliteConnection,
) -> Result<Option<WalletEntry>, sqlx::Error> {
    let statuses = allowed_from.iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
    let sql = format!(
        "UPDATE wallet_entries SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE payout_ref = $2 AND status IN \
         ({statuses}) RETURNING *"
    );
    sqlx::query_as(&sql).bind(to.to_string()).bind(payout_ref).fetch_optional(conn).await
}

/// Settled earnings for the derived balance: automatic wallet credits in `Paid` status.
pub async fn total_earnings(
    actor_type: RequesterType,
    actor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Money, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM wallet_entries
        WHERE actor_type = $1 AND actor_id = $2 AND source = 'Wallet' AND entry_type = 'Automatic'
            AND status = 'Paid'
        "#,
    )
    .bind(actor_type.to_string())
    .bind(actor_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_cents(total))
}

/// Completed withdrawals: manual wallet entries in `Paid` status.
pub async fn total_paid_out(
    actor_type: RequesterType,
    actor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Money, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM wallet_entries
        WHERE actor_type = $1 AND actor_id = $2 AND source = 'Wallet' AND entry_type = 'Manual'
            AND status = 'Paid'
        "#,
    )
    .bind(actor_type.to_string())
    .bind(actor_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_cents(total))
}

/// Withdrawals on their way out: manual wallet entries in `Pending` or `InTransit` status.
pub async fn total_pending_out(
    actor_type: RequesterType,
    actor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Money, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(amount), 0) FROM wallet_entries
        WHERE actor_type = $1 AND actor_id = $2 AND source = 'Wallet' AND entry_type = 'Manual'
            AND status IN ('Pending', 'InTransit')
        "#,
    )
    .bind(actor_type.to_string())
    .bind(actor_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_cents(total))
}

/// Merchant earnings are the delivery-settled wallet credits in the merchant payments ledger.
pub async fn merchant_wallet_earnings(shop_id: &str, conn: &mut SqliteConnection) -> Result<Money, sqlx::Error> {
    let (total,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(SUM(amount), 0) FROM merchant_payments WHERE shop_id = $1 AND wallet_credit = 1",
    )
    .bind(shop_id)
    .fetch_one(conn)
    .await?;
    Ok(Money::from_cents(total))
}
