use dpe_common::Money;
use thiserror::Error;

use crate::{
    db_types::{CourierAccount, MerchantPayment, PayoutRequest, RequesterType, WalletEntry},
    traits::data_objects::{PayoutResolution, WalletBalance},
};

/// Ledger and payout behaviour for courier and merchant wallets.
///
/// Balances are always derived from the ledgers at read time. The only writes this trait performs are append-only
/// ledger inserts and status transitions on existing entries.
#[allow(async_fn_in_trait)]
pub trait WalletManagement: Clone {
    async fn fetch_courier_account(&self, courier_id: &str) -> Result<Option<CourierAccount>, WalletApiError>;

    /// The derived balance for a courier or merchant wallet.
    ///
    /// `total_earnings` sums settled automatic wallet credits; `paid_out` sums paid manual withdrawals; `pending`
    /// sums pending and in-transit manual withdrawals. Job credit entries and automatic credits never count as
    /// withdrawals.
    async fn wallet_balance(&self, actor_type: RequesterType, actor_id: &str) -> Result<WalletBalance, WalletApiError>;

    async fn ledger_entries(&self, actor_type: RequesterType, actor_id: &str)
        -> Result<Vec<WalletEntry>, WalletApiError>;

    async fn merchant_payments(&self, shop_id: &str) -> Result<Vec<MerchantPayment>, WalletApiError>;

    /// Creates a withdrawal: validates the amount against the derived balance, rejects when a pending request
    /// already exists for the actor, then atomically appends a pending manual ledger entry and the payout request
    /// carrying the same payout reference.
    async fn request_payout(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
        amount: Money,
    ) -> Result<PayoutRequest, WalletApiError>;

    async fn fetch_payout_request(&self, request_id: i64) -> Result<Option<PayoutRequest>, WalletApiError>;

    async fn pending_payout_requests(&self) -> Result<Vec<PayoutRequest>, WalletApiError>;

    /// Admin resolution. Dual-writes the payout request and the ledger entry matched on the shared payout
    /// reference (`approved -> in transit`, `paid -> paid`, `rejected -> failed`).
    ///
    /// Retry-safe: re-applying the outcome the request already has is a no-op success. Conflicting outcomes on an
    /// already resolved request are rejected.
    async fn resolve_payout_request(
        &self,
        request_id: i64,
        resolution: PayoutResolution,
        admin_id: &str,
        note: Option<&str>,
    ) -> Result<PayoutRequest, WalletApiError>;

    /// Total commission income recorded by delivery settlements.
    async fn platform_income_total(&self) -> Result<Money, WalletApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum WalletApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Requested {requested} but only {available} is available")]
    InsufficientFunds { requested: Money, available: Money },
    #[error("Withdrawal amounts must be positive, got {0}")]
    InvalidAmount(Money),
    #[error("A pending payout request already exists for {0}")]
    RequestAlreadyPending(String),
    #[error("The payout request (id {0}) does not exist")]
    RequestNotFound(i64),
    #[error("No wallet ledger entry matches payout reference {0}")]
    EntryNotFound(String),
    #[error("The payout request was already resolved differently: {0}")]
    ResolutionConflict(String),
}

impl From<sqlx::Error> for WalletApiError {
    fn from(e: sqlx::Error) -> Self {
        WalletApiError::DatabaseError(e.to_string())
    }
}
