use std::fmt::Debug;

use dpe_common::Money;
use log::*;

use crate::{
    db_types::{CourierAccount, MerchantPayment, PayoutRequest, RequesterType, WalletEntry},
    events::{EventProducers, PayoutResolvedEvent},
    traits::{PayoutResolution, WalletApiError, WalletBalance, WalletManagement},
};

/// `WalletApi` exposes the courier and merchant money views: derived balances, ledger histories, withdrawal
/// requests and their admin resolution.
pub struct WalletApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for WalletApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WalletApi")
    }
}

impl<B> WalletApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> WalletApi<B>
where B: WalletManagement
{
    pub async fn courier_account(&self, courier_id: &str) -> Result<Option<CourierAccount>, WalletApiError> {
        self.db.fetch_courier_account(courier_id).await
    }

    pub async fn courier_balance(&self, courier_id: &str) -> Result<WalletBalance, WalletApiError> {
        self.db.wallet_balance(RequesterType::Courier, courier_id).await
    }

    /// The merchant wallet is keyed by shop id; its earnings are the wallet-credit rows in the merchant payments
    /// ledger.
    pub async fn merchant_balance(&self, shop_id: &str) -> Result<WalletBalance, WalletApiError> {
        self.db.wallet_balance(RequesterType::Merchant, shop_id).await
    }

    pub async fn ledger_entries(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
    ) -> Result<Vec<WalletEntry>, WalletApiError> {
        self.db.ledger_entries(actor_type, actor_id).await
    }

    pub async fn merchant_payments(&self, shop_id: &str) -> Result<Vec<MerchantPayment>, WalletApiError> {
        self.db.merchant_payments(shop_id).await
    }

    /// Requests a withdrawal against the actor's available balance. The backend rejects amounts over the available
    /// balance and actors that already have a pending request.
    pub async fn request_payout(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
        amount: Money,
    ) -> Result<PayoutRequest, WalletApiError> {
        let request = self.db.request_payout(actor_type, actor_id, amount).await?;
        debug!("💰️ Payout request #{} created for {actor_type} {actor_id}", request.id);
        Ok(request)
    }

    pub async fn fetch_payout_request(&self, request_id: i64) -> Result<Option<PayoutRequest>, WalletApiError> {
        self.db.fetch_payout_request(request_id).await
    }

    pub async fn pending_payout_requests(&self) -> Result<Vec<PayoutRequest>, WalletApiError> {
        self.db.pending_payout_requests().await
    }

    /// Resolves a payout request on behalf of an admin and notifies subscribers.
    pub async fn resolve_payout_request(
        &self,
        request_id: i64,
        resolution: PayoutResolution,
        admin_id: &str,
        note: Option<&str>,
    ) -> Result<PayoutRequest, WalletApiError> {
        let request = self.db.resolve_payout_request(request_id, resolution, admin_id, note).await?;
        for emitter in &self.producers.payout_resolved_producer {
            emitter.publish_event(PayoutResolvedEvent { request: request.clone() }).await;
        }
        Ok(request)
    }

    pub async fn platform_income_total(&self) -> Result<Money, WalletApiError> {
        self.db.platform_income_total().await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
