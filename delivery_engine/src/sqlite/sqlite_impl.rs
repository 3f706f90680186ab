use chrono::{DateTime, Utc};
use dpe_common::Money;
use log::{debug, info, warn};
use sqlx::SqlitePool;

use crate::{
    db_types::{
        CourierAccount,
        LedgerEntrySource,
        LedgerEntryStatus,
        LedgerEntryType,
        MerchantPayment,
        NewOrder,
        NewOrderItem,
        NewShop,
        Order,
        OrderCode,
        OrderItem,
        PaymentMethod,
        PayoutRequest,
        PayoutRequestStatus,
        PickupLocation,
        RequesterType,
        Shop,
        ShopOrder,
        ShopOrderStatus,
        SystemSettings,
        WalletEntry,
    },
    order_objects::OrderQueryFilter,
    sqlite::db,
    traits::{
        DeliveryGatewayDatabase,
        DeliveryGatewayError,
        DeliverySettlement,
        FullOrder,
        GatewayEvent,
        GatewayEventOutcome,
        OrderApiError,
        OrderManagement,
        PayoutResolution,
        PickupSettlement,
        SettingsManagement,
        SettingsUpdate,
        WalletApiError,
        WalletBalance,
        WalletManagement,
    },
};

/// The ledger reference for a merchant payment: the gateway's payment id when one exists, otherwise a reference
/// derived from the order code, prefixed by the payment method so the ledger never misstates how the money moved.
fn charge_ref(order: &Order) -> String {
    if let Some(payment_ref) = &order.payment_ref {
        return payment_ref.clone();
    }
    let code = order.order_code.as_str().trim_start_matches("ORD-");
    match order.payment_method {
        PaymentMethod::Cash => format!("COD-{code}"),
        PaymentMethod::Online => format!("ONLINE-{code}"),
    }
}

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SqliteDatabase ({})", self.url)
    }
}

impl SqliteDatabase {
    /// Creates a new connection pool using the value of the `DPE_DATABASE_URL` environment variable, or the default
    /// when it is unset.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db::db_url();
        Self::new_with_url(&url, max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = db::new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, id: i64) -> Result<Option<FullOrder>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = db::orders::fetch_order(id, &mut conn).await? else {
            return Ok(None);
        };
        let full = db::orders::assemble_full_order(order, &mut conn).await?;
        Ok(Some(full))
    }

    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<FullOrder>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let Some(order) = db::orders::fetch_order_by_code(code, &mut conn).await? else {
            return Ok(None);
        };
        let full = db::orders::assemble_full_order(order, &mut conn).await?;
        Ok(Some(full))
    }

    async fn fetch_shop_order(&self, id: i64) -> Result<Option<ShopOrder>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let so = db::orders::fetch_shop_order(id, &mut conn).await?;
        Ok(so)
    }

    async fn fetch_order_items(&self, shop_order_id: i64) -> Result<Vec<OrderItem>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let items = db::orders::fetch_order_items(shop_order_id, &mut conn).await?;
        Ok(items)
    }

    async fn search_shop_orders(&self, query: OrderQueryFilter) -> Result<Vec<ShopOrder>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let rows = db::orders::search_shop_orders(query, &mut conn).await?;
        Ok(rows)
    }

    async fn deliveries_for_courier_since(
        &self,
        courier_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShopOrder>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let rows = db::orders::deliveries_for_courier_since(courier_id, since, &mut conn).await?;
        Ok(rows)
    }

    async fn cancellation_count_for_customer(
        &self,
        customer_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let count = db::orders::cancellation_count_for_customer(customer_id, since, &mut conn).await?;
        Ok(count)
    }

    async fn fetch_shop(&self, shop_id: &str) -> Result<Option<Shop>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let shop = db::shops::fetch_shop(shop_id, &mut conn).await?;
        Ok(shop)
    }

    async fn fetch_system_settings(&self) -> Result<SystemSettings, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let settings = db::settings::fetch_settings(&mut conn).await?;
        Ok(settings)
    }

    async fn fetch_pickup_locations(&self) -> Result<Vec<PickupLocation>, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let locations = db::settings::fetch_pickup_locations(&mut conn).await?;
        Ok(locations)
    }
}

impl DeliveryGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, DeliveryGatewayError> {
        let mut tx = self.pool.begin().await?;
        let full = db::orders::insert_order_aggregate(order, &mut tx).await?;
        tx.commit().await?;
        info!("🛒️ Order {} stored with {} shop order(s)", full.order.order_code, full.shop_orders.len());
        Ok(full)
    }

    async fn advance_shop_order_status(
        &self,
        shop_order_id: i64,
        from: ShopOrderStatus,
        to: ShopOrderStatus,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        if from == to {
            return Err(DeliveryGatewayError::StatusChangeNoOp);
        }
        if !from.can_advance_to(to) {
            return Err(DeliveryGatewayError::StatusChangeForbidden { from, to });
        }
        let mut conn = self.pool.acquire().await?;
        match db::orders::advance_status(shop_order_id, from, to, &mut conn).await? {
            Some(so) => {
                info!("🛒️ Shop order {} moved from {from} to {to}", so.id);
                Ok(so)
            },
            None => match db::orders::fetch_shop_order(shop_order_id, &mut conn).await? {
                Some(so) => Err(DeliveryGatewayError::StatusChangeForbidden { from: so.status, to }),
                None => Err(DeliveryGatewayError::ShopOrderNotFound(shop_order_id)),
            },
        }
    }

    async fn cancel_shop_order(
        &self,
        shop_order_id: i64,
        allowed_from: &[ShopOrderStatus],
        reason: &str,
        guard_pickup: bool,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        if reason.trim().is_empty() {
            return Err(DeliveryGatewayError::ReasonRequired);
        }
        let mut tx = self.pool.begin().await?;
        let result = db::orders::cancel_shop_order(shop_order_id, allowed_from, reason, guard_pickup, &mut tx).await?;
        match result {
            Some(so) => {
                db::orders::refresh_order_total(so.order_id, &mut tx).await?;
                tx.commit().await?;
                info!("🛒️ Shop order {} cancelled: {reason}", so.id);
                Ok(so)
            },
            None => {
                let so = db::orders::fetch_shop_order(shop_order_id, &mut tx).await?;
                tx.rollback().await?;
                match so {
                    Some(so) if guard_pickup && so.is_picked_up() => Err(DeliveryGatewayError::AlreadyPickedUp),
                    Some(so) => Err(DeliveryGatewayError::CancellationForbidden(format!(
                        "shop order {} is {}",
                        so.id, so.status
                    ))),
                    None => Err(DeliveryGatewayError::ShopOrderNotFound(shop_order_id)),
                }
            },
        }
    }

    async fn replace_order_items(
        &self,
        shop_order_id: i64,
        items: Vec<NewOrderItem>,
    ) -> Result<FullOrder, DeliveryGatewayError> {
        if items.is_empty() {
            return Err(DeliveryGatewayError::EmptyOrder);
        }
        let mut tx = self.pool.begin().await?;
        let so = db::orders::fetch_shop_order(shop_order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        if so.status != ShopOrderStatus::Pending {
            return Err(DeliveryGatewayError::ItemEditForbidden);
        }
        db::orders::replace_order_items(shop_order_id, so.order_id, &items, &mut tx).await?;
        let order = db::orders::fetch_order(so.order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::OrderNotFound(so.order_id))?;
        let full = db::orders::assemble_full_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(full)
    }

    async fn open_assignments(&self) -> Result<Vec<(ShopOrder, Shop)>, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let rows = db::orders::open_assignments(&mut conn).await?;
        Ok(rows)
    }

    async fn try_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<Option<ShopOrder>, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let result = db::orders::try_claim(shop_order_id, courier_id, &mut conn).await?;
        match &result {
            Some(so) => info!("🚚️ Courier {courier_id} claimed shop order {}", so.id),
            None => debug!("🚚️ Courier {courier_id} lost the claim on shop order {shop_order_id}"),
        }
        Ok(result)
    }

    async fn release_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<ShopOrder, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        match db::orders::release_claim(shop_order_id, courier_id, &mut conn).await? {
            Some(so) => {
                info!("🚚️ Courier {courier_id} released shop order {}", so.id);
                Ok(so)
            },
            None => match db::orders::fetch_shop_order(shop_order_id, &mut conn).await? {
                Some(_) => Err(DeliveryGatewayError::ReleaseForbidden),
                None => Err(DeliveryGatewayError::ShopOrderNotFound(shop_order_id)),
            },
        }
    }

    async fn reassign(&self, shop_order_id: i64, courier_id: Option<&str>) -> Result<ShopOrder, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        match db::orders::reassign(shop_order_id, courier_id, &mut conn).await? {
            Some(so) => {
                info!("🚚️ Shop order {} reassigned to {courier_id:?}", so.id);
                Ok(so)
            },
            None => match db::orders::fetch_shop_order(shop_order_id, &mut conn).await? {
                Some(_) => Err(DeliveryGatewayError::AssignmentTaken),
                None => Err(DeliveryGatewayError::ShopOrderNotFound(shop_order_id)),
            },
        }
    }

    async fn set_delivery_otp(
        &self,
        shop_order_id: i64,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::set_delivery_otp(shop_order_id, otp, expires_at, &mut conn)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))
    }

    async fn confirm_arrival(&self, shop_order_id: i64) -> Result<ShopOrder, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        db::orders::confirm_arrival(shop_order_id, &mut conn)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))
    }

    async fn settle_pickup(
        &self,
        shop_order_id: i64,
        courier_id: &str,
    ) -> Result<PickupSettlement, DeliveryGatewayError> {
        let mut tx = self.pool.begin().await?;
        let so = db::orders::fetch_shop_order(shop_order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let order = db::orders::fetch_order(so.order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::OrderNotFound(so.order_id))?;
        // Rate is read inside the transaction so mid-flight settings changes cannot split an order unevenly.
        let settings = db::settings::fetch_settings(&mut tx).await?;
        let (_, merchant_net) = so.subtotal.commission_split(settings.commission_rate());
        let cash = order.payment_method.is_cash();
        if so.is_picked_up() {
            tx.rollback().await?;
            return Ok(PickupSettlement { shop_order: so, merchant_net, cash, already_settled: true });
        }
        if so.status != ShopOrderStatus::OutForDelivery {
            return Err(DeliveryGatewayError::NotOutForDelivery);
        }
        if !so.is_assigned_to(courier_id) {
            return Err(DeliveryGatewayError::NotAssignee);
        }
        let charge_ref = charge_ref(&order);
        db::ledgers::insert_merchant_payment(&so.shop_id, &charge_ref, order.id, merchant_net, false, &mut tx).await?;
        if cash {
            // Keyed on the shop order, not the order: a cash order spanning several shops debits the float once
            // per pickup.
            let job_ref = format!("jobcredit_{}_{courier_id}", so.id);
            let inserted = db::ledgers::insert_wallet_entry(
                RequesterType::Courier,
                courier_id,
                &job_ref,
                -merchant_net,
                LedgerEntryStatus::Paid,
                LedgerEntryType::Automatic,
                LedgerEntrySource::JobCredit,
                Some(so.id),
                &mut tx,
            )
            .await?;
            if inserted {
                db::ledgers::adjust_job_credit(courier_id, -merchant_net, &mut tx).await?;
            }
        }
        let updated = db::orders::stamp_picked_up(shop_order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::AlreadyPickedUp)?;
        tx.commit().await?;
        info!(
            "💰️ Pickup settled for shop order {shop_order_id}: merchant net {merchant_net}{}",
            if cash { " (cash, debited from job credit)" } else { "" }
        );
        Ok(PickupSettlement { shop_order: updated, merchant_net, cash, already_settled: false })
    }

    async fn settle_delivery(&self, shop_order_id: i64) -> Result<DeliverySettlement, DeliveryGatewayError> {
        let mut tx = self.pool.begin().await?;
        let so = db::orders::fetch_shop_order(shop_order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let order = db::orders::fetch_order(so.order_id, &mut tx)
            .await?
            .ok_or(DeliveryGatewayError::OrderNotFound(so.order_id))?;
        let settings = db::settings::fetch_settings(&mut tx).await?;
        // The platform share is rounded; the merchant gets the exact complement so the two always sum back to the
        // subtotal.
        let (platform_income, merchant_earnings) = so.subtotal.commission_split(settings.commission_rate());
        let courier_fee = order.settles_courier_fee().then_some(order.delivery_fee);
        if so.status == ShopOrderStatus::Delivered {
            tx.rollback().await?;
            return Ok(DeliverySettlement {
                shop_order: so,
                platform_income,
                merchant_earnings,
                courier_fee,
                already_settled: true,
            });
        }
        if !so.is_picked_up() {
            return Err(DeliveryGatewayError::NotPickedUp);
        }
        db::ledgers::insert_platform_income(so.id, platform_income, &mut tx).await?;
        let charge_ref = charge_ref(&order);
        db::ledgers::insert_merchant_payment(&so.shop_id, &charge_ref, order.id, merchant_earnings, true, &mut tx)
            .await?;
        if let (Some(fee), Some(courier_id)) = (courier_fee, so.courier_id.as_deref()) {
            let fee_ref = format!("WALLET-{}-{}", order.order_code.as_str(), Utc::now().timestamp_millis());
            db::ledgers::insert_wallet_entry(
                RequesterType::Courier,
                courier_id,
                &fee_ref,
                fee,
                LedgerEntryStatus::Paid,
                LedgerEntryType::Automatic,
                LedgerEntrySource::Wallet,
                Some(order.id),
                &mut tx,
            )
            .await?;
        }
        let updated =
            db::orders::mark_delivered(shop_order_id, &mut tx).await?.unwrap_or_else(|| {
                warn!("💰️ Shop order {shop_order_id} raced to Delivered inside the settlement transaction");
                so
            });
        tx.commit().await?;
        info!(
            "💰️ Delivery settled for shop order {shop_order_id}: platform {platform_income}, merchant \
             {merchant_earnings}, courier fee {courier_fee:?}"
        );
        Ok(DeliverySettlement {
            shop_order: updated,
            platform_income,
            merchant_earnings,
            courier_fee,
            already_settled: false,
        })
    }

    async fn process_gateway_event(&self, event: GatewayEvent) -> Result<GatewayEventOutcome, DeliveryGatewayError> {
        let mut tx = self.pool.begin().await?;
        let outcome = match &event {
            GatewayEvent::CheckoutCompleted { payment_ref, order_code } |
            GatewayEvent::PaymentSucceeded { payment_ref, order_code } => {
                match db::orders::mark_order_paid(order_code, payment_ref, &mut tx).await? {
                    Some(order) => {
                        info!("💳️ Order {} marked as paid ({payment_ref})", order.order_code);
                        GatewayEventOutcome::Applied
                    },
                    None => match db::orders::fetch_order_by_code(order_code, &mut tx).await? {
                        Some(_) => GatewayEventOutcome::AlreadyApplied,
                        None => GatewayEventOutcome::Unmatched,
                    },
                }
            },
            GatewayEvent::PaymentFailed { payment_ref, order_code } => {
                match db::orders::fetch_order_by_code(order_code, &mut tx).await? {
                    Some(order) if order.paid => {
                        warn!("💳️ Ignoring payment failure {payment_ref} for already-paid order {order_code}");
                        GatewayEventOutcome::AlreadyApplied
                    },
                    Some(_) => {
                        info!("💳️ Payment {payment_ref} failed for order {order_code}. It remains unpaid.");
                        GatewayEventOutcome::Applied
                    },
                    None => GatewayEventOutcome::Unmatched,
                }
            },
            GatewayEvent::PayoutCreated { payout_ref } => {
                self.advance_ledger_entry(payout_ref, &[LedgerEntryStatus::Pending], LedgerEntryStatus::InTransit, &mut tx)
                    .await?
            },
            GatewayEvent::PayoutPaid { payout_ref } => {
                self.advance_ledger_entry(
                    payout_ref,
                    &[LedgerEntryStatus::Pending, LedgerEntryStatus::InTransit],
                    LedgerEntryStatus::Paid,
                    &mut tx,
                )
                .await?
            },
            GatewayEvent::PayoutFailed { payout_ref } => {
                self.advance_ledger_entry(
                    payout_ref,
                    &[LedgerEntryStatus::Pending, LedgerEntryStatus::InTransit],
                    LedgerEntryStatus::Failed,
                    &mut tx,
                )
                .await?
            },
        };
        tx.commit().await?;
        if outcome == GatewayEventOutcome::Unmatched {
            warn!("💳️ Gateway event did not match any record: {event:?}");
        }
        Ok(outcome)
    }

    async fn reopen_expired_closures(&self) -> Result<u64, DeliveryGatewayError> {
        let mut conn = self.pool.acquire().await?;
        let count = db::shops::reopen_expired_closures(&mut conn).await?;
        if count > 0 {
            info!("🛒️ Reopened {count} shop(s) whose closure window elapsed");
        }
        Ok(count)
    }

    async fn close(&mut self) -> Result<(), DeliveryGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

impl SqliteDatabase {
    async fn advance_ledger_entry(
        &self,
        payout_ref: &str,
        allowed_from: &[LedgerEntryStatus],
        to: LedgerEntryStatus,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<GatewayEventOutcome, DeliveryGatewayError> {
        match db::ledgers::update_entry_status(payout_ref, allowed_from, to, &mut *conn).await? {
            Some(entry) => {
                info!("💳️ Ledger entry {payout_ref} moved to {}", entry.status);
                Ok(GatewayEventOutcome::Applied)
            },
            None => match db::ledgers::fetch_entry_by_ref(payout_ref, &mut *conn).await? {
                Some(_) => Ok(GatewayEventOutcome::AlreadyApplied),
                None => Ok(GatewayEventOutcome::Unmatched),
            },
        }
    }

    async fn earnings_for(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
        conn: &mut sqlx::SqliteConnection,
    ) -> Result<Money, sqlx::Error> {
        match actor_type {
            RequesterType::Courier => db::ledgers::total_earnings(actor_type, actor_id, conn).await,
            // For merchants the actor id is the shop id; earnings live in the merchant payments ledger.
            RequesterType::Merchant => db::ledgers::merchant_wallet_earnings(actor_id, conn).await,
        }
    }
}

impl WalletManagement for SqliteDatabase {
    async fn fetch_courier_account(&self, courier_id: &str) -> Result<Option<CourierAccount>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let account = db::ledgers::fetch_courier_account(courier_id, &mut conn).await?;
        Ok(account)
    }

    async fn wallet_balance(&self, actor_type: RequesterType, actor_id: &str) -> Result<WalletBalance, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let earnings = self.earnings_for(actor_type, actor_id, &mut conn).await?;
        let paid_out = db::ledgers::total_paid_out(actor_type, actor_id, &mut conn).await?;
        let pending = db::ledgers::total_pending_out(actor_type, actor_id, &mut conn).await?;
        Ok(WalletBalance::derive(earnings, paid_out, pending))
    }

    async fn ledger_entries(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
    ) -> Result<Vec<WalletEntry>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let entries = db::ledgers::entries_for_actor(actor_type, actor_id, &mut conn).await?;
        Ok(entries)
    }

    async fn merchant_payments(&self, shop_id: &str) -> Result<Vec<MerchantPayment>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let payments = db::ledgers::merchant_payments_for_shop(shop_id, &mut conn).await?;
        Ok(payments)
    }

    async fn request_payout(
        &self,
        actor_type: RequesterType,
        actor_id: &str,
        amount: Money,
    ) -> Result<PayoutRequest, WalletApiError> {
        if amount <= Money::ZERO {
            return Err(WalletApiError::InvalidAmount(amount));
        }
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = db::payout_requests::pending_request_for_actor(actor_type, actor_id, &mut tx).await? {
            return Err(WalletApiError::RequestAlreadyPending(existing.payout_ref));
        }
        let earnings = self.earnings_for(actor_type, actor_id, &mut tx).await?;
        let paid_out = db::ledgers::total_paid_out(actor_type, actor_id, &mut tx).await?;
        let pending = db::ledgers::total_pending_out(actor_type, actor_id, &mut tx).await?;
        let balance = WalletBalance::derive(earnings, paid_out, pending);
        if amount > balance.available {
            return Err(WalletApiError::InsufficientFunds { requested: amount, available: balance.available });
        }
        let payout_ref = format!("payout_{}_{actor_id}", Utc::now().timestamp_millis());
        db::ledgers::insert_wallet_entry(
            actor_type,
            actor_id,
            &payout_ref,
            amount,
            LedgerEntryStatus::Pending,
            LedgerEntryType::Manual,
            LedgerEntrySource::Wallet,
            None,
            &mut tx,
        )
        .await?;
        let request = db::payout_requests::insert_payout_request(actor_type, actor_id, amount, &payout_ref, &mut tx).await?;
        tx.commit().await?;
        info!("💰️ {actor_type} {actor_id} requested a payout of {amount} ({payout_ref})");
        Ok(request)
    }

    async fn fetch_payout_request(&self, request_id: i64) -> Result<Option<PayoutRequest>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let request = db::payout_requests::fetch_payout_request(request_id, &mut conn).await?;
        Ok(request)
    }

    async fn pending_payout_requests(&self) -> Result<Vec<PayoutRequest>, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let requests = db::payout_requests::pending_payout_requests(&mut conn).await?;
        Ok(requests)
    }

    async fn resolve_payout_request(
        &self,
        request_id: i64,
        resolution: PayoutResolution,
        admin_id: &str,
        note: Option<&str>,
    ) -> Result<PayoutRequest, WalletApiError> {
        let mut tx = self.pool.begin().await?;
        let request = db::payout_requests::fetch_payout_request(request_id, &mut tx)
            .await?
            .ok_or(WalletApiError::RequestNotFound(request_id))?;
        let target = resolution.request_status();
        if request.status == target {
            // A retry of an already-applied resolution.
            tx.rollback().await?;
            return Ok(request);
        }
        // Approved requests can still be marked paid; every other path starts from Pending.
        let allowed_from: &[PayoutRequestStatus] = match resolution {
            PayoutResolution::Paid => &[PayoutRequestStatus::Pending, PayoutRequestStatus::Approved],
            _ => &[PayoutRequestStatus::Pending],
        };
        let updated = db::payout_requests::update_request_status(request_id, allowed_from, target, admin_id, note, &mut tx)
            .await?
            .ok_or_else(|| {
                WalletApiError::ResolutionConflict(format!("request {request_id} is already {}", request.status))
            })?;
        let ledger_from: &[LedgerEntryStatus] = match resolution {
            PayoutResolution::Paid => &[LedgerEntryStatus::Pending, LedgerEntryStatus::InTransit],
            _ => &[LedgerEntryStatus::Pending],
        };
        let entry = db::ledgers::fetch_entry_by_ref(&updated.payout_ref, &mut tx)
            .await?
            .ok_or_else(|| WalletApiError::EntryNotFound(updated.payout_ref.clone()))?;
        if entry.status != resolution.ledger_status() {
            db::ledgers::update_entry_status(&updated.payout_ref, ledger_from, resolution.ledger_status(), &mut tx)
                .await?
                .ok_or_else(|| {
                    WalletApiError::ResolutionConflict(format!(
                        "ledger entry {} is already {}",
                        updated.payout_ref, entry.status
                    ))
                })?;
        }
        tx.commit().await?;
        info!("💰️ Payout request {request_id} resolved as {target} by {admin_id}");
        Ok(updated)
    }

    async fn platform_income_total(&self) -> Result<Money, WalletApiError> {
        let mut conn = self.pool.acquire().await?;
        let total = db::ledgers::platform_income_total(&mut conn).await?;
        Ok(total)
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn update_system_settings(&self, update: SettingsUpdate) -> Result<SystemSettings, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let settings = db::settings::update_settings(update, &mut conn).await?;
        Ok(settings)
    }

    async fn upsert_pickup_location(&self, location: PickupLocation) -> Result<(), OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        db::settings::upsert_pickup_location(&location, &mut conn).await?;
        Ok(())
    }

    async fn upsert_shop(&self, shop: NewShop) -> Result<Shop, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        let shop = db::shops::upsert_shop(shop, &mut conn).await?;
        Ok(shop)
    }

    async fn close_shop_until(&self, shop_id: &str, until: DateTime<Utc>) -> Result<Shop, OrderApiError> {
        let mut conn = self.pool.acquire().await?;
        db::shops::close_shop_until(shop_id, until, &mut conn)
            .await?
            .ok_or_else(|| OrderApiError::QueryError(format!("shop {shop_id} does not exist")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn order(method: PaymentMethod, payment_ref: Option<&str>) -> Order {
        Order {
            id: 1,
            order_code: OrderCode("ORD-7KQ2MX".to_string()),
            customer_id: "cust-1".to_string(),
            payment_method: method,
            paid: payment_ref.is_some(),
            payment_ref: payment_ref.map(String::from),
            address_text: "Dorm 4".to_string(),
            address_lat: None,
            address_lng: None,
            delivery_fee: Money::from_baht(20),
            total_amount: Money::from_baht(120),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn charge_ref_states_how_the_money_moved() {
        assert_eq!(charge_ref(&order(PaymentMethod::Online, Some("ch_123"))), "ch_123");
        assert_eq!(charge_ref(&order(PaymentMethod::Cash, None)), "COD-7KQ2MX");
        // An online order that has not been confirmed yet must not masquerade as cash on delivery.
        assert_eq!(charge_ref(&order(PaymentMethod::Online, None)), "ONLINE-7KQ2MX");
    }
}
