use std::fmt::Debug;

use chrono::Utc;
use log::*;

use crate::{
    db_types::{otp_expiry, ShopOrder},
    events::{DeliverySettledEvent, EventProducers, PickupSettledEvent},
    helpers::new_delivery_otp,
    traits::{
        DeliveryGatewayDatabase,
        DeliveryGatewayError,
        DeliverySettlement,
        GatewayEvent,
        GatewayEventOutcome,
        PickupSettlement,
    },
};

/// `SettlementApi` drives the two settlement points of every delivery: pickup (merchant gets their net, cash is
/// debited from the courier's float) and delivery (platform income, merchant wallet credit, courier fee).
///
/// Both settlements are idempotent; replaying one is a no-op success, so couriers can safely retry through flaky
/// connections.
pub struct SettlementApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for SettlementApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SettlementApi")
    }
}

impl<B> SettlementApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> SettlementApi<B>
where B: DeliveryGatewayDatabase
{
    /// The assigned courier confirms they have collected the food. Settles the merchant's net in the same
    /// transaction.
    pub async fn confirm_pickup(
        &self,
        shop_order_id: i64,
        courier_id: &str,
    ) -> Result<PickupSettlement, DeliveryGatewayError> {
        let settlement = self.db.settle_pickup(shop_order_id, courier_id).await?;
        if !settlement.already_settled {
            for emitter in &self.producers.pickup_settled_producer {
                emitter
                    .publish_event(PickupSettledEvent {
                        shop_order: settlement.shop_order.clone(),
                        merchant_net: settlement.merchant_net,
                        cash: settlement.cash,
                    })
                    .await;
            }
        }
        Ok(settlement)
    }

    /// The assigned courier confirms handover to the customer. Completes the delivery and settles the remaining
    /// money movements in one transaction.
    pub async fn confirm_delivery(
        &self,
        shop_order_id: i64,
        courier_id: &str,
    ) -> Result<DeliverySettlement, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        if !so.is_assigned_to(courier_id) {
            return Err(DeliveryGatewayError::NotAssignee);
        }
        self.settle_delivery(shop_order_id).await
    }

    async fn settle_delivery(&self, shop_order_id: i64) -> Result<DeliverySettlement, DeliveryGatewayError> {
        let settlement = self.db.settle_delivery(shop_order_id).await?;
        if !settlement.already_settled {
            for emitter in &self.producers.delivery_settled_producer {
                emitter
                    .publish_event(DeliverySettledEvent {
                        shop_order: settlement.shop_order.clone(),
                        platform_income: settlement.platform_income,
                        merchant_earnings: settlement.merchant_earnings,
                        courier_fee: settlement.courier_fee,
                    })
                    .await;
            }
        }
        Ok(settlement)
    }

    /// The assigned courier marks arrival at the customer. Stamps `arrived_at_customer_at` once; repeats are
    /// no-ops.
    pub async fn confirm_arrival(&self, shop_order_id: i64, courier_id: &str) -> Result<ShopOrder, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        if !so.is_assigned_to(courier_id) {
            return Err(DeliveryGatewayError::NotAssignee);
        }
        self.db.confirm_arrival(shop_order_id).await
    }

    /// Issues a delivery OTP for the customer handover. An unexpired code is reused rather than rotated, so the
    /// customer's screen and the courier's prompt cannot drift apart.
    pub async fn issue_delivery_otp(&self, shop_order_id: i64) -> Result<ShopOrder, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let now = Utc::now();
        if so.otp.is_some() && !so.otp_expired(now) {
            return Ok(so);
        }
        let otp = new_delivery_otp();
        debug!("🚚️ Issued a fresh delivery OTP for shop order {shop_order_id}");
        self.db.set_delivery_otp(shop_order_id, &otp, otp_expiry(now)).await
    }

    /// Verifies the delivery OTP and completes the delivery through the same settlement path as
    /// [`Self::confirm_delivery`].
    pub async fn verify_delivery_otp(
        &self,
        shop_order_id: i64,
        code: &str,
    ) -> Result<DeliverySettlement, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let now = Utc::now();
        if !so.otp_is_valid(code, now) {
            return Err(if so.otp_expired(now) {
                DeliveryGatewayError::OtpExpired
            } else {
                DeliveryGatewayError::OtpInvalid
            });
        }
        self.settle_delivery(shop_order_id).await
    }

    /// Feeds a payment gateway webhook event into the engine. Replays are detected by the external reference and
    /// come back as [`GatewayEventOutcome::AlreadyApplied`].
    pub async fn process_gateway_event(&self, event: GatewayEvent) -> Result<GatewayEventOutcome, DeliveryGatewayError> {
        self.db.process_gateway_event(event).await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
