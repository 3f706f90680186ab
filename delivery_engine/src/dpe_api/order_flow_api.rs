use std::fmt::Debug;

use dpe_common::Money;
use log::*;

use crate::{
    db_types::{DeliveryAddress, NewOrder, NewOrderItem, NewShopOrder, PaymentMethod, Shop, ShopOrder, ShopOrderStatus},
    events::{
        AssignmentOpenedEvent,
        AssignmentRemovedEvent,
        EventProducers,
        OrderPlacedEvent,
        ShopOrderCancelledEvent,
        ShopOrderStatusChangedEvent,
    },
    helpers::{delivery_fee, haversine_km, point_in_polygon, GeoPoint},
    order_objects::{Actor, NewOrderRequest},
    traits::{DeliveryGatewayDatabase, DeliveryGatewayError, FullOrder, RefundProcessor},
};

/// `OrderFlowApi` is the primary API for placing orders and driving the shop order state machine in response to
/// customer, merchant and admin actions.
pub struct OrderFlowApi<B, R> {
    db: B,
    refunds: R,
    producers: EventProducers,
}

impl<B, R> Debug for OrderFlowApi<B, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B, R> OrderFlowApi<B, R> {
    pub fn new(db: B, refunds: R, producers: EventProducers) -> Self {
        Self { db, refunds, producers }
    }
}

impl<B, R> OrderFlowApi<B, R>
where
    B: DeliveryGatewayDatabase,
    R: RefundProcessor,
{
    /// Submit a new order.
    ///
    /// The request is validated against the current settings (maintenance mode, service area), cart lines are
    /// grouped into one shop order per merchant, and every amount is recomputed server-side. The client's totals
    /// are advisory only and never trusted.
    pub async fn process_new_order(&self, request: NewOrderRequest) -> Result<FullOrder, DeliveryGatewayError> {
        let settings = self.db.fetch_system_settings().await?;
        if settings.maintenance_mode {
            return Err(DeliveryGatewayError::MaintenanceMode);
        }
        if request.lines.is_empty() {
            return Err(DeliveryGatewayError::EmptyOrder);
        }
        let address = DeliveryAddress {
            text: request.address_text.clone(),
            latitude: request.latitude,
            longitude: request.longitude,
        };
        if let (Some(location), Some(polygon)) = (address.location(), settings.service_polygon()) {
            if !point_in_polygon(location, &polygon) {
                info!("🛒️ Rejecting order for {}: address is outside the service area", request.customer_id);
                return Err(DeliveryGatewayError::OutsideServiceArea);
            }
        }
        // Group cart lines per merchant, preserving the order the client sent them in.
        let mut groups: Vec<(String, Vec<NewOrderItem>)> = Vec::new();
        for line in request.lines {
            let shop_id = line.shop_id.clone();
            match groups.iter_mut().find(|(id, _)| *id == shop_id) {
                Some((_, items)) => items.push(line.into_item()),
                None => groups.push((shop_id, vec![line.into_item()])),
            }
        }
        let mut shop_orders = Vec::with_capacity(groups.len());
        let mut first_shop: Option<Shop> = None;
        for (shop_id, items) in groups {
            let shop = self
                .db
                .fetch_shop(&shop_id)
                .await?
                .ok_or_else(|| DeliveryGatewayError::ShopNotFound(shop_id.clone()))?;
            if !shop.approved || shop.is_closed(chrono::Utc::now()) {
                return Err(DeliveryGatewayError::ShopUnavailable(shop_id));
            }
            let subtotal = items.iter().map(|i| i.line_total()).sum();
            if first_shop.is_none() {
                first_shop = Some(shop.clone());
            }
            shop_orders.push(NewShopOrder { shop_id, owner_id: shop.owner_id, subtotal, items });
        }
        let distance_km = match (address.location(), self.pickup_point(first_shop.as_ref()).await?) {
            (Some(customer), Some(pickup)) => haversine_km(customer, pickup),
            _ => 0.0,
        };
        let fee = delivery_fee(settings.base_delivery_fee, settings.per_km_rate, distance_km);
        let subtotal_sum: Money = shop_orders.iter().map(|so| so.subtotal).sum();
        let order = NewOrder {
            customer_id: request.customer_id,
            payment_method: request.payment_method,
            address,
            delivery_fee: fee,
            total_amount: subtotal_sum + fee,
            shop_orders,
        };
        let full = self.db.insert_order(order).await?;
        self.call_order_placed_hook(&full).await;
        debug!("🛒️ Order {} placed. Total {}", full.order.order_code, full.order.total_amount);
        Ok(full)
    }

    /// The pickup point used for the delivery fee: the first merchant's cafeteria counter when one is configured,
    /// otherwise the shop's own coordinates.
    async fn pickup_point(&self, shop: Option<&Shop>) -> Result<Option<GeoPoint>, DeliveryGatewayError> {
        let Some(shop) = shop else {
            return Ok(None);
        };
        if let Some(cafeteria) = &shop.cafeteria {
            let locations = self.db.fetch_pickup_locations().await?;
            if let Some(loc) = locations.iter().find(|l| &l.name == cafeteria) {
                return Ok(Some(loc.point()));
            }
        }
        Ok(shop.location())
    }

    async fn call_order_placed_hook(&self, order: &FullOrder) {
        for emitter in &self.producers.order_placed_producer {
            let event = OrderPlacedEvent {
                order: order.order.clone(),
                shop_orders: order.shop_orders.iter().map(|so| so.shop_order.clone()).collect(),
            };
            emitter.publish_event(event).await;
        }
    }

    /// Moves a shop order forward through the merchant-driven part of the state machine.
    ///
    /// Only the owning merchant or an admin may do this. Entering the courier-eligible set with no assignee opens
    /// the assignment; backward or repeated transitions come back as conflicts from the backend.
    pub async fn update_shop_order_status(
        &self,
        actor: &Actor,
        shop_order_id: i64,
        to: ShopOrderStatus,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let authorized = match actor {
            Actor::Merchant(id) => so.owner_id == *id,
            Actor::Admin(_) => true,
            _ => false,
        };
        if !authorized {
            return Err(DeliveryGatewayError::Forbidden(actor.to_string()));
        }
        let from = so.status;
        let updated = self.db.advance_shop_order_status(shop_order_id, from, to).await?;
        for emitter in &self.producers.status_changed_producer {
            emitter.publish_event(ShopOrderStatusChangedEvent::new(from, updated.clone())).await;
        }
        if to.courier_eligible() && !from.courier_eligible() && updated.courier_id.is_none() {
            for emitter in &self.producers.assignment_opened_producer {
                emitter.publish_event(AssignmentOpenedEvent { shop_order: updated.clone() }).await;
            }
        }
        Ok(updated)
    }

    /// Cancels a shop order on behalf of `actor`, enforcing the authorization matrix:
    /// * customers may cancel their own shop orders before pickup
    /// * merchants may cancel their own shop orders while pending or preparing
    /// * the assigned courier may cancel an out-for-delivery shop order before pickup
    /// * admins may always cancel a non-terminal shop order
    ///
    /// Paid online orders get a best-effort refund through the injected [`RefundProcessor`]; a refund failure is
    /// logged and does not undo the cancellation.
    pub async fn cancel_shop_order(
        &self,
        actor: &Actor,
        shop_order_id: i64,
        reason: &str,
    ) -> Result<ShopOrder, DeliveryGatewayError> {
        use ShopOrderStatus::*;
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let order = self
            .db
            .fetch_order(so.order_id)
            .await?
            .ok_or(DeliveryGatewayError::OrderNotFound(so.order_id))?
            .order;
        let allowed_from: &[ShopOrderStatus] = match actor {
            Actor::Customer(id) => {
                if order.customer_id != *id {
                    return Err(DeliveryGatewayError::Forbidden(actor.to_string()));
                }
                if so.is_picked_up() {
                    return Err(DeliveryGatewayError::AlreadyPickedUp);
                }
                &[Pending, Preparing, OutForDelivery]
            },
            Actor::Merchant(id) => {
                if so.owner_id != *id {
                    return Err(DeliveryGatewayError::Forbidden(actor.to_string()));
                }
                &[Pending, Preparing]
            },
            Actor::Courier(id) => {
                if !so.is_assigned_to(id) {
                    return Err(DeliveryGatewayError::NotAssignee);
                }
                if so.is_picked_up() {
                    return Err(DeliveryGatewayError::AlreadyPickedUp);
                }
                &[OutForDelivery]
            },
            Actor::Admin(_) => &[Pending, Preparing, OutForDelivery],
        };
        let was_claimable = so.status.courier_eligible();
        // Everyone but admins is held to the pickup guard inside the conditional update itself, so the pre-checks
        // above cannot be raced by a concurrent pickup settlement.
        let cancelled = self.db.cancel_shop_order(shop_order_id, allowed_from, reason, !actor.is_admin()).await?;
        info!("🛒️ Shop order {} cancelled by {actor}", cancelled.id);
        for emitter in &self.producers.order_cancelled_producer {
            emitter
                .publish_event(ShopOrderCancelledEvent { shop_order: cancelled.clone(), reason: reason.to_string() })
                .await;
        }
        if was_claimable {
            for emitter in &self.producers.assignment_removed_producer {
                emitter.publish_event(AssignmentRemovedEvent { shop_order_id }).await;
            }
        }
        if order.paid && order.payment_method == PaymentMethod::Online {
            self.try_refund(&order.payment_ref, cancelled.subtotal).await;
        }
        Ok(cancelled)
    }

    async fn try_refund(&self, payment_ref: &Option<String>, amount: Money) {
        let Some(payment_ref) = payment_ref else {
            warn!("💳️ Cancelled a paid order that has no payment reference. No refund was issued.");
            return;
        };
        if let Err(e) = self.refunds.refund(payment_ref, amount).await {
            // Refunds are best-effort. The cancellation stands and support picks up the failure from the logs.
            error!("💳️ Refund of {amount} against {payment_ref} failed: {e}");
        }
    }

    /// Replaces the line items of a pending shop order. Only the owning customer can do this, and only while the
    /// merchant has not started preparing.
    pub async fn update_order_items(
        &self,
        actor: &Actor,
        shop_order_id: i64,
        items: Vec<NewOrderItem>,
    ) -> Result<FullOrder, DeliveryGatewayError> {
        let so = self
            .db
            .fetch_shop_order(shop_order_id)
            .await?
            .ok_or(DeliveryGatewayError::ShopOrderNotFound(shop_order_id))?;
        let order = self
            .db
            .fetch_order(so.order_id)
            .await?
            .ok_or(DeliveryGatewayError::OrderNotFound(so.order_id))?
            .order;
        match actor {
            Actor::Customer(id) if order.customer_id == *id => {},
            Actor::Admin(_) => {},
            _ => return Err(DeliveryGatewayError::Forbidden(actor.to_string())),
        }
        self.db.replace_order_items(shop_order_id, items).await
    }

    /// Clears elapsed temporary shop closures. Hosts call this on a timer.
    pub async fn reopen_expired_closures(&self) -> Result<u64, DeliveryGatewayError> {
        self.db.reopen_expired_closures().await
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
