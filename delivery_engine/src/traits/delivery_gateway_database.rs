use chrono::{DateTime, Utc};
use dpe_common::Money;
use thiserror::Error;

use crate::{
    db_types::{NewOrder, NewOrderItem, Shop, ShopOrder, ShopOrderStatus},
    traits::{
        data_objects::{DeliverySettlement, FullOrder, GatewayEvent, GatewayEventOutcome, PickupSettlement},
        OrderApiError,
    },
};

/// This trait defines the highest level of behaviour for backends supporting the delivery engine.
///
/// This behaviour includes:
/// * Persisting new order aggregates and driving the shop order state machine
/// * The courier claim (a single conditional update; exactly one claimant can ever win)
/// * The two settlement transactions (pickup and delivery), which must be atomic
/// * Idempotent ingestion of payment gateway events
#[allow(async_fn_in_trait)]
pub trait DeliveryGatewayDatabase: Clone + super::OrderManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a fully resolved order aggregate in a single transaction: the order row, one shop order per merchant,
    /// and all line items. A fresh order code is generated as part of the insert.
    async fn insert_order(&self, order: NewOrder) -> Result<FullOrder, DeliveryGatewayError>;

    /// Moves a shop order from `from` to `to` with a single conditional update, stamping the progress timestamp
    /// that belongs to the target status (`preparing_started_at` or `ready_at`).
    ///
    /// If the row is no longer in `from`, the update matches nothing and a conflict is returned, so concurrent
    /// merchant clicks cannot double-apply a transition. `from == to` is rejected as
    /// [`DeliveryGatewayError::StatusChangeNoOp`] rather than echoed back: unlike the settlement calls, which
    /// report replays as `already_settled` successes, a repeated status change means the caller acted on a stale
    /// read and must refetch.
    async fn advance_shop_order_status(
        &self,
        shop_order_id: i64,
        from: ShopOrderStatus,
        to: ShopOrderStatus,
    ) -> Result<ShopOrder, DeliveryGatewayError>;

    /// Cancels a shop order, provided its current status is in `allowed_from`. Records the reason, stamps
    /// `cancelled_at` and clears any courier assignment, all in one conditional update.
    ///
    /// With `guard_pickup` set, the update additionally requires `picked_up_at` to be unset, so a cancel racing
    /// the pickup settlement loses at the row level and maps to [`DeliveryGatewayError::AlreadyPickedUp`]. Admin
    /// overrides pass `false`.
    async fn cancel_shop_order(
        &self,
        shop_order_id: i64,
        allowed_from: &[ShopOrderStatus],
        reason: &str,
        guard_pickup: bool,
    ) -> Result<ShopOrder, DeliveryGatewayError>;

    /// Replaces the line items of a pending shop order and recomputes the shop order subtotal and the order total
    /// in the same transaction. Returns the updated aggregate.
    async fn replace_order_items(
        &self,
        shop_order_id: i64,
        items: Vec<NewOrderItem>,
    ) -> Result<FullOrder, DeliveryGatewayError>;

    /// All unassigned shop orders in the courier-eligible set, paired with their shop for pickup point resolution.
    async fn open_assignments(&self) -> Result<Vec<(ShopOrder, Shop)>, DeliveryGatewayError>;

    /// The claim. One conditional update: assign the courier if and only if the shop order is still in the
    /// eligible set and nobody holds it. Returns `None` when the claim is lost; the row is untouched in that case.
    async fn try_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<Option<ShopOrder>, DeliveryGatewayError>;

    /// Releases a claim. Only the current assignee can release, and only before pickup.
    async fn release_claim(&self, shop_order_id: i64, courier_id: &str) -> Result<ShopOrder, DeliveryGatewayError>;

    /// Admin override of the assignment. Replaces (or clears) the assignee regardless of who currently holds it;
    /// the shop order must still be in the eligible set.
    async fn reassign(&self, shop_order_id: i64, courier_id: Option<&str>) -> Result<ShopOrder, DeliveryGatewayError>;

    async fn set_delivery_otp(
        &self,
        shop_order_id: i64,
        otp: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ShopOrder, DeliveryGatewayError>;

    /// Stamps `arrived_at_customer_at` once. Repeat calls leave the original timestamp in place.
    async fn confirm_arrival(&self, shop_order_id: i64) -> Result<ShopOrder, DeliveryGatewayError>;

    /// The pickup settlement. In ONE transaction:
    /// * guard: the shop order is `OutForDelivery` and assigned to `courier_id`
    /// * no-op success when `picked_up_at` is already set
    /// * appends the merchant's net (`subtotal - commission`) to the merchant payments ledger, deduplicated per
    ///   (shop, order), for cash and online orders alike
    /// * for cash orders, debits the net from the courier's job credit, once per shop order
    /// * stamps `picked_up_at`
    ///
    /// The commission rate is read fresh from settings inside the transaction.
    async fn settle_pickup(&self, shop_order_id: i64, courier_id: &str)
        -> Result<PickupSettlement, DeliveryGatewayError>;

    /// The delivery settlement. In ONE transaction:
    /// * no-op success when the shop order is already `Delivered`
    /// * guard: `picked_up_at` is set
    /// * records the platform's commission income, deduplicated per shop order
    /// * credits the merchant's earnings (`subtotal - commission`) to the merchant wallet, deduplicated per
    ///   (shop, order)
    /// * for paid online orders only, credits the delivery fee to the courier's wallet as an automatic entry,
    ///   deduplicated per (courier, order)
    /// * sets the status to `Delivered` and stamps `delivered_at`
    async fn settle_delivery(&self, shop_order_id: i64) -> Result<DeliverySettlement, DeliveryGatewayError>;

    /// Applies a payment gateway webhook event. Idempotent by the external reference carried in the event.
    async fn process_gateway_event(&self, event: GatewayEvent) -> Result<GatewayEventOutcome, DeliveryGatewayError>;

    /// Clears temporary shop closures whose window has elapsed. Returns how many shops were reopened. Safe to call
    /// from concurrent sweepers.
    async fn reopen_expired_closures(&self) -> Result<u64, DeliveryGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), DeliveryGatewayError> {
        Ok(())
    }
}

/// Best-effort refunds for cancelled online orders. The engine never talks to the payment gateway directly; hosts
/// inject an implementation of this trait into the order flow API.
#[allow(async_fn_in_trait)]
pub trait RefundProcessor: Clone + Send + Sync {
    async fn refund(&self, payment_ref: &str, amount: Money) -> Result<(), RefundError>;
}

/// The default refund processor: logs and succeeds. Suitable for cash-only deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct NoRefunds;

impl RefundProcessor for NoRefunds {
    async fn refund(&self, payment_ref: &str, amount: Money) -> Result<(), RefundError> {
        log::info!("💳️ No refund processor configured. Skipping refund of {amount} for payment {payment_ref}");
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum RefundError {
    #[error("Gateway refund failed: {0}")]
    GatewayError(String),
    #[error("The order has no payment reference to refund against")]
    MissingPaymentRef,
}

#[derive(Debug, Clone, Error)]
pub enum DeliveryGatewayError {
    #[error("We have an internal database engine error (configuration/uptime etc.): {0}")]
    DatabaseError(String),
    #[error("{0}")]
    OrderError(#[from] OrderApiError),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderNotFound(i64),
    #[error("The requested shop order (internal id {0}) does not exist")]
    ShopOrderNotFound(i64),
    #[error("The shop {0} does not exist")]
    ShopNotFound(String),
    #[error("The platform is in maintenance mode and is not accepting orders")]
    MaintenanceMode,
    #[error("The delivery address is outside the service area")]
    OutsideServiceArea,
    #[error("The order contains no items")]
    EmptyOrder,
    #[error("The shop {0} is not accepting orders")]
    ShopUnavailable(String),
    #[error("The shop order cannot move from {from} to {to}")]
    StatusChangeForbidden { from: ShopOrderStatus, to: ShopOrderStatus },
    #[error("The requested status change would result in a no-op.")]
    StatusChangeNoOp,
    #[error("Cancellation is not allowed: {0}")]
    CancellationForbidden(String),
    #[error("The shop order has already been picked up")]
    AlreadyPickedUp,
    #[error("The shop order has not been picked up yet")]
    NotPickedUp,
    #[error("The shop order is not out for delivery")]
    NotOutForDelivery,
    #[error("The assignment was already taken or is no longer available")]
    AssignmentTaken,
    #[error("The claim cannot be released (not the assignee, already picked up, or not claimable)")]
    ReleaseForbidden,
    #[error("The caller is not the assigned courier for this shop order")]
    NotAssignee,
    #[error("A cancellation reason is required")]
    ReasonRequired,
    #[error("Line items can only be edited while the shop order is pending")]
    ItemEditForbidden,
    #[error("The delivery OTP is invalid")]
    OtpInvalid,
    #[error("The delivery OTP has expired")]
    OtpExpired,
    #[error("{0} may not perform this action")]
    Forbidden(String),
}

impl From<sqlx::Error> for DeliveryGatewayError {
    fn from(e: sqlx::Error) -> Self {
        DeliveryGatewayError::DatabaseError(e.to_string())
    }
}

impl DeliveryGatewayError {
    /// Conflict-class errors: the request was well-formed but lost a race or hit a guard. Hosts map these to 409s
    /// rather than server faults.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            DeliveryGatewayError::AssignmentTaken
                | DeliveryGatewayError::ReleaseForbidden
                | DeliveryGatewayError::AlreadyPickedUp
                | DeliveryGatewayError::StatusChangeForbidden { .. }
                | DeliveryGatewayError::StatusChangeNoOp
                | DeliveryGatewayError::CancellationForbidden(_)
        )
    }
}
