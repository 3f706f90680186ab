use dpe_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{Order, PayoutRequest, ShopOrder, ShopOrderStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPlacedEvent {
    pub order: Order,
    pub shop_orders: Vec<ShopOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrderStatusChangedEvent {
    pub old_status: ShopOrderStatus,
    pub shop_order: ShopOrder,
}

impl ShopOrderStatusChangedEvent {
    pub fn new(old_status: ShopOrderStatus, shop_order: ShopOrder) -> Self {
        Self { old_status, shop_order }
    }
}

/// An unassigned shop order has entered the courier-eligible set. Hosts typically fan this out to nearby couriers,
/// honoring each courier's visibility delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOpenedEvent {
    pub shop_order: ShopOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentClaimedEvent {
    pub shop_order: ShopOrder,
    pub courier_id: String,
}

/// A previously open assignment is no longer claimable (claimed elsewhere, cancelled, or moved out of the eligible
/// set). Hosts should withdraw the offer from courier screens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRemovedEvent {
    pub shop_order_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrderCancelledEvent {
    pub shop_order: ShopOrder,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSettledEvent {
    pub shop_order: ShopOrder,
    pub merchant_net: Money,
    /// True when the merchant's net was debited from the courier's cash float.
    pub cash: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettledEvent {
    pub shop_order: ShopOrder,
    pub platform_income: Money,
    pub merchant_earnings: Money,
    pub courier_fee: Option<Money>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutResolvedEvent {
    pub request: PayoutRequest,
}
