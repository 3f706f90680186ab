//! Result and request objects shared by the backend traits.
use dpe_common::Money;
use serde::{Deserialize, Serialize};

use crate::db_types::{
    LedgerEntryStatus,
    Order,
    OrderCode,
    OrderItem,
    PayoutRequestStatus,
    ShopOrder,
};

/// An order aggregate as stored: the order row plus every shop order and its line items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullOrder {
    pub order: Order,
    pub shop_orders: Vec<ShopOrderDetail>,
}

impl FullOrder {
    pub fn subtotal_sum(&self) -> Money {
        self.shop_orders.iter().map(|so| so.shop_order.subtotal).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrderDetail {
    pub shop_order: ShopOrder,
    pub items: Vec<OrderItem>,
}

/// The derived wallet balance. Never stored; recomputed from the ledgers on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletBalance {
    pub total_earnings: Money,
    pub paid_out: Money,
    pub pending: Money,
    pub available: Money,
}

impl WalletBalance {
    /// `available = max(0, max(0, earnings - paid_out) - pending)`. The clamps guarantee the reported figure is
    /// never negative, whatever state the ledgers are in.
    pub fn derive(total_earnings: Money, paid_out: Money, pending: Money) -> Self {
        let net = (total_earnings - paid_out).max_zero();
        let available = (net - pending).max_zero();
        Self { total_earnings, paid_out, pending, available }
    }
}

/// The outcome of the pickup settlement transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickupSettlement {
    pub shop_order: ShopOrder,
    /// The merchant's share, `subtotal - commission`, appended to the merchant payments ledger.
    pub merchant_net: Money,
    /// True when the order is cash and `merchant_net` was debited from the courier's job credit.
    pub cash: bool,
    /// True when `picked_up_at` was already set and the call changed nothing.
    pub already_settled: bool,
}

/// The outcome of the delivery settlement transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverySettlement {
    pub shop_order: ShopOrder,
    pub platform_income: Money,
    pub merchant_earnings: Money,
    /// The delivery fee credited to the courier's wallet. Only present for paid online orders.
    pub courier_fee: Option<Money>,
    /// True when the shop order was already delivered and the call changed nothing.
    pub already_settled: bool,
}

/// Payment gateway webhook events consumed by the engine. All of them are idempotent by the external reference
/// they carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEvent {
    CheckoutCompleted { payment_ref: String, order_code: OrderCode },
    PaymentSucceeded { payment_ref: String, order_code: OrderCode },
    PaymentFailed { payment_ref: String, order_code: OrderCode },
    PayoutCreated { payout_ref: String },
    PayoutPaid { payout_ref: String },
    PayoutFailed { payout_ref: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayEventOutcome {
    /// The event changed engine state.
    Applied,
    /// A replay. The referenced record was already in the target state.
    AlreadyApplied,
    /// The reference did not match any record. Logged and ignored.
    Unmatched,
}

/// How an admin resolves a payout request. Each resolution dual-writes the request and the wallet ledger entry that
/// shares its payout reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutResolution {
    Approved,
    Rejected,
    Paid,
}

impl PayoutResolution {
    pub fn request_status(&self) -> PayoutRequestStatus {
        match self {
            PayoutResolution::Approved => PayoutRequestStatus::Approved,
            PayoutResolution::Rejected => PayoutRequestStatus::Rejected,
            PayoutResolution::Paid => PayoutRequestStatus::Paid,
        }
    }

    pub fn ledger_status(&self) -> LedgerEntryStatus {
        match self {
            PayoutResolution::Approved => LedgerEntryStatus::InTransit,
            PayoutResolution::Rejected => LedgerEntryStatus::Failed,
            PayoutResolution::Paid => LedgerEntryStatus::Paid,
        }
    }
}

/// A partial update to the singleton settings row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub maintenance_mode: Option<bool>,
    pub commission_percentage: Option<f64>,
    pub base_delivery_fee: Option<f64>,
    pub per_km_rate: Option<f64>,
    pub service_area: Option<Option<String>>,
}

impl SettingsUpdate {
    pub fn with_maintenance_mode(mut self, on: bool) -> Self {
        self.maintenance_mode = Some(on);
        self
    }

    pub fn with_commission_percentage(mut self, pct: f64) -> Self {
        self.commission_percentage = Some(pct);
        self
    }

    pub fn with_delivery_pricing(mut self, base_fee: f64, per_km: f64) -> Self {
        self.base_delivery_fee = Some(base_fee);
        self.per_km_rate = Some(per_km);
        self
    }

    pub fn with_service_area(mut self, polygon_json: Option<String>) -> Self {
        self.service_area = Some(polygon_json);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.maintenance_mode.is_none()
            && self.commission_percentage.is_none()
            && self.base_delivery_fee.is_none()
            && self.per_km_rate.is_none()
            && self.service_area.is_none()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn balance_never_negative() {
        let b = WalletBalance::derive(Money::from_baht(10), Money::from_baht(50), Money::ZERO);
        assert_eq!(b.available, Money::ZERO);
        let b = WalletBalance::derive(Money::from_baht(100), Money::from_baht(20), Money::from_baht(500));
        assert_eq!(b.available, Money::ZERO);
    }

    #[test]
    fn balance_subtracts_paid_then_pending() {
        let b = WalletBalance::derive(Money::from_baht(100), Money::from_baht(30), Money::from_baht(25));
        assert_eq!(b.available, Money::from_baht(45));
    }
}
