//! Database types for the delivery engine.
//!
//! These are the records that the storage backends read and write. They are deliberately thin: all flow logic lives
//! in the [`crate::dpe_api`] modules and the backend trait implementations.
use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use dpe_common::{Money, THB_CURRENCY_CODE_LOWER};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::helpers::GeoPoint;

/// How long a delivery OTP stays valid after it is issued.
pub const OTP_VALIDITY_MINUTES: i64 = 10;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------    PaymentMethod     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Cash on delivery. The courier collects the full amount from the customer.
    Cash,
    /// Paid up front through the payment gateway.
    Online,
}

impl PaymentMethod {
    pub fn is_cash(&self) -> bool {
        matches!(self, PaymentMethod::Cash)
    }
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "Cash"),
            PaymentMethod::Online => write!(f, "Online"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cash" => Ok(Self::Cash),
            "Online" => Ok(Self::Online),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

impl From<String> for PaymentMethod {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment method: {value}. But this conversion cannot fail. Defaulting to Cash");
            PaymentMethod::Cash
        })
    }
}

//--------------------------------------   ShopOrderStatus    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ShopOrderStatus {
    /// Just placed. The merchant has not started on it, and the customer can still edit line items.
    Pending,
    /// The merchant is working on the order.
    Preparing,
    /// The food is ready (or nearly ready) and the order needs a courier.
    OutForDelivery,
    /// Handed over to the customer. Terminal.
    Delivered,
    /// Cancelled by the customer, merchant, courier or an admin. Terminal.
    Cancelled,
}

impl ShopOrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ShopOrderStatus::Delivered | ShopOrderStatus::Cancelled)
    }

    /// Whether shop orders in this status appear in the courier assignment feed and can be claimed.
    pub fn courier_eligible(&self) -> bool {
        matches!(self, ShopOrderStatus::Preparing | ShopOrderStatus::OutForDelivery)
    }

    /// Forward transitions that merchants drive through the status update call. Delivery and cancellation have their
    /// own entry points and are never reachable from here.
    pub fn can_advance_to(&self, next: ShopOrderStatus) -> bool {
        use ShopOrderStatus::*;
        matches!((self, next), (Pending, Preparing) | (Preparing, OutForDelivery))
    }
}

impl Display for ShopOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShopOrderStatus::Pending => write!(f, "Pending"),
            ShopOrderStatus::Preparing => write!(f, "Preparing"),
            ShopOrderStatus::OutForDelivery => write!(f, "OutForDelivery"),
            ShopOrderStatus::Delivered => write!(f, "Delivered"),
            ShopOrderStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for ShopOrderStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Preparing" => Ok(Self::Preparing),
            "OutForDelivery" => Ok(Self::OutForDelivery),
            "Delivered" => Ok(Self::Delivered),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid shop order status: {s}"))),
        }
    }
}

impl From<String> for ShopOrderStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid shop order status: {value}. But this conversion cannot fail. Defaulting to Pending");
            ShopOrderStatus::Pending
        })
    }
}

//--------------------------------------      OrderCode       --------------------------------------------------------
/// The human-readable order reference, e.g. `ORD-7KQ2MX`. Unique per order.
#[derive(Debug, Clone, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderCode(pub String);

impl FromStr for OrderCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderCode {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderCode {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------        Order         --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_code: OrderCode,
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    /// Whether the gateway has confirmed payment. Always false for cash orders.
    pub paid: bool,
    /// The gateway's payment reference, once payment succeeds.
    pub payment_ref: Option<String>,
    pub address_text: String,
    pub address_lat: Option<f64>,
    pub address_lng: Option<f64>,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn delivery_location(&self) -> Option<GeoPoint> {
        match (self.address_lat, self.address_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    /// Whether the courier delivery fee credit applies at delivery settlement.
    pub fn settles_courier_fee(&self) -> bool {
        self.paid && self.payment_method == PaymentMethod::Online
    }
}

//--------------------------------------      ShopOrder       --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ShopOrder {
    pub id: i64,
    pub order_id: i64,
    pub shop_id: String,
    pub owner_id: String,
    pub subtotal: Money,
    pub status: ShopOrderStatus,
    pub courier_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub otp: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub preparing_started_at: Option<DateTime<Utc>>,
    pub ready_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub arrived_at_customer_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopOrder {
    pub fn is_picked_up(&self) -> bool {
        self.picked_up_at.is_some()
    }

    pub fn is_assigned_to(&self, courier_id: &str) -> bool {
        self.courier_id.as_deref() == Some(courier_id)
    }

    pub fn otp_is_valid(&self, code: &str, now: DateTime<Utc>) -> bool {
        match (&self.otp, self.otp_expires_at) {
            (Some(otp), Some(expires)) => otp == code && expires > now,
            _ => false,
        }
    }

    pub fn otp_expired(&self, now: DateTime<Utc>) -> bool {
        self.otp_expires_at.map(|t| t <= now).unwrap_or(true)
    }
}

//--------------------------------------      OrderItem       --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub shop_order_id: i64,
    pub item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    /// Selected options as a JSON document, opaque to the engine.
    pub options: Option<String>,
    pub note: Option<String>,
}

impl OrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

//--------------------------------------       NewOrder       --------------------------------------------------------
/// A fully resolved order, ready for insertion. Subtotals, the delivery fee and the total have already been
/// recomputed server-side; nothing in here is taken from the client's arithmetic.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub address: DeliveryAddress,
    pub delivery_fee: Money,
    pub total_amount: Money,
    pub shop_orders: Vec<NewShopOrder>,
}

impl NewOrder {
    pub fn subtotal_sum(&self) -> Money {
        self.shop_orders.iter().map(|so| so.subtotal).sum()
    }
}

#[derive(Debug, Clone)]
pub struct NewShopOrder {
    pub shop_id: String,
    pub owner_id: String,
    pub subtotal: Money,
    pub items: Vec<NewOrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub options: Option<String>,
    pub note: Option<String>,
}

impl NewOrderItem {
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl DeliveryAddress {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }
}

//--------------------------------------        Shop          --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Shop {
    pub shop_id: String,
    pub name: String,
    pub owner_id: String,
    /// Named pickup point from the settings table. When set, couriers collect from the cafeteria counter rather
    /// than the shop itself.
    pub cafeteria: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub approved: bool,
    pub closed_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    pub fn location(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some(GeoPoint::new(lat, lng)),
            _ => None,
        }
    }

    pub fn is_closed(&self, now: DateTime<Utc>) -> bool {
        self.closed_until.map(|t| t > now).unwrap_or(false)
    }
}

//--------------------------------------       NewShop        --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewShop {
    pub shop_id: String,
    pub name: String,
    pub owner_id: String,
    pub cafeteria: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub approved: bool,
}

impl NewShop {
    pub fn new<S1: Into<String>, S2: Into<String>, S3: Into<String>>(shop_id: S1, name: S2, owner_id: S3) -> Self {
        Self {
            shop_id: shop_id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            cafeteria: None,
            latitude: None,
            longitude: None,
            approved: true,
        }
    }

    pub fn at_location(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }

    pub fn in_cafeteria<S: Into<String>>(mut self, name: S) -> Self {
        self.cafeteria = Some(name.into());
        self
    }
}

//--------------------------------------    CourierAccount    --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CourierAccount {
    pub courier_id: String,
    /// Running cash float. Cash pickups debit the merchant's net from here; it may go negative.
    pub job_credit: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    RequesterType     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RequesterType {
    Courier,
    Merchant,
}

impl Display for RequesterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequesterType::Courier => write!(f, "Courier"),
            RequesterType::Merchant => write!(f, "Merchant"),
        }
    }
}

impl FromStr for RequesterType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Courier" => Ok(Self::Courier),
            "Merchant" => Ok(Self::Merchant),
            s => Err(ConversionError(format!("Invalid requester type: {s}"))),
        }
    }
}

impl From<String> for RequesterType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid requester type: {value}. But this conversion cannot fail. Defaulting to Courier");
            RequesterType::Courier
        })
    }
}

//--------------------------------------  LedgerEntryStatus   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntryStatus {
    Pending,
    InTransit,
    Paid,
    Failed,
}

impl LedgerEntryStatus {
    /// Statuses that count against the available balance as money on its way out.
    pub fn is_outbound(&self) -> bool {
        matches!(self, LedgerEntryStatus::Pending | LedgerEntryStatus::InTransit)
    }
}

impl Display for LedgerEntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryStatus::Pending => write!(f, "Pending"),
            LedgerEntryStatus::InTransit => write!(f, "InTransit"),
            LedgerEntryStatus::Paid => write!(f, "Paid"),
            LedgerEntryStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for LedgerEntryStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "InTransit" => Ok(Self::InTransit),
            "Paid" => Ok(Self::Paid),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid ledger entry status: {s}"))),
        }
    }
}

impl From<String> for LedgerEntryStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid ledger entry status: {value}. But this conversion cannot fail. Defaulting to Pending");
            LedgerEntryStatus::Pending
        })
    }
}

//--------------------------------------   LedgerEntryType    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntryType {
    /// Created by a withdrawal request.
    Manual,
    /// Created by delivery settlement.
    Automatic,
}

impl Display for LedgerEntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntryType::Manual => write!(f, "Manual"),
            LedgerEntryType::Automatic => write!(f, "Automatic"),
        }
    }
}

impl From<String> for LedgerEntryType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Manual" => Self::Manual,
            "Automatic" => Self::Automatic,
            _ => {
                error!("Invalid ledger entry type: {value}. But this conversion cannot fail. Defaulting to Manual");
                Self::Manual
            },
        }
    }
}

//--------------------------------------  LedgerEntrySource   --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum LedgerEntrySource {
    /// Earnings wallet. Only these entries participate in the derived balance.
    Wallet,
    /// Cash float adjustments. Never part of the wallet balance.
    JobCredit,
}

impl Display for LedgerEntrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LedgerEntrySource::Wallet => write!(f, "Wallet"),
            LedgerEntrySource::JobCredit => write!(f, "JobCredit"),
        }
    }
}

impl From<String> for LedgerEntrySource {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Wallet" => Self::Wallet,
            "JobCredit" => Self::JobCredit,
            _ => {
                error!("Invalid ledger entry source: {value}. But this conversion cannot fail. Defaulting to Wallet");
                Self::Wallet
            },
        }
    }
}

//--------------------------------------     WalletEntry      --------------------------------------------------------
/// An append-only row in an actor's wallet ledger. Amounts are never edited in place; status is the only mutable
/// column, and it only moves through gateway events and admin payout resolution.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WalletEntry {
    pub id: i64,
    pub actor_type: RequesterType,
    pub actor_id: String,
    pub payout_ref: String,
    pub amount: Money,
    pub status: LedgerEntryStatus,
    pub entry_type: LedgerEntryType,
    pub source: LedgerEntrySource,
    /// The row the settlement keyed on: the order for delivery-fee credits, the shop order for job-credit debits.
    pub order_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------   MerchantPayment    --------------------------------------------------------
/// A merchant settlement record. `wallet_credit = false` rows are written at pickup (the payment record itself),
/// `wallet_credit = true` rows are written at delivery (the spendable wallet credit).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MerchantPayment {
    pub id: i64,
    pub shop_id: String,
    pub charge_ref: String,
    pub order_id: i64,
    pub amount: Money,
    pub wallet_credit: bool,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------    PlatformIncome    --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlatformIncomeEntry {
    pub id: i64,
    pub shop_order_id: i64,
    pub amount: Money,
    pub created_at: DateTime<Utc>,
}

//-------------------------------------- PayoutRequestStatus  --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutRequestStatus {
    Pending,
    Approved,
    Rejected,
    Paid,
}

impl Display for PayoutRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutRequestStatus::Pending => write!(f, "Pending"),
            PayoutRequestStatus::Approved => write!(f, "Approved"),
            PayoutRequestStatus::Rejected => write!(f, "Rejected"),
            PayoutRequestStatus::Paid => write!(f, "Paid"),
        }
    }
}

impl From<String> for PayoutRequestStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Pending" => Self::Pending,
            "Approved" => Self::Approved,
            "Rejected" => Self::Rejected,
            "Paid" => Self::Paid,
            _ => {
                error!("Invalid payout request status: {value}. But this conversion cannot fail. Defaulting to Pending");
                Self::Pending
            },
        }
    }
}

//--------------------------------------    PayoutRequest     --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub id: i64,
    pub requester_type: RequesterType,
    pub requester_id: String,
    pub amount: Money,
    pub currency: String,
    pub status: PayoutRequestStatus,
    /// Shared with the wallet ledger entry created alongside this request. Admin resolution dual-writes both rows
    /// matched on this reference.
    pub payout_ref: String,
    pub admin_note: Option<String>,
    pub processed_by: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn is_resolved(&self) -> bool {
        self.status != PayoutRequestStatus::Pending
    }
}

//--------------------------------------    SystemSettings    --------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SystemSettings {
    pub id: i64,
    pub maintenance_mode: bool,
    /// Platform commission, as a percentage. Read fresh at every settlement; clamped on use, not on write.
    pub commission_percentage: f64,
    /// Flat fee component, in baht.
    pub base_delivery_fee: f64,
    /// Distance fee component, in baht per kilometre.
    pub per_km_rate: f64,
    /// The delivery service area as a JSON array of `{lat, lng}` vertices. Orders with coordinates outside this
    /// polygon are rejected at placement.
    pub service_area: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl SystemSettings {
    /// The commission rate as a fraction in `[0, 1]`.
    pub fn commission_rate(&self) -> f64 {
        self.commission_percentage.clamp(0.0, 100.0) / 100.0
    }

    pub fn service_polygon(&self) -> Option<Vec<GeoPoint>> {
        let raw = self.service_area.as_deref()?;
        match serde_json::from_str::<Vec<GeoPoint>>(raw) {
            Ok(points) if points.len() >= 3 => Some(points),
            Ok(_) => None,
            Err(e) => {
                error!("Unparseable service area polygon in system settings: {e}");
                None
            },
        }
    }
}

//--------------------------------------   PickupLocation     --------------------------------------------------------
/// A named cafeteria counter that acts as the pickup point for every shop linked to it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PickupLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl PickupLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

//--------------------------------------       helpers        --------------------------------------------------------
pub fn default_currency() -> String {
    THB_CURRENCY_CODE_LOWER.to_string()
}

pub fn otp_expiry(now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::minutes(OTP_VALIDITY_MINUTES)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_round_trip() {
        for s in [
            ShopOrderStatus::Pending,
            ShopOrderStatus::Preparing,
            ShopOrderStatus::OutForDelivery,
            ShopOrderStatus::Delivered,
            ShopOrderStatus::Cancelled,
        ] {
            assert_eq!(s.to_string().parse::<ShopOrderStatus>().unwrap(), s);
        }
    }

    #[test]
    fn unknown_status_defaults_to_pending() {
        assert_eq!(ShopOrderStatus::from("out of delivery".to_string()), ShopOrderStatus::Pending);
    }

    #[test]
    fn merchant_transitions() {
        use ShopOrderStatus::*;
        assert!(Pending.can_advance_to(Preparing));
        assert!(Preparing.can_advance_to(OutForDelivery));
        assert!(!Preparing.can_advance_to(Pending));
        assert!(!OutForDelivery.can_advance_to(Delivered));
        assert!(!Pending.can_advance_to(OutForDelivery));
    }

    #[test]
    fn eligibility_set() {
        use ShopOrderStatus::*;
        assert!(!Pending.courier_eligible());
        assert!(Preparing.courier_eligible());
        assert!(OutForDelivery.courier_eligible());
        assert!(!Delivered.courier_eligible());
        assert!(!Cancelled.courier_eligible());
    }
}
