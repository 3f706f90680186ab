use std::fmt::Display;

use chrono::{DateTime, Utc};
use dpe_common::Money;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{NewOrderItem, PaymentMethod, ShopOrder, ShopOrderStatus},
    helpers::GeoPoint,
};

/// Who is driving an operation. The engine has no authentication layer; hosts resolve the session to one of these
/// and the engine applies the authorization matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Actor {
    Customer(String),
    Merchant(String),
    Courier(String),
    Admin(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Customer(id) | Actor::Merchant(id) | Actor::Courier(id) | Actor::Admin(id) => id.as_str(),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Actor::Admin(_))
    }
}

impl Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Actor::Customer(id) => write!(f, "customer {id}"),
            Actor::Merchant(id) => write!(f, "merchant {id}"),
            Actor::Courier(id) => write!(f, "courier {id}"),
            Actor::Admin(id) => write!(f, "admin {id}"),
        }
    }
}

/// A single cart line as submitted by the client. Prices are looked up per line but the arithmetic (line totals,
/// subtotals, the order total) is always redone server-side.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub shop_id: String,
    pub item_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: i64,
    pub options: Option<String>,
    pub note: Option<String>,
}

impl CartLine {
    pub fn into_item(self) -> NewOrderItem {
        NewOrderItem {
            item_id: self.item_id,
            name: self.name,
            unit_price: self.unit_price,
            quantity: self.quantity,
            options: self.options,
            note: self.note,
        }
    }
}

/// A new order as submitted by the client, before any validation or recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderRequest {
    pub customer_id: String,
    pub payment_method: PaymentMethod,
    pub address_text: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub lines: Vec<CartLine>,
}

/// An entry in the courier assignment feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOffer {
    pub shop_order: ShopOrder,
    /// Where the courier collects: the shop's cafeteria counter when one is configured, otherwise the shop itself.
    pub pickup: Option<GeoPoint>,
    /// Distance from the courier to the pickup point. `None` when either location is unknown.
    pub distance_km: Option<f64>,
    /// How long the host should hold this offer back from the courier's screen.
    pub visible_after_secs: u32,
}

/// The result of a claim attempt. Losing is a normal outcome of the race, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClaimOutcome {
    Won(ShopOrder),
    Lost,
}

impl ClaimOutcome {
    pub fn is_won(&self) -> bool {
        matches!(self, ClaimOutcome::Won(_))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrderQueryFilter {
    pub order_id: Option<i64>,
    pub shop_id: Option<String>,
    pub owner_id: Option<String>,
    pub courier_id: Option<String>,
    pub status: Option<Vec<ShopOrderStatus>>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl OrderQueryFilter {
    pub fn with_order_id(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_shop_id<S: Into<String>>(mut self, shop_id: S) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    pub fn with_owner_id<S: Into<String>>(mut self, owner_id: S) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_courier_id<S: Into<String>>(mut self, courier_id: S) -> Self {
        self.courier_id = Some(courier_id.into());
        self
    }

    pub fn with_status(mut self, status: ShopOrderStatus) -> Self {
        self.status.get_or_insert_with(Vec::new).push(status);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.order_id.is_none() &&
            self.shop_id.is_none() &&
            self.owner_id.is_none() &&
            self.courier_id.is_none() &&
            self.status.is_none() &&
            self.since.is_none() &&
            self.until.is_none()
    }
}

impl Display for OrderQueryFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "No filters.")?;
            return Ok(());
        }
        if let Some(order_id) = &self.order_id {
            write!(f, "order_id: {order_id}. ")?;
        }
        if let Some(shop_id) = &self.shop_id {
            write!(f, "shop_id: {shop_id}. ")?;
        }
        if let Some(owner_id) = &self.owner_id {
            write!(f, "owner_id: {owner_id}. ")?;
        }
        if let Some(courier_id) = &self.courier_id {
            write!(f, "courier_id: {courier_id}. ")?;
        }
        if let Some(since) = &self.since {
            write!(f, "since {since}. ")?;
        }
        if let Some(until) = &self.until {
            write!(f, "until {until}. ")?;
        }
        if let Some(statuses) = &self.status {
            let statuses = statuses.iter().map(|s| s.to_string()).collect::<Vec<String>>().join(",");
            write!(f, "statuses: [{statuses}]. ")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn filter_builder() {
        let f = OrderQueryFilter::default()
            .with_shop_id("shop-1")
            .with_status(ShopOrderStatus::Preparing)
            .with_status(ShopOrderStatus::OutForDelivery);
        assert!(!f.is_empty());
        assert_eq!(f.status.as_ref().map(|s| s.len()), Some(2));
        assert_eq!(f.to_string(), "shop_id: shop-1. statuses: [Preparing,OutForDelivery]. ");
    }

    #[test]
    fn empty_filter() {
        let f = OrderQueryFilter::default();
        assert!(f.is_empty());
        assert_eq!(f.to_string(), "No filters.");
    }
}
