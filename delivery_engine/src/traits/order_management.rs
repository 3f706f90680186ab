use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{OrderCode, OrderItem, PickupLocation, Shop, ShopOrder, SystemSettings},
    order_objects::OrderQueryFilter,
    traits::data_objects::FullOrder,
};

/// Read-only access to orders, shops and settings. Every backend exposes this; the mutating flows live in
/// [`crate::traits::DeliveryGatewayDatabase`].
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    /// Fetches the order aggregate (order row, shop orders, line items) by internal id.
    async fn fetch_order(&self, id: i64) -> Result<Option<FullOrder>, OrderApiError>;

    /// Fetches the order aggregate by its human-readable code.
    async fn fetch_order_by_code(&self, code: &OrderCode) -> Result<Option<FullOrder>, OrderApiError>;

    async fn fetch_shop_order(&self, id: i64) -> Result<Option<ShopOrder>, OrderApiError>;

    async fn fetch_order_items(&self, shop_order_id: i64) -> Result<Vec<OrderItem>, OrderApiError>;

    /// Fetches shop orders according to the criteria in the filter, ordered by creation time ascending.
    async fn search_shop_orders(&self, query: OrderQueryFilter) -> Result<Vec<ShopOrder>, OrderApiError>;

    /// Completed deliveries for the given courier since the given instant. Used for the "today" summary.
    async fn deliveries_for_courier_since(
        &self,
        courier_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<ShopOrder>, OrderApiError>;

    /// How many shop orders the customer has cancelled since the given instant.
    async fn cancellation_count_for_customer(
        &self,
        customer_id: &str,
        since: DateTime<Utc>,
    ) -> Result<i64, OrderApiError>;

    async fn fetch_shop(&self, shop_id: &str) -> Result<Option<Shop>, OrderApiError>;

    /// The singleton settings row. Callers must re-fetch rather than cache: the commission rate in particular must
    /// be read fresh at every settlement.
    async fn fetch_system_settings(&self) -> Result<SystemSettings, OrderApiError>;

    async fn fetch_pickup_locations(&self) -> Result<Vec<PickupLocation>, OrderApiError>;
}

#[derive(Debug, Clone, Error)]
pub enum OrderApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("User error constructing query: {0}")]
    QueryError(String),
    #[error("The requested order (internal id {0}) does not exist")]
    OrderDoesNotExist(i64),
    #[error("The requested shop order (internal id {0}) does not exist")]
    ShopOrderDoesNotExist(i64),
}

impl From<sqlx::Error> for OrderApiError {
    fn from(e: sqlx::Error) -> Self {
        OrderApiError::DatabaseError(e.to_string())
    }
}
