use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewShop, PickupLocation, Shop, SystemSettings},
    traits::{data_objects::SettingsUpdate, OrderApiError},
};

/// Admin-side maintenance of the settings singleton, pickup locations and the shop registry.
#[allow(async_fn_in_trait)]
pub trait SettingsManagement: Clone {
    /// Applies a partial update to the settings row and returns the result.
    async fn update_system_settings(&self, update: SettingsUpdate) -> Result<SystemSettings, OrderApiError>;

    async fn upsert_pickup_location(&self, location: PickupLocation) -> Result<(), OrderApiError>;

    async fn upsert_shop(&self, shop: NewShop) -> Result<Shop, OrderApiError>;

    /// Closes a shop until the given instant. The closure clears itself once the window elapses, either lazily at
    /// placement or through the periodic sweep.
    async fn close_shop_until(&self, shop_id: &str, until: DateTime<Utc>) -> Result<Shop, OrderApiError>;
}
