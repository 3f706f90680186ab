mod codes;
mod fees;
mod geo;

pub use codes::{new_delivery_otp, new_order_code};
pub use fees::delivery_fee;
pub use geo::{haversine_km, point_in_polygon, visibility_delay_secs, GeoPoint, UNKNOWN_DISTANCE_DELAY_SECS};
