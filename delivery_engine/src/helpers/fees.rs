//! Server-side fee recomputation. Client-supplied totals are advisory only.
use dpe_common::Money;

/// The delivery fee for an order: `floor(base + distance_km * per_km_rate)`, in whole baht.
/// `base` and `per_km_rate` come straight from the settings table.
pub fn delivery_fee(base: f64, per_km_rate: f64, distance_km: f64) -> Money {
    Money::from_baht((base + distance_km * per_km_rate).floor() as i64)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn fee_is_floored_to_whole_baht() {
        // base 10, 5/km over 2.1 km = 20.5, floored to 20
        assert_eq!(delivery_fee(10.0, 5.0, 2.1), Money::from_baht(20));
        assert_eq!(delivery_fee(0.0, 5.0, 4.0), Money::from_baht(20));
        assert_eq!(delivery_fee(15.0, 0.0, 100.0), Money::from_baht(15));
    }

    #[test]
    fn zero_distance_pays_base_only() {
        assert_eq!(delivery_fee(12.0, 7.0, 0.0), Money::from_baht(12));
    }
}
