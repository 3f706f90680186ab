//! Geospatial math for the assignment feed and placement checks.
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Delay shown to a courier before an offer becomes claimable when their location is unknown.
pub const UNKNOWN_DISTANCE_DELAY_SECS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Great-circle distance between two points, in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// How long an offer stays hidden from a courier, based on their distance to the pickup point.
///
/// Near couriers see offers almost immediately; far couriers see them later, so that the closest courier gets a head
/// start without any central coordination. Couriers with unknown location go to the back of the queue.
pub fn visibility_delay_secs(distance_km: Option<f64>) -> u32 {
    match distance_km {
        None => UNKNOWN_DISTANCE_DELAY_SECS,
        Some(d) if d <= 0.1 => 1,
        Some(d) if d <= 1.0 => 10,
        Some(d) => 10 + ((d - 1.0) * 10.0).ceil() as u32,
    }
}

/// Ray-cast point-in-polygon test. The polygon is a closed ring of vertices; the edge between the last and first
/// vertex is implied.
pub fn point_in_polygon(point: GeoPoint, polygon: &[GeoPoint]) -> bool {
    if polygon.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let (pi, pj) = (polygon[i], polygon[j]);
        let crosses = (pi.lng > point.lng) != (pj.lng > point.lng);
        if crosses {
            let intersect_lat = (pj.lat - pi.lat) * (point.lng - pi.lng) / (pj.lng - pi.lng) + pi.lat;
            if point.lat < intersect_lat {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn haversine_known_distance() {
        // Bangkok to Chiang Mai is roughly 580 km
        let bkk = GeoPoint::new(13.7563, 100.5018);
        let cnx = GeoPoint::new(18.7883, 98.9853);
        let d = haversine_km(bkk, cnx);
        assert!((d - 580.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        let p = GeoPoint::new(13.7563, 100.5018);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn delay_tiers() {
        assert_eq!(visibility_delay_secs(Some(0.05)), 1);
        assert_eq!(visibility_delay_secs(Some(0.5)), 10);
        assert_eq!(visibility_delay_secs(Some(1.5)), 15);
        assert_eq!(visibility_delay_secs(None), 60);
    }

    #[test]
    fn delay_tier_boundaries() {
        assert_eq!(visibility_delay_secs(Some(0.1)), 1);
        assert_eq!(visibility_delay_secs(Some(1.0)), 10);
        assert_eq!(visibility_delay_secs(Some(2.0)), 20);
        assert_eq!(visibility_delay_secs(Some(3.2)), 32);
    }

    #[test]
    fn polygon_containment() {
        let square = vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 10.0),
            GeoPoint::new(10.0, 10.0),
            GeoPoint::new(10.0, 0.0),
        ];
        assert!(point_in_polygon(GeoPoint::new(5.0, 5.0), &square));
        assert!(!point_in_polygon(GeoPoint::new(15.0, 5.0), &square));
        assert!(!point_in_polygon(GeoPoint::new(-1.0, -1.0), &square));
    }

    #[test]
    fn degenerate_polygon_contains_nothing() {
        let line = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)];
        assert!(!point_in_polygon(GeoPoint::new(0.5, 0.5), &line));
    }
}
