//! # Geo Utility
//!
//! Great-circle distance and a naive ETA estimate used by the location tracker.
//!
//! Distances use the haversine formula on a spherical Earth (radius 6371 km). This is
//! accurate to well under a percent at city scale, which is all a delivery ETA needs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS-84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// True when both coordinates are finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine distance between two points, in kilometres.
///
/// Symmetric, non-negative, and exactly zero for identical points.
pub fn distance_km(a: GeoPoint, b: GeoPoint) -> f64 {
    if a == b {
        return 0.0;
    }
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lng / 2.0).sin().powi(2);
    // Clamp guards asin against rounding just above 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();
    (EARTH_RADIUS_KM * c).max(0.0)
}

/// Estimated arrival time for `distance_km` at `average_speed_kmh`, starting now.
pub fn estimate_eta(distance_km: f64, average_speed_kmh: f64) -> DateTime<Utc> {
    estimate_eta_from(Utc::now(), distance_km, average_speed_kmh)
}

/// Same as [`estimate_eta`] but relative to an explicit `now`.
///
/// Zero (or negative) distance yields `now`. A non-positive speed cannot produce a
/// meaningful estimate, so it also yields `now`; [`DispatchConfig`](crate::config::DispatchConfig)
/// never hands out such a speed.
pub fn estimate_eta_from(now: DateTime<Utc>, distance_km: f64, average_speed_kmh: f64) -> DateTime<Utc> {
    if distance_km <= 0.0 || average_speed_kmh <= 0.0 || !distance_km.is_finite() {
        return now;
    }
    let travel_ms = (distance_km / average_speed_kmh * 3_600_000.0).round() as i64;
    now + Duration::milliseconds(travel_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLR_MG_ROAD: GeoPoint = GeoPoint { lat: 12.9756, lng: 77.6050 };
    const BLR_KORAMANGALA: GeoPoint = GeoPoint { lat: 12.9352, lng: 77.6245 };

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(distance_km(BLR_MG_ROAD, BLR_MG_ROAD), 0.0);
        let origin = GeoPoint::new(0.0, 0.0);
        assert_eq!(distance_km(origin, origin), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = distance_km(BLR_MG_ROAD, BLR_KORAMANGALA);
        let ba = distance_km(BLR_KORAMANGALA, BLR_MG_ROAD);
        assert!((ab - ba).abs() < 1e-9);
        assert!(ab > 4.0 && ab < 6.0, "unexpected distance {ab}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 0.0));
        assert!((d - 111.19).abs() < 0.1, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let d = distance_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn eta_for_five_km_at_twenty_kmh_is_fifteen_minutes() {
        let now = Utc::now();
        let eta = estimate_eta_from(now, 5.0, 20.0);
        assert_eq!(eta - now, Duration::minutes(15));
    }

    #[test]
    fn eta_is_measured_from_the_current_time() {
        let before = Utc::now();
        let eta = estimate_eta(5.0, 20.0);
        let after = Utc::now();
        assert!(eta >= before + Duration::minutes(15), "{eta} is earlier than expected");
        assert!(eta <= after + Duration::minutes(15), "{eta} is later than expected");
        assert!(estimate_eta(0.0, 20.0) <= Utc::now());
    }

    #[test]
    fn eta_for_zero_distance_is_now() {
        let now = Utc::now();
        assert_eq!(estimate_eta_from(now, 0.0, 20.0), now);
        assert_eq!(estimate_eta_from(now, 3.0, 0.0), now);
    }

    #[test]
    fn coordinate_validation() {
        assert!(BLR_MG_ROAD.is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
