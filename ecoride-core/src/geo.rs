//! Great-circle helpers used by the geofence checks and trip search.

pub const EARTH_RADIUS_KM: f64 = 6371.0;

pub fn to_radians(degrees: f64) -> f64 {
    degrees * (std::f64::consts::PI / 180.0)
}

/// Haversine distance between two coordinates, in kilometres rounded to
/// two decimals.
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = to_radians(lat2 - lat1);
    let d_lng = to_radians(lng2 - lng1);

    let a = (d_lat / 2.0).sin().powi(2)
        + to_radians(lat1).cos() * to_radians(lat2).cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    (EARTH_RADIUS_KM * c * 100.0).round() / 100.0
}

/// Same distance expressed in metres, as compared against geofence thresholds.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    haversine_km(lat1, lng1, lat2, lng2) * 1000.0
}

/// Returns the measured distance in metres when it exceeds `limit_m`.
pub fn outside_radius(lat: f64, lng: f64, center_lat: f64, center_lng: f64, limit_m: f64) -> Option<f64> {
    let distance_m = haversine_m(lat, lng, center_lat, center_lng);
    if distance_m > limit_m {
        Some(distance_m)
    } else {
        None
    }
}

pub fn is_valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
