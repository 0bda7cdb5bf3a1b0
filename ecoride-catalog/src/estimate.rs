use ecoride_core::{geo, CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Average car-sharing price per kilometre, in cents.
pub const SUGGESTED_CENTS_PER_KM: f64 = 6.0;
/// Average car emission per kilometre and person, in grams.
pub const CO2_GRAMS_PER_KM_PER_PERSON: f64 = 148.0;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripEstimate {
    pub distance_km: f64,
    /// Rounded up to the whole euro
    pub suggested_price_cents: i64,
    pub co2_saved_grams_per_passenger: i64,
}

pub fn suggested_price_cents(distance_km: f64) -> i64 {
    let euros = (distance_km * SUGGESTED_CENTS_PER_KM / 100.0).ceil() as i64;
    euros * 100
}

pub fn co2_saved_grams(distance_km: f64, passengers: u32) -> i64 {
    (distance_km * passengers as f64 * CO2_GRAMS_PER_KM_PER_PERSON).round() as i64
}

/// Great-circle distance and suggested seat price between two points.
pub fn estimate(start_lat: f64, start_lng: f64, end_lat: f64, end_lng: f64) -> CoreResult<TripEstimate> {
    if !geo::is_valid_coordinate(start_lat, start_lng) || !geo::is_valid_coordinate(end_lat, end_lng) {
        return Err(CoreError::validation("coordinates are out of range"));
    }
    let distance_km = geo::haversine_km(start_lat, start_lng, end_lat, end_lng);
    Ok(TripEstimate {
        distance_km,
        suggested_price_cents: suggested_price_cents(distance_km),
        co2_saved_grams_per_passenger: co2_saved_grams(distance_km, 1),
    })
}
