use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Active subscription of a passenger. Read-only for the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub reduction_percent: u32,
    pub tree_multiplier: f64,
}

/// Axis-aligned latitude/longitude box.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoBounds {
    pub min_latitude: f64,
    pub max_latitude: f64,
    pub min_longitude: f64,
    pub max_longitude: f64,
}

impl GeoBounds {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&latitude)
            && (self.min_longitude..=self.max_longitude).contains(&longitude)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: Uuid,
    pub name: String,
    pub fee_discount_percent: u32,
    pub tree_multiplier: f64,
    pub valid_from: NaiveDate,
    pub valid_until: NaiveDate,
    pub region: Option<GeoBounds>,
}

impl Promotion {
    /// Departure date inside the validity range (inclusive) and, when a region
    /// is set, both endpoints inside it.
    pub fn applies_to(&self, trip: &TripAttributes) -> bool {
        let date = trip.departure_at.date_naive();
        if date < self.valid_from || date > self.valid_until {
            return false;
        }
        match &self.region {
            None => true,
            Some(bounds) => {
                bounds.contains(trip.start_latitude, trip.start_longitude)
                    && bounds.contains(trip.end_latitude, trip.end_longitude)
            }
        }
    }
}

/// What promotion eligibility looks at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TripAttributes {
    pub trip_id: Uuid,
    pub departure_at: DateTime<Utc>,
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
}
