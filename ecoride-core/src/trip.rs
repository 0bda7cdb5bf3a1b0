use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::geo;
use crate::promotion::TripAttributes;
use crate::{CoreError, CoreResult};

pub const MIN_DISTANCE_KM: f64 = 0.1;
pub const MAX_DISTANCE_KM: f64 = 2000.0;
pub const MIN_PRICE_CENTS: i64 = 100;
pub const MAX_PRICE_CENTS: i64 = 50_000;
pub const MIN_SEATS: u32 = 1;
pub const MAX_SEATS: u32 = 8;

/// Trip status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Available,
    Full,
    PendingDeparture,
    Opened,
    InProgress,
    Completed,
    Cancelled,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Available => "available",
            TripStatus::Full => "full",
            TripStatus::PendingDeparture => "pending_departure",
            TripStatus::Opened => "opened",
            TripStatus::InProgress => "in_progress",
            TripStatus::Completed => "completed",
            TripStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TripStatus::Completed | TripStatus::Cancelled)
    }

    /// Seats can be booked or released.
    pub fn is_bookable(&self) -> bool {
        matches!(self, TripStatus::Available | TripStatus::Full)
    }

    /// Passengers can still cancel (the trip has not been opened).
    pub fn before_opening(&self) -> bool {
        matches!(self, TripStatus::Available | TripStatus::Full | TripStatus::PendingDeparture)
    }

    /// Validation codes can be redeemed.
    pub fn is_boardable(&self) -> bool {
        matches!(self, TripStatus::Opened | TripStatus::InProgress)
    }

    pub fn can_transition_to(&self, next: TripStatus) -> bool {
        use TripStatus::*;
        matches!(
            (self, next),
            (Available, Full)
                | (Full, Available)
                | (Available | Full, PendingDeparture)
                | (PendingDeparture, Available | Full)
                | (Available | Full | PendingDeparture, Opened)
                | (Available | Full | PendingDeparture, Cancelled)
                | (Opened, InProgress)
                | (InProgress, Completed)
        )
    }

    /// Checked transition; the error names the status that blocks it.
    pub fn transition_to(self, next: TripStatus) -> CoreResult<TripStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(CoreError::InvalidState(format!(
                "cannot move trip from {} to {}: {}",
                self,
                next,
                self.blocking_reason()
            )))
        }
    }

    /// Human readable reason used when this status blocks an action.
    pub fn blocking_reason(&self) -> &'static str {
        match self {
            TripStatus::Available => "trip is still available",
            TripStatus::Full => "trip is full",
            TripStatus::PendingDeparture => "trip is pending departure",
            TripStatus::Opened => "trip is already opened",
            TripStatus::InProgress => "trip is already in progress",
            TripStatus::Completed => "trip is already completed",
            TripStatus::Cancelled => "trip is already cancelled",
        }
    }

    /// Status implied by occupancy while the trip is still bookable.
    pub fn for_occupancy(self, taken_seats: u32, total_seats: u32) -> TripStatus {
        match self {
            TripStatus::Available | TripStatus::Full => {
                if taken_seats >= total_seats {
                    TripStatus::Full
                } else {
                    TripStatus::Available
                }
            }
            other => other,
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "available" => Ok(TripStatus::Available),
            "full" => Ok(TripStatus::Full),
            "pending_departure" => Ok(TripStatus::PendingDeparture),
            "opened" => Ok(TripStatus::Opened),
            "in_progress" => Ok(TripStatus::InProgress),
            "completed" => Ok(TripStatus::Completed),
            "cancelled" => Ok(TripStatus::Cancelled),
            other => Err(CoreError::validation(format!("unknown trip status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// A published ride offer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Trip {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub start: Location,
    pub end: Location,
    pub departure_at: DateTime<Utc>,
    pub distance_km: f64,
    pub price_per_seat_cents: i64,
    pub total_seats: u32,
    pub taken_seats: u32,
    pub status: TripStatus,
    pub co2_saved_kg: i64,
    pub trees_equivalent: i64,
    pub created_at: DateTime<Utc>,
    pub opened_at: Option<DateTime<Utc>>,
}

impl Trip {
    /// Build a trip from validated creation input.
    pub fn new(driver_id: Uuid, input: NewTrip, now: DateTime<Utc>) -> CoreResult<Self> {
        input.validate(now)?;

        let distance_km = input.distance_km.unwrap_or_else(|| {
            geo::haversine_km(
                input.start.latitude,
                input.start.longitude,
                input.end.latitude,
                input.end.longitude,
            )
        });
        if distance_km <= 0.0 {
            return Err(CoreError::validation("start and end points must differ"));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            driver_id,
            start: input.start,
            end: input.end,
            departure_at: input.departure_at,
            distance_km,
            price_per_seat_cents: input.price_per_seat_cents,
            total_seats: input.total_seats,
            taken_seats: 0,
            status: TripStatus::Available,
            co2_saved_kg: 0,
            trees_equivalent: 0,
            created_at: now,
            opened_at: None,
        })
    }

    pub fn free_seats(&self) -> u32 {
        self.total_seats.saturating_sub(self.taken_seats)
    }

    pub fn earnings_cents(&self) -> i64 {
        self.taken_seats as i64 * self.price_per_seat_cents
    }

    pub fn attributes(&self) -> TripAttributes {
        TripAttributes {
            trip_id: self.id,
            departure_at: self.departure_at,
            start_latitude: self.start.latitude,
            start_longitude: self.start.longitude,
            end_latitude: self.end.latitude,
            end_longitude: self.end.longitude,
        }
    }
}

/// Creation input for a trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTrip {
    pub start: Location,
    pub end: Location,
    pub departure_at: DateTime<Utc>,
    /// Road distance supplied by the routing provider.
    pub distance_km: Option<f64>,
    pub price_per_seat_cents: i64,
    pub total_seats: u32,
}

impl NewTrip {
    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self, now: DateTime<Utc>) -> CoreResult<()> {
        let mut errors = Vec::new();

        if self.start.address.trim().is_empty() {
            errors.push("start address is required".to_string());
        }
        if self.end.address.trim().is_empty() {
            errors.push("end address is required".to_string());
        }
        if !geo::is_valid_coordinate(self.start.latitude, self.start.longitude) {
            errors.push("start coordinates are out of range".to_string());
        }
        if !geo::is_valid_coordinate(self.end.latitude, self.end.longitude) {
            errors.push("end coordinates are out of range".to_string());
        }
        if self.departure_at <= now {
            errors.push("departure must be in the future".to_string());
        }
        if let Some(distance) = self.distance_km {
            if !(MIN_DISTANCE_KM..=MAX_DISTANCE_KM).contains(&distance) {
                errors.push(format!(
                    "distance must be between {} and {} km",
                    MIN_DISTANCE_KM, MAX_DISTANCE_KM
                ));
            }
        }
        if let Err(e) = validate_price(self.price_per_seat_cents) {
            errors.push(e);
        }
        if let Err(e) = validate_seats(self.total_seats) {
            errors.push(e);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(errors))
        }
    }
}

pub fn validate_price(cents: i64) -> Result<(), String> {
    if (MIN_PRICE_CENTS..=MAX_PRICE_CENTS).contains(&cents) {
        Ok(())
    } else {
        Err(format!(
            "price per seat must be between {} and {} cents",
            MIN_PRICE_CENTS, MAX_PRICE_CENTS
        ))
    }
}

pub fn validate_seats(seats: u32) -> Result<(), String> {
    if (MIN_SEATS..=MAX_SEATS).contains(&seats) {
        Ok(())
    } else {
        Err(format!("total seats must be between {} and {}", MIN_SEATS, MAX_SEATS))
    }
}

/// Partial update persisted by the trip store. Only these fields are writable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripChanges {
    pub start: Option<Location>,
    pub end: Option<Location>,
    pub departure_at: Option<DateTime<Utc>>,
    pub price_per_seat_cents: Option<i64>,
    pub total_seats: Option<u32>,
    pub taken_seats: Option<u32>,
    pub status: Option<TripStatus>,
    pub opened_at: Option<DateTime<Utc>>,
    pub co2_saved_kg: Option<i64>,
    pub trees_equivalent: Option<i64>,
}

impl TripChanges {
    pub fn status(status: TripStatus) -> Self {
        Self { status: Some(status), ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self == &TripChanges::default()
    }

    pub fn apply_to(&self, trip: &mut Trip) {
        if let Some(start) = &self.start {
            trip.start = start.clone();
        }
        if let Some(end) = &self.end {
            trip.end = end.clone();
        }
        if let Some(departure_at) = self.departure_at {
            trip.departure_at = departure_at;
        }
        if let Some(price) = self.price_per_seat_cents {
            trip.price_per_seat_cents = price;
        }
        if let Some(total) = self.total_seats {
            trip.total_seats = total;
        }
        if let Some(taken) = self.taken_seats {
            trip.taken_seats = taken;
        }
        if let Some(status) = self.status {
            trip.status = status;
        }
        if let Some(opened_at) = self.opened_at {
            trip.opened_at = Some(opened_at);
        }
        if let Some(co2) = self.co2_saved_kg {
            trip.co2_saved_kg = co2;
        }
        if let Some(trees) = self.trees_equivalent {
            trip.trees_equivalent = trees;
        }
    }
}

/// Store-level filters for listing bookable trips.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TripFilters {
    pub departure_from: Option<NaiveDate>,
    pub departure_to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn new_trip(now: DateTime<Utc>) -> NewTrip {
        NewTrip {
            start: Location { address: "Paris".into(), latitude: 48.8566, longitude: 2.3522 },
            end: Location { address: "Lyon".into(), latitude: 45.7640, longitude: 4.8357 },
            departure_at: now + Duration::days(1),
            distance_km: Some(465.0),
            price_per_seat_cents: 2500,
            total_seats: 3,
        }
    }

    #[test]
    fn test_transition_table() {
        use TripStatus::*;
        assert!(Available.can_transition_to(Full));
        assert!(Full.can_transition_to(Available));
        assert!(PendingDeparture.can_transition_to(Opened));
        assert!(Opened.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Opened.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Available));
        assert!(PendingDeparture.can_transition_to(Available));
        assert!(!PendingDeparture.can_transition_to(InProgress));

        let err = Completed.transition_to(Opened).unwrap_err();
        assert!(err.to_string().contains("already completed"));
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            TripStatus::Available,
            TripStatus::Full,
            TripStatus::PendingDeparture,
            TripStatus::Opened,
            TripStatus::InProgress,
            TripStatus::Completed,
            TripStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TripStatus>().unwrap(), status);
        }
        assert!("boarding".parse::<TripStatus>().is_err());
    }

    #[test]
    fn test_occupancy_only_touches_bookable_states() {
        assert_eq!(TripStatus::Available.for_occupancy(3, 3), TripStatus::Full);
        assert_eq!(TripStatus::Full.for_occupancy(2, 3), TripStatus::Available);
        assert_eq!(TripStatus::PendingDeparture.for_occupancy(3, 3), TripStatus::PendingDeparture);
    }

    #[test]
    fn test_new_trip_keeps_road_distance() {
        let now = Utc::now();
        let trip = Trip::new(Uuid::new_v4(), new_trip(now), now).unwrap();
        assert_eq!(trip.distance_km, 465.0);
        assert_eq!(trip.status, TripStatus::Available);
        assert_eq!(trip.free_seats(), 3);
    }

    #[test]
    fn test_new_trip_falls_back_to_great_circle_distance() {
        let now = Utc::now();
        let mut input = new_trip(now);
        input.distance_km = None;
        let trip = Trip::new(Uuid::new_v4(), input, now).unwrap();
        assert!((trip.distance_km - 391.5).abs() < 1.0);
    }

    #[test]
    fn test_new_trip_reports_all_violations() {
        let now = Utc::now();
        let mut input = new_trip(now);
        input.start.address = "  ".into();
        input.total_seats = 9;
        input.price_per_seat_cents = 10;
        input.departure_at = now - Duration::hours(1);

        match Trip::new(Uuid::new_v4(), input, now) {
            Err(CoreError::Validation(errors)) => assert_eq!(errors.len(), 4),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_changes_apply() {
        let now = Utc::now();
        let mut trip = Trip::new(Uuid::new_v4(), new_trip(now), now).unwrap();
        let changes = TripChanges { taken_seats: Some(3), status: Some(TripStatus::Full), ..Default::default() };
        assert!(!changes.is_empty());
        changes.apply_to(&mut trip);
        assert_eq!(trip.taken_seats, 3);
        assert_eq!(trip.status, TripStatus::Full);
        assert!(TripChanges::default().is_empty());
    }
}
