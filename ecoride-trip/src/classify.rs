use chrono::{DateTime, Duration, Utc};
use ecoride_core::{Booking, BookingStatus, CoreResult, Trip, TripStatus};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

use crate::lifecycle::TripLifecycleManager;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripRole {
    Driver,
    Passenger,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripCategory {
    Ongoing,
    Upcoming,
    Past,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTripEntry {
    pub role: TripRole,
    pub trip: Trip,
    /// Set for passenger entries
    pub booking: Option<Booking>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UserTrips {
    pub ongoing: Vec<UserTripEntry>,
    pub upcoming: Vec<UserTripEntry>,
    pub past: Vec<UserTripEntry>,
}

/// First matching rule wins: ongoing, upcoming, past. Anything else is ongoing.
pub fn categorize(status: TripStatus, departure_at: DateTime<Utc>, now: DateTime<Utc>) -> TripCategory {
    let hour_ago = now - Duration::hours(1);
    let in_two_hours = now + Duration::hours(2);

    let ongoing = matches!(
        status,
        TripStatus::PendingDeparture | TripStatus::Opened | TripStatus::InProgress
    ) && departure_at > hour_ago
        && departure_at <= in_two_hours;
    if ongoing {
        return TripCategory::Ongoing;
    }
    if status.is_bookable() && departure_at > now {
        return TripCategory::Upcoming;
    }
    if status.is_terminal() || departure_at <= hour_ago {
        return TripCategory::Past;
    }
    TripCategory::Ongoing
}

impl UserTripEntry {
    pub fn category(&self, now: DateTime<Utc>) -> TripCategory {
        // A cancelled seat is history whatever the trip does next
        if matches!(&self.booking, Some(b) if b.status == BookingStatus::Cancelled) {
            return TripCategory::Past;
        }
        categorize(self.trip.status, self.trip.departure_at, now)
    }
}

impl UserTrips {
    pub fn from_entries(mut entries: Vec<UserTripEntry>, now: DateTime<Utc>) -> Self {
        entries.sort_by(|a, b| b.trip.departure_at.cmp(&a.trip.departure_at));

        let mut trips = UserTrips::default();
        for entry in entries {
            match entry.category(now) {
                TripCategory::Ongoing => trips.ongoing.push(entry),
                TripCategory::Upcoming => trips.upcoming.push(entry),
                TripCategory::Past => trips.past.push(entry),
            }
        }
        trips
    }
}

impl TripLifecycleManager {
    /// Trips the user drives plus trips they booked, categorized.
    pub async fn user_trips(&self, user_id: Uuid) -> CoreResult<UserTrips> {
        let mut entries: Vec<UserTripEntry> = self
            .trips
            .list_by_driver(user_id)
            .await?
            .into_iter()
            .map(|trip| UserTripEntry { role: TripRole::Driver, trip, booking: None })
            .collect();

        let bookings = self.bookings.list_by_passenger(user_id).await?;
        let mut trips: HashMap<Uuid, Option<Trip>> = HashMap::new();
        for booking in bookings {
            if !trips.contains_key(&booking.trip_id) {
                let trip = self.trips.get(booking.trip_id).await?;
                trips.insert(booking.trip_id, trip);
            }
            if let Some(Some(trip)) = trips.get(&booking.trip_id) {
                entries.push(UserTripEntry {
                    role: TripRole::Passenger,
                    trip: trip.clone(),
                    booking: Some(booking),
                });
            }
        }

        Ok(UserTrips::from_entries(entries, self.clock.now()))
    }
}
