use chrono::{DateTime, Duration, Utc};
use ecoride_booking::{SeatInventory, TripLocks};
use ecoride_core::repository::{BookingRepository, EcoLedger, EcoSettingsProvider, TripRepository};
use ecoride_core::trip::{validate_price, validate_seats};
use ecoride_core::{
    geo, Actor, Clock, CoreError, CoreResult, EcoCredit, Location, NewTrip, Trip, TripChanges, TripStatus,
    WindowViolation,
};
use ecoride_shared::models::events::{TripCompletedEvent, TripOpenedEvent, TripStatusEvent};
use ecoride_shared::RideEvent;
use ecoride_store::EventPublisher;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::sweep::in_departure_lead;

/// Geofence and time-window settings for driver actions.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    pub open_radius_m: f64,
    pub complete_radius_m: f64,
    /// Opening is allowed from `departure - window` to `departure + window`
    pub open_window: Duration,
    pub cancel_empty_on_sweep: bool,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            open_radius_m: 500.0,
            complete_radius_m: 500.0,
            open_window: Duration::minutes(30),
            cancel_empty_on_sweep: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpenOutcome {
    Opened { trip: Trip, distance_from_start_m: f64 },
    /// Nobody booked: the trip was cancelled instead of opened
    AutoCancelled { trip: Trip },
}

#[derive(Debug, Clone, Serialize)]
pub struct CompleteOutcome {
    pub trip: Trip,
    pub distance_from_end_m: f64,
    pub eco: EcoCredit,
    pub earnings_cents: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Earnings {
    pub trip_id: Uuid,
    pub taken_seats: u32,
    pub price_per_seat_cents: i64,
    pub earnings_cents: i64,
}

/// Fields a driver or admin may change on a trip.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TripUpdate {
    pub start_address: Option<String>,
    pub start_latitude: Option<f64>,
    pub start_longitude: Option<f64>,
    pub end_address: Option<String>,
    pub end_latitude: Option<f64>,
    pub end_longitude: Option<f64>,
    pub price_per_seat_cents: Option<i64>,
    pub total_seats: Option<u32>,
    pub departure_at: Option<DateTime<Utc>>,
    pub status: Option<TripStatus>,
}

impl TripUpdate {
    pub fn is_empty(&self) -> bool {
        self.start_address.is_none()
            && self.start_latitude.is_none()
            && self.start_longitude.is_none()
            && self.end_address.is_none()
            && self.end_latitude.is_none()
            && self.end_longitude.is_none()
            && self.price_per_seat_cents.is_none()
            && self.total_seats.is_none()
            && self.departure_at.is_none()
            && self.status.is_none()
    }
}

fn merge_location(
    current: &Location,
    address: &Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<Location> {
    if address.is_none() && latitude.is_none() && longitude.is_none() {
        return None;
    }
    Some(Location {
        address: address.clone().unwrap_or_else(|| current.address.clone()),
        latitude: latitude.unwrap_or(current.latitude),
        longitude: longitude.unwrap_or(current.longitude),
    })
}

pub struct TripLifecycleManager {
    pub(crate) trips: Arc<dyn TripRepository>,
    pub(crate) bookings: Arc<dyn BookingRepository>,
    pub(crate) locks: TripLocks,
    pub(crate) clock: Arc<dyn Clock>,
    eco_settings: Arc<dyn EcoSettingsProvider>,
    ledger: Arc<dyn EcoLedger>,
    pub(crate) events: EventPublisher,
    pub(crate) policy: LifecyclePolicy,
}

impl TripLifecycleManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        trips: Arc<dyn TripRepository>,
        bookings: Arc<dyn BookingRepository>,
        locks: TripLocks,
        clock: Arc<dyn Clock>,
        eco_settings: Arc<dyn EcoSettingsProvider>,
        ledger: Arc<dyn EcoLedger>,
        events: EventPublisher,
        policy: LifecyclePolicy,
    ) -> Self {
        Self { trips, bookings, locks, clock, eco_settings, ledger, events, policy }
    }

    pub(crate) async fn load_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.trips.get(trip_id).await?.ok_or_else(|| CoreError::trip_not_found(trip_id))
    }

    async fn save(&self, trip_id: Uuid, changes: &TripChanges) -> CoreResult<Trip> {
        self.trips
            .update_fields(trip_id, changes)
            .await?
            .ok_or_else(|| CoreError::trip_not_found(trip_id))
    }

    pub(crate) fn publish_status(&self, trip: &Trip) {
        let event = TripStatusEvent {
            trip_id: trip.id,
            status: trip.status.to_string(),
            timestamp: self.clock.now().timestamp(),
        };
        match trip.status {
            TripStatus::InProgress => self.events.publish(RideEvent::TripStarted(event)),
            TripStatus::Cancelled => self.events.publish(RideEvent::TripCancelled(event)),
            _ => {}
        }
    }

    fn ensure_driver(&self, trip: &Trip, driver_id: Uuid, action: &str) -> CoreResult<()> {
        if trip.driver_id != driver_id {
            warn!("User {} tried to {} trip {} they do not drive", driver_id, action, trip.id);
            return Err(CoreError::Unauthorized(format!("only the driver can {} this trip", action)));
        }
        Ok(())
    }

    pub async fn create_trip(&self, driver_id: Uuid, input: NewTrip) -> CoreResult<Trip> {
        let trip = Trip::new(driver_id, input, self.clock.now())?;
        self.trips.create(&trip).await?;
        info!("Trip {} created by driver {} ({} seats)", trip.id, driver_id, trip.total_seats);
        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.load_trip(trip_id).await
    }

    pub async fn open(&self, trip_id: Uuid, driver_id: Uuid, latitude: f64, longitude: f64) -> CoreResult<OpenOutcome> {
        let _guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;
        self.ensure_driver(&trip, driver_id, "open")?;

        let next = trip.status.transition_to(TripStatus::Opened)?;

        let now = self.clock.now();
        let earliest = trip.departure_at - self.policy.open_window;
        let latest = trip.departure_at + self.policy.open_window;
        if now < earliest {
            let seconds = (earliest - now).num_seconds();
            let minutes_remaining = (seconds + 59) / 60;
            return Err(CoreError::OutOfWindow(WindowViolation::TooEarly { minutes_remaining }));
        }
        if now > latest {
            return Err(CoreError::OutOfWindow(WindowViolation::TooLate));
        }

        if trip.taken_seats == 0 {
            let cancelled = trip.status.transition_to(TripStatus::Cancelled)?;
            let trip = self.save(trip_id, &TripChanges::status(cancelled)).await?;
            info!("Trip {} cancelled on open: no passengers", trip_id);
            self.publish_status(&trip);
            return Ok(OpenOutcome::AutoCancelled { trip });
        }

        if !geo::is_valid_coordinate(latitude, longitude) {
            return Err(CoreError::validation("driver coordinates are out of range"));
        }
        let distance_from_start_m =
            geo::haversine_m(latitude, longitude, trip.start.latitude, trip.start.longitude);
        if distance_from_start_m > self.policy.open_radius_m {
            warn!("Driver {} is {:.0} m from the start of trip {}", driver_id, distance_from_start_m, trip_id);
            return Err(CoreError::OutOfRange {
                reference: "trip start",
                distance_m: distance_from_start_m,
                limit_m: self.policy.open_radius_m,
            });
        }

        let changes = TripChanges { status: Some(next), opened_at: Some(now), ..Default::default() };
        let trip = self.save(trip_id, &changes).await?;

        info!("Trip {} opened by driver {}", trip_id, driver_id);
        self.events.publish(RideEvent::TripOpened(TripOpenedEvent {
            trip_id,
            driver_id,
            distance_from_start_m,
            timestamp: now.timestamp(),
        }));

        Ok(OpenOutcome::Opened { trip, distance_from_start_m })
    }

    pub async fn start(&self, trip_id: Uuid, driver_id: Uuid) -> CoreResult<Trip> {
        let _guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;
        self.ensure_driver(&trip, driver_id, "start")?;

        if trip.status != TripStatus::Opened {
            return Err(CoreError::InvalidState(format!(
                "trip must be opened before it starts: {}",
                trip.status.blocking_reason()
            )));
        }
        let next = trip.status.transition_to(TripStatus::InProgress)?;
        let trip = self.save(trip_id, &TripChanges::status(next)).await?;

        info!("Trip {} started", trip_id);
        self.publish_status(&trip);
        Ok(trip)
    }

    pub async fn complete(
        &self,
        trip_id: Uuid,
        driver_id: Uuid,
        latitude: f64,
        longitude: f64,
    ) -> CoreResult<CompleteOutcome> {
        let guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;
        self.ensure_driver(&trip, driver_id, "complete")?;

        if trip.status != TripStatus::InProgress {
            return Err(CoreError::InvalidState(format!(
                "trip must be in progress to complete: {}",
                trip.status.blocking_reason()
            )));
        }
        if !geo::is_valid_coordinate(latitude, longitude) {
            return Err(CoreError::validation("driver coordinates are out of range"));
        }
        let distance_from_end_m = geo::haversine_m(latitude, longitude, trip.end.latitude, trip.end.longitude);
        if distance_from_end_m > self.policy.complete_radius_m {
            warn!("Driver {} is {:.0} m from the end of trip {}", driver_id, distance_from_end_m, trip_id);
            return Err(CoreError::OutOfRange {
                reference: "trip end",
                distance_m: distance_from_end_m,
                limit_m: self.policy.complete_radius_m,
            });
        }

        let factors = self.eco_settings.get_factors().await?;
        let eco = factors.accrue(trip.distance_km, trip.taken_seats);
        // The ledger ignores repeated credits for a trip, so it goes first
        self.ledger.credit_driver(trip.driver_id, trip_id, eco).await?;

        let next = trip.status.transition_to(TripStatus::Completed)?;
        let changes = TripChanges {
            status: Some(next),
            co2_saved_kg: Some(eco.co2_kg),
            trees_equivalent: Some(eco.trees),
            ..Default::default()
        };
        let trip = self.save(trip_id, &changes).await?;
        let earnings_cents = trip.earnings_cents();

        info!(
            "Trip {} completed: {} kg CO2 saved, {} cents earned",
            trip_id, eco.co2_kg, earnings_cents
        );
        self.events.publish(RideEvent::TripCompleted(TripCompletedEvent {
            trip_id,
            driver_id: trip.driver_id,
            co2_saved_kg: eco.co2_kg,
            trees_equivalent: eco.trees,
            earnings_cents,
            timestamp: self.clock.now().timestamp(),
        }));
        drop(guard);
        self.locks.forget(trip_id);

        Ok(CompleteOutcome { trip, distance_from_end_m, eco, earnings_cents })
    }

    pub async fn update(&self, trip_id: Uuid, actor: &Actor, update: TripUpdate) -> CoreResult<Trip> {
        let _guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;

        if !actor.can_manage(trip.driver_id) {
            return Err(CoreError::Unauthorized("only the driver can update this trip".into()));
        }
        if trip.status.is_terminal() {
            return Err(CoreError::InvalidState(format!(
                "trip can no longer be updated: {}",
                trip.status.blocking_reason()
            )));
        }
        if update.is_empty() {
            return Err(CoreError::NoOp);
        }

        let mut errors = Vec::new();
        let start = merge_location(&trip.start, &update.start_address, update.start_latitude, update.start_longitude);
        let end = merge_location(&trip.end, &update.end_address, update.end_latitude, update.end_longitude);
        for (label, location) in [("start", &start), ("end", &end)] {
            if let Some(location) = location {
                if location.address.trim().is_empty() {
                    errors.push(format!("{} address is required", label));
                }
                if !geo::is_valid_coordinate(location.latitude, location.longitude) {
                    errors.push(format!("{} coordinates are out of range", label));
                }
            }
        }
        if let Some(price) = update.price_per_seat_cents {
            if let Err(e) = validate_price(price) {
                errors.push(e);
            }
        }
        if let Some(total) = update.total_seats {
            if let Err(e) = validate_seats(total) {
                errors.push(e);
            }
        }
        if let Some(departure_at) = update.departure_at {
            if departure_at <= self.clock.now() {
                errors.push("departure must be in the future".to_string());
            }
        }
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }

        let mut changes = TripChanges {
            start,
            end,
            departure_at: update.departure_at,
            price_per_seat_cents: update.price_per_seat_cents,
            ..Default::default()
        };

        if let Some(total) = update.total_seats {
            let resized = SeatInventory::resize(&trip, total)?;
            changes.total_seats = resized.total_seats;
            changes.status = resized.status;
        }

        // A rescheduled pending trip leaves the lead window and reopens for booking
        if let Some(departure_at) = update.departure_at {
            if trip.status == TripStatus::PendingDeparture
                && !in_departure_lead(departure_at, self.clock.now())
            {
                let total = changes.total_seats.unwrap_or(trip.total_seats);
                let reopened = TripStatus::Available.for_occupancy(trip.taken_seats, total);
                changes.status = Some(trip.status.transition_to(reopened)?);
            }
        }

        if let Some(status) = update.status {
            if status != trip.status {
                // Opening, starting and completing have their own checks
                if !matches!(status, TripStatus::PendingDeparture | TripStatus::Cancelled) {
                    return Err(CoreError::InvalidState(format!(
                        "status {} cannot be set directly",
                        status
                    )));
                }
                changes.status = Some(trip.status.transition_to(status)?);
            }
        }

        let updated = self.save(trip_id, &changes).await?;
        info!("Trip {} updated by {}", trip_id, actor.user_id);
        if updated.status != trip.status {
            self.publish_status(&updated);
        }
        Ok(updated)
    }

    pub async fn delete(&self, trip_id: Uuid, actor: &Actor) -> CoreResult<()> {
        let guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;

        if !actor.can_manage(trip.driver_id) {
            return Err(CoreError::Unauthorized("only the driver can delete this trip".into()));
        }
        if trip.taken_seats > 0 && trip.status != TripStatus::Cancelled {
            return Err(CoreError::InvalidState("trip has passengers, cancel it first".into()));
        }

        if !self.trips.delete(trip_id).await? {
            return Err(CoreError::trip_not_found(trip_id));
        }
        drop(guard);
        self.locks.forget(trip_id);

        info!("Trip {} deleted by {}", trip_id, actor.user_id);
        Ok(())
    }

    pub async fn earnings(&self, trip_id: Uuid, actor: &Actor) -> CoreResult<Earnings> {
        let trip = self.load_trip(trip_id).await?;
        if !actor.can_manage(trip.driver_id) {
            return Err(CoreError::Unauthorized("only the driver can see earnings".into()));
        }
        if trip.status != TripStatus::Completed {
            return Err(CoreError::InvalidState(format!(
                "earnings are available once the trip is completed: {}",
                trip.status.blocking_reason()
            )));
        }

        Ok(Earnings {
            trip_id,
            taken_seats: trip.taken_seats,
            price_per_seat_cents: trip.price_per_seat_cents,
            earnings_cents: trip.earnings_cents(),
        })
    }
}
