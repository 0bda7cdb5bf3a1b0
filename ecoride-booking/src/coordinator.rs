use chrono::{DateTime, Utc};
use ecoride_catalog::{PriceBreakdown, PriceQuoter};
use ecoride_core::repository::{BookingRepository, TripRepository};
use ecoride_core::{
    Actor, Booking, BookingChanges, BookingStatus, Clock, CoreError, CoreResult, Review, Trip, TripChanges,
    TripStatus,
};
use ecoride_shared::models::events::BookingEvent;
use ecoride_shared::RideEvent;
use ecoride_store::EventPublisher;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::inventory::{SeatInventory, TripLocks};
use crate::validation;

/// A confirmed booking with the price it was frozen at.
#[derive(Debug, Clone, Serialize)]
pub struct BookingReceipt {
    pub booking: Booking,
    pub price: PriceBreakdown,
}

/// Driver-facing view of who rides on a trip.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PassengerSeat {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_booked: u32,
    pub code_used: bool,
    pub booking_date: DateTime<Utc>,
}

/// Owns every seat-count mutation. All writes to a trip's seats go through the trip lock.
#[derive(Clone)]
pub struct BookingCoordinator {
    trips: Arc<dyn TripRepository>,
    bookings: Arc<dyn BookingRepository>,
    quoter: PriceQuoter,
    locks: TripLocks,
    clock: Arc<dyn Clock>,
    events: EventPublisher,
}

impl BookingCoordinator {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        bookings: Arc<dyn BookingRepository>,
        quoter: PriceQuoter,
        locks: TripLocks,
        clock: Arc<dyn Clock>,
        events: EventPublisher,
    ) -> Self {
        Self { trips, bookings, quoter, locks, clock, events }
    }

    async fn load_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.trips.get(trip_id).await?.ok_or_else(|| CoreError::trip_not_found(trip_id))
    }

    async fn load_booking(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get(booking_id)
            .await?
            .ok_or_else(|| CoreError::booking_not_found(booking_id))
    }

    fn booking_event(&self, booking: &Booking) -> BookingEvent {
        BookingEvent {
            booking_id: booking.id,
            trip_id: booking.trip_id,
            seats: booking.seats_booked,
            timestamp: self.clock.now().timestamp(),
        }
    }

    pub async fn create_booking(&self, trip_id: Uuid, passenger_id: Uuid, seats: u32) -> CoreResult<BookingReceipt> {
        let _guard = self.locks.acquire(trip_id).await;
        let trip = self.load_trip(trip_id).await?;

        if !trip.status.is_bookable() {
            return Err(CoreError::InvalidState(format!(
                "trip cannot be booked: {}",
                trip.status.blocking_reason()
            )));
        }
        if seats < 1 {
            return Err(CoreError::validation("at least one seat must be booked"));
        }
        if trip.driver_id == passenger_id {
            return Err(CoreError::validation("drivers cannot book their own trip"));
        }
        let seat_changes = SeatInventory::reserve(&trip, seats)?;

        let existing = self.bookings.list_by_trip(trip_id).await?;
        if existing.iter().any(|b| b.passenger_id == passenger_id && b.is_active()) {
            return Err(CoreError::DuplicateBooking { trip_id });
        }

        let price = self.quoter.quote(&trip, passenger_id, seats).await?;
        let code = validation::issue_unique_code(self.bookings.as_ref()).await?;
        let booking = Booking::confirmed(trip_id, passenger_id, seats, code, price.total_cents, self.clock.now());

        self.trips
            .update_fields(trip_id, &seat_changes)
            .await?
            .ok_or_else(|| CoreError::trip_not_found(trip_id))?;

        if let Err(e) = self.bookings.create(&booking).await {
            error!("Failed to persist booking for trip {}: {}", trip_id, e);
            // Give the seats back so taken_seats keeps matching the active bookings
            let restore = TripChanges {
                taken_seats: Some(trip.taken_seats),
                status: Some(trip.status),
                ..Default::default()
            };
            if let Err(rollback) = self.trips.update_fields(trip_id, &restore).await {
                error!("Failed to restore seats on trip {}: {}", trip_id, rollback);
            }
            return Err(CoreError::Storage(e));
        }

        info!(
            "Booking {} confirmed: {} seat(s) on trip {} for {} cents",
            booking.id, seats, trip_id, booking.total_price_cents
        );
        self.events.publish(RideEvent::BookingConfirmed(self.booking_event(&booking)));

        Ok(BookingReceipt { booking, price })
    }

    pub async fn cancel_booking(&self, booking_id: Uuid, actor: &Actor) -> CoreResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        if !actor.can_manage(booking.passenger_id) {
            return Err(CoreError::Unauthorized("only the passenger can cancel this booking".into()));
        }

        let _guard = self.locks.acquire(booking.trip_id).await;
        // Re-read under the lock: a concurrent cancel may have won
        let booking = self.load_booking(booking_id).await?;
        let trip = self.load_trip(booking.trip_id).await?;

        if !trip.status.before_opening() {
            return Err(CoreError::InvalidState(format!(
                "booking cannot be cancelled: {}",
                trip.status.blocking_reason()
            )));
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::InvalidState("booking is already cancelled".into()));
        }

        self.trips
            .update_fields(trip.id, &SeatInventory::release(&trip, booking.seats_booked))
            .await?;
        let cancelled = self
            .bookings
            .update_fields(
                booking_id,
                &BookingChanges { status: Some(BookingStatus::Cancelled), ..Default::default() },
            )
            .await?
            .ok_or_else(|| CoreError::booking_not_found(booking_id))?;

        info!("Booking {} cancelled, {} seat(s) released on trip {}", booking_id, booking.seats_booked, trip.id);
        self.events.publish(RideEvent::BookingCancelled(self.booking_event(&cancelled)));

        Ok(cancelled)
    }

    /// Marks a validation code as used. Works only once per code.
    pub async fn redeem_code(&self, code: &str) -> CoreResult<Booking> {
        let booking = self.find_by_code(code).await?;
        self.redeem(booking).await
    }

    /// Same as `redeem_code`, restricted to the trip's driver or an admin.
    pub async fn redeem_code_for_driver(&self, code: &str, actor: &Actor) -> CoreResult<Booking> {
        let booking = self.find_by_code(code).await?;
        let trip = self.load_trip(booking.trip_id).await?;
        if !actor.can_manage(trip.driver_id) {
            warn!("User {} tried to redeem a code on trip {} they do not drive", actor.user_id, trip.id);
            return Err(CoreError::Unauthorized("only the driver can validate passengers".into()));
        }
        self.redeem(booking).await
    }

    async fn find_by_code(&self, code: &str) -> CoreResult<Booking> {
        let code = validation::normalize_code(code);
        self.bookings
            .get_by_validation_code(&code)
            .await?
            .ok_or_else(|| CoreError::NotFound { entity: "Validation code", id: "********".into() })
    }

    async fn redeem(&self, booking: Booking) -> CoreResult<Booking> {
        let _guard = self.locks.acquire(booking.trip_id).await;
        let booking = self.load_booking(booking.id).await?;

        if booking.code_used {
            return Err(CoreError::AlreadyUsed);
        }
        if booking.status == BookingStatus::Cancelled {
            return Err(CoreError::InvalidState("booking is cancelled".into()));
        }
        let trip = self.load_trip(booking.trip_id).await?;
        if !trip.status.is_boardable() {
            return Err(CoreError::InvalidState(format!(
                "codes can only be validated once the trip is opened: {}",
                trip.status.blocking_reason()
            )));
        }

        let redeemed = self
            .bookings
            .update_fields(booking.id, &BookingChanges { code_used: Some(true), ..Default::default() })
            .await?
            .ok_or_else(|| CoreError::booking_not_found(booking.id))?;

        info!("Validation code of booking {} redeemed on trip {}", booking.id, trip.id);
        self.events.publish(RideEvent::CodeRedeemed(self.booking_event(&redeemed)));

        Ok(redeemed)
    }

    /// A passenger rates a completed trip once.
    pub async fn review(
        &self,
        booking_id: Uuid,
        actor: &Actor,
        rating: u8,
        comment: Option<String>,
    ) -> CoreResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        if actor.user_id != booking.passenger_id {
            return Err(CoreError::Unauthorized("only the passenger can review this trip".into()));
        }
        if booking.status != BookingStatus::Confirmed {
            return Err(CoreError::InvalidState(format!("booking is {}", booking.status)));
        }
        if booking.review.is_some() {
            return Err(CoreError::InvalidState("trip already reviewed".into()));
        }
        let trip = self.load_trip(booking.trip_id).await?;
        if trip.status != TripStatus::Completed {
            return Err(CoreError::InvalidState("only completed trips can be reviewed".into()));
        }

        let review = Review::new(rating, comment, self.clock.now())?;
        let reviewed = self
            .bookings
            .update_fields(booking_id, &BookingChanges { review: Some(review), ..Default::default() })
            .await?
            .ok_or_else(|| CoreError::booking_not_found(booking_id))?;

        info!("Booking {} reviewed with rating {}", booking_id, rating);
        Ok(reviewed)
    }

    pub async fn bookings_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list_by_passenger(passenger_id).await?)
    }

    pub async fn bookings_for_trip(&self, trip_id: Uuid, actor: &Actor) -> CoreResult<Vec<Booking>> {
        let trip = self.load_trip(trip_id).await?;
        if !actor.can_manage(trip.driver_id) {
            return Err(CoreError::Unauthorized("only the driver can list bookings of this trip".into()));
        }
        Ok(self.bookings.list_by_trip(trip_id).await?)
    }

    /// Confirmed bookings in booking order.
    pub async fn passengers_for_trip(&self, trip_id: Uuid, actor: &Actor) -> CoreResult<Vec<PassengerSeat>> {
        Ok(self
            .bookings_for_trip(trip_id, actor)
            .await?
            .into_iter()
            .filter(|b| b.status == BookingStatus::Confirmed)
            .map(|b| PassengerSeat {
                booking_id: b.id,
                passenger_id: b.passenger_id,
                seats_booked: b.seats_booked,
                code_used: b.code_used,
                booking_date: b.booking_date,
            })
            .collect())
    }

    pub fn quoter(&self) -> &PriceQuoter {
        &self.quoter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use ecoride_catalog::PricingEngine;
    use ecoride_core::{FixedClock, Location, NewTrip, Promotion, Subscription};
    use ecoride_store::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        coordinator: Arc<BookingCoordinator>,
        clock: Arc<FixedClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            NaiveDate::from_ymd_opt(2025, 5, 1).unwrap().and_hms_opt(8, 0, 0).unwrap().and_utc(),
        ));
        let quoter = PriceQuoter::new(PricingEngine::default(), store.clone(), store.clone());
        let coordinator = BookingCoordinator::new(
            store.clone(),
            store.clone(),
            quoter,
            TripLocks::new(),
            clock.clone(),
            EventPublisher::default(),
        );
        Fixture { store, coordinator: Arc::new(coordinator), clock }
    }

    async fn seed_trip(f: &Fixture, total_seats: u32, price_per_seat_cents: i64) -> Trip {
        let now = f.clock.now();
        let trip = Trip::new(
            Uuid::new_v4(),
            NewTrip {
                start: Location { address: "Paris".into(), latitude: 48.8566, longitude: 2.3522 },
                end: Location { address: "Lyon".into(), latitude: 45.7640, longitude: 4.8357 },
                departure_at: now + Duration::days(1),
                distance_km: Some(465.0),
                price_per_seat_cents,
                total_seats,
            },
            now,
        )
        .unwrap();
        TripRepository::create(f.store.as_ref(), &trip).await.unwrap();
        trip
    }

    async fn set_status(f: &Fixture, trip_id: Uuid, status: TripStatus) {
        TripRepository::update_fields(f.store.as_ref(), trip_id, &TripChanges::status(status))
            .await
            .unwrap();
    }

    async fn reload(f: &Fixture, trip_id: Uuid) -> Trip {
        TripRepository::get(f.store.as_ref(), trip_id).await.unwrap().unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_bookings_never_overbook() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = f.coordinator.clone();
            handles.push(tokio::spawn(async move {
                coordinator.create_booking(trip.id, Uuid::new_v4(), 1).await
            }));
        }

        let mut confirmed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => confirmed += 1,
                Err(CoreError::CapacityExceeded { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }

        assert_eq!(confirmed, 3);
        assert_eq!(rejected, 2);

        let trip = reload(&f, trip.id).await;
        assert_eq!(trip.taken_seats, 3);
        assert_eq!(trip.status, TripStatus::Full);

        let active: u32 = BookingRepository::list_by_trip(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .iter()
            .filter(|b| b.is_active())
            .map(|b| b.seats_booked)
            .sum();
        assert_eq!(active, trip.taken_seats);
    }

    #[tokio::test]
    async fn test_create_then_cancel_restores_trip() {
        let f = fixture();
        let trip = seed_trip(&f, 2, 2000).await;
        let passenger = Uuid::new_v4();

        let receipt = f.coordinator.create_booking(trip.id, passenger, 2).await.unwrap();
        assert_eq!(receipt.booking.status, BookingStatus::Confirmed);
        assert_eq!(reload(&f, trip.id).await.status, TripStatus::Full);

        let cancelled = f
            .coordinator
            .cancel_booking(receipt.booking.id, &Actor::user(passenger))
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        let trip = reload(&f, trip.id).await;
        assert_eq!(trip.taken_seats, 0);
        assert_eq!(trip.status, TripStatus::Available);

        // Second cancel is rejected, seats stay untouched
        let err = f
            .coordinator
            .cancel_booking(receipt.booking.id, &Actor::user(passenger))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert_eq!(reload(&f, trip.id).await.taken_seats, 0);
    }

    #[tokio::test]
    async fn test_create_rejections() {
        let f = fixture();
        let trip = seed_trip(&f, 2, 2000).await;
        let passenger = Uuid::new_v4();

        assert!(matches!(
            f.coordinator.create_booking(Uuid::new_v4(), passenger, 1).await,
            Err(CoreError::NotFound { .. })
        ));
        assert!(matches!(
            f.coordinator.create_booking(trip.id, passenger, 0).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            f.coordinator.create_booking(trip.id, trip.driver_id, 1).await,
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            f.coordinator.create_booking(trip.id, passenger, 3).await,
            Err(CoreError::CapacityExceeded { requested: 3, available: 2 })
        ));

        f.coordinator.create_booking(trip.id, passenger, 1).await.unwrap();
        assert!(matches!(
            f.coordinator.create_booking(trip.id, passenger, 1).await,
            Err(CoreError::DuplicateBooking { .. })
        ));

        set_status(&f, trip.id, TripStatus::PendingDeparture).await;
        assert!(matches!(
            f.coordinator.create_booking(trip.id, Uuid::new_v4(), 1).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_rebooking_after_cancel_is_allowed() {
        let f = fixture();
        let trip = seed_trip(&f, 2, 2000).await;
        let passenger = Uuid::new_v4();

        let first = f.coordinator.create_booking(trip.id, passenger, 1).await.unwrap();
        f.coordinator.cancel_booking(first.booking.id, &Actor::user(passenger)).await.unwrap();
        f.coordinator.create_booking(trip.id, passenger, 2).await.unwrap();

        assert_eq!(reload(&f, trip.id).await.taken_seats, 2);
    }

    #[tokio::test]
    async fn test_cancel_requires_owner_and_open_trip() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;
        let passenger = Uuid::new_v4();
        let receipt = f.coordinator.create_booking(trip.id, passenger, 1).await.unwrap();

        assert!(matches!(
            f.coordinator.cancel_booking(receipt.booking.id, &Actor::user(Uuid::new_v4())).await,
            Err(CoreError::Unauthorized(_))
        ));

        set_status(&f, trip.id, TripStatus::Opened).await;
        let err = f
            .coordinator
            .cancel_booking(receipt.booking.id, &Actor::admin(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already opened"));
    }

    #[tokio::test]
    async fn test_price_is_frozen_with_discounts() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 5000).await;
        let passenger = Uuid::new_v4();

        f.store
            .put_subscription(Subscription {
                id: Uuid::new_v4(),
                user_id: passenger,
                name: "Eco+".into(),
                reduction_percent: 20,
                tree_multiplier: 1.5,
            })
            .await;
        f.store
            .put_promotion(Promotion {
                id: Uuid::new_v4(),
                name: "May".into(),
                fee_discount_percent: 10,
                tree_multiplier: 2.0,
                valid_from: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
                valid_until: NaiveDate::from_ymd_opt(2025, 5, 31).unwrap(),
                region: None,
            })
            .await;

        let receipt = f.coordinator.create_booking(trip.id, passenger, 2).await.unwrap();
        assert_eq!(receipt.price.discounted_fee_cents, 700);
        assert_eq!(receipt.booking.total_price_cents, 9400);
        assert_eq!(receipt.price.savings_cents, 600);
    }

    #[tokio::test]
    async fn test_code_redeems_once() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;
        let receipt = f.coordinator.create_booking(trip.id, Uuid::new_v4(), 1).await.unwrap();
        let code = receipt.booking.validation_code.expose().clone();

        // Not yet opened
        assert!(matches!(f.coordinator.redeem_code(&code).await, Err(CoreError::InvalidState(_))));

        set_status(&f, trip.id, TripStatus::Opened).await;
        let redeemed = f.coordinator.redeem_code(&code.to_lowercase()).await.unwrap();
        assert!(redeemed.code_used);

        assert!(matches!(f.coordinator.redeem_code(&code).await, Err(CoreError::AlreadyUsed)));
        assert!(matches!(f.coordinator.redeem_code("NOPE2345").await, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeem_has_one_winner() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;
        let receipt = f.coordinator.create_booking(trip.id, Uuid::new_v4(), 1).await.unwrap();
        set_status(&f, trip.id, TripStatus::InProgress).await;
        let code = receipt.booking.validation_code.expose().clone();

        let a = {
            let c = f.coordinator.clone();
            let code = code.clone();
            tokio::spawn(async move { c.redeem_code(&code).await })
        };
        let b = {
            let c = f.coordinator.clone();
            tokio::spawn(async move { c.redeem_code(&code).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(CoreError::AlreadyUsed))));
    }

    #[tokio::test]
    async fn test_driver_redeem_checks_actor() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;
        let receipt = f.coordinator.create_booking(trip.id, Uuid::new_v4(), 1).await.unwrap();
        set_status(&f, trip.id, TripStatus::Opened).await;
        let code = receipt.booking.validation_code.expose().clone();

        assert!(matches!(
            f.coordinator.redeem_code_for_driver(&code, &Actor::user(Uuid::new_v4())).await,
            Err(CoreError::Unauthorized(_))
        ));
        f.coordinator
            .redeem_code_for_driver(&code, &Actor::user(trip.driver_id))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_review_only_after_completion_and_once() {
        let f = fixture();
        let trip = seed_trip(&f, 3, 2000).await;
        let passenger = Uuid::new_v4();
        let receipt = f.coordinator.create_booking(trip.id, passenger, 1).await.unwrap();
        let actor = Actor::user(passenger);

        assert!(matches!(
            f.coordinator.review(receipt.booking.id, &actor, 5, None).await,
            Err(CoreError::InvalidState(_))
        ));

        set_status(&f, trip.id, TripStatus::Completed).await;
        assert!(matches!(
            f.coordinator.review(receipt.booking.id, &Actor::user(Uuid::new_v4()), 5, None).await,
            Err(CoreError::Unauthorized(_))
        ));
        assert!(matches!(
            f.coordinator.review(receipt.booking.id, &actor, 7, None).await,
            Err(CoreError::Validation(_))
        ));

        let reviewed = f
            .coordinator
            .review(receipt.booking.id, &actor, 4, Some("Smooth drive".into()))
            .await
            .unwrap();
        assert_eq!(reviewed.review.as_ref().map(|r| r.rating), Some(4));

        assert!(matches!(
            f.coordinator.review(receipt.booking.id, &actor, 5, None).await,
            Err(CoreError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_passengers_view_lists_confirmed_in_order() {
        let f = fixture();
        let trip = seed_trip(&f, 4, 2000).await;
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let leaver = Uuid::new_v4();

        f.coordinator.create_booking(trip.id, first, 1).await.unwrap();
        f.clock.advance(Duration::minutes(5));
        let gone = f.coordinator.create_booking(trip.id, leaver, 1).await.unwrap();
        f.clock.advance(Duration::minutes(5));
        f.coordinator.create_booking(trip.id, second, 2).await.unwrap();
        f.coordinator.cancel_booking(gone.booking.id, &Actor::user(leaver)).await.unwrap();

        let driver = Actor::user(trip.driver_id);
        let passengers = f.coordinator.passengers_for_trip(trip.id, &driver).await.unwrap();
        assert_eq!(passengers.iter().map(|p| p.passenger_id).collect::<Vec<_>>(), vec![first, second]);

        assert!(matches!(
            f.coordinator.passengers_for_trip(trip.id, &Actor::user(first)).await,
            Err(CoreError::Unauthorized(_))
        ));
    }
}
