use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ecoride_core::repository::{
    BookingRepository, EcoLedger, EcoSettingsProvider, PromotionLookup, SubscriptionLookup, TripRepository,
};
use ecoride_core::{
    Booking, BookingChanges, EcoCredit, EcoFactors, Promotion, StoreError, Subscription, Trip, TripAttributes,
    TripChanges, TripFilters, TripStatus,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory adapter for every storage trait. Used by tests and database-less runs.
#[derive(Default)]
pub struct InMemoryStore {
    trips: RwLock<HashMap<Uuid, Trip>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    subscriptions: RwLock<HashMap<Uuid, Subscription>>,
    promotions: RwLock<Vec<Promotion>>,
    eco_factors: RwLock<EcoFactors>,
    eco_credits: RwLock<HashMap<Uuid, (Uuid, EcoCredit)>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_eco_factors(factors: EcoFactors) -> Self {
        Self { eco_factors: RwLock::new(factors), ..Self::default() }
    }

    pub async fn put_subscription(&self, subscription: Subscription) {
        self.subscriptions.write().await.insert(subscription.user_id, subscription);
    }

    pub async fn put_promotion(&self, promotion: Promotion) {
        self.promotions.write().await.push(promotion);
    }

    /// Total credited to a driver across completed trips.
    pub async fn driver_credit(&self, driver_id: Uuid) -> EcoCredit {
        self.eco_credits
            .read()
            .await
            .values()
            .filter(|(driver, _)| *driver == driver_id)
            .fold(EcoCredit::default(), |acc, (_, c)| EcoCredit {
                co2_kg: acc.co2_kg + c.co2_kg,
                trees: acc.trees + c.trees,
            })
    }
}

#[async_trait]
impl TripRepository for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError> {
        Ok(self.trips.read().await.get(&id).cloned())
    }

    async fn create(&self, trip: &Trip) -> Result<(), StoreError> {
        let mut trips = self.trips.write().await;
        if trips.contains_key(&trip.id) {
            return Err(format!("trip {} already exists", trip.id).into());
        }
        trips.insert(trip.id, trip.clone());
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, changes: &TripChanges) -> Result<Option<Trip>, StoreError> {
        let mut trips = self.trips.write().await;
        Ok(trips.get_mut(&id).map(|trip| {
            changes.apply_to(trip);
            trip.clone()
        }))
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let removed = self.trips.write().await.remove(&id).is_some();
        if removed {
            self.bookings.write().await.retain(|_, b| b.trip_id != id);
        }
        Ok(removed)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.departure_at.cmp(&a.departure_at));
        Ok(trips)
    }

    async fn list_available(&self, filters: &TripFilters, after: DateTime<Utc>) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| t.status == TripStatus::Available && t.free_seats() > 0 && t.departure_at > after)
            .filter(|t| {
                let date = t.departure_at.date_naive();
                filters.departure_from.map_or(true, |from| date >= from)
                    && filters.departure_to.map_or(true, |to| date <= to)
            })
            .cloned()
            .collect();
        trips.sort_by(|a, b| a.departure_at.cmp(&b.departure_at));
        Ok(trips)
    }

    async fn list_by_status(&self, statuses: &[TripStatus]) -> Result<Vec<Trip>, StoreError> {
        let mut trips: Vec<Trip> = self
            .trips
            .read()
            .await
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect();
        trips.sort_by(|a, b| a.departure_at.cmp(&b.departure_at));
        Ok(trips)
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn get_by_validation_code(&self, code: &str) -> Result<Option<Booking>, StoreError> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| b.validation_code.expose() == code)
            .cloned())
    }

    async fn create(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.write().await;
        if bookings.values().any(|b| b.validation_code == booking.validation_code) {
            return Err("validation code collision".into());
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn update_fields(&self, id: Uuid, changes: &BookingChanges) -> Result<Option<Booking>, StoreError> {
        let mut bookings = self.bookings.write().await;
        Ok(bookings.get_mut(&id).map(|booking| {
            changes.apply_to(booking);
            booking.clone()
        }))
    }

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.passenger_id == passenger_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.booking_date.cmp(&a.booking_date));
        Ok(bookings)
    }

    async fn list_by_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.trip_id == trip_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.booking_date.cmp(&b.booking_date));
        Ok(bookings)
    }
}

#[async_trait]
impl SubscriptionLookup for InMemoryStore {
    async fn get_active_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, StoreError> {
        Ok(self.subscriptions.read().await.get(&user_id).cloned())
    }
}

#[async_trait]
impl PromotionLookup for InMemoryStore {
    async fn list_eligible(&self, trip: &TripAttributes) -> Result<Vec<Promotion>, StoreError> {
        Ok(self
            .promotions
            .read()
            .await
            .iter()
            .filter(|p| p.applies_to(trip))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl EcoSettingsProvider for InMemoryStore {
    async fn get_factors(&self) -> Result<EcoFactors, StoreError> {
        Ok(*self.eco_factors.read().await)
    }
}

#[async_trait]
impl EcoLedger for InMemoryStore {
    async fn credit_driver(&self, driver_id: Uuid, trip_id: Uuid, credit: EcoCredit) -> Result<(), StoreError> {
        self.eco_credits.write().await.entry(trip_id).or_insert((driver_id, credit));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ecoride_core::{Location, NewTrip};

    fn trip(driver_id: Uuid, departure_at: DateTime<Utc>) -> Trip {
        let now = departure_at - Duration::days(2);
        Trip::new(
            driver_id,
            NewTrip {
                start: Location { address: "Nantes".into(), latitude: 47.2184, longitude: -1.5536 },
                end: Location { address: "Rennes".into(), latitude: 48.1173, longitude: -1.6778 },
                departure_at,
                distance_km: Some(110.0),
                price_per_seat_cents: 900,
                total_seats: 2,
            },
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_update_fields_returns_updated_trip() {
        let store = InMemoryStore::new();
        let trip = trip(Uuid::new_v4(), Utc::now() + Duration::days(1));
        TripRepository::create(&store, &trip).await.unwrap();

        let updated = TripRepository::update_fields(&store, trip.id, &TripChanges::status(TripStatus::Cancelled))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, TripStatus::Cancelled);

        let missing = TripRepository::update_fields(&store, Uuid::new_v4(), &TripChanges::default())
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_list_available_filters_date_and_status() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        let soon = trip(Uuid::new_v4(), now + Duration::days(1));
        let later = trip(Uuid::new_v4(), now + Duration::days(10));
        let mut full = trip(Uuid::new_v4(), now + Duration::days(1));
        full.taken_seats = 2;
        full.status = TripStatus::Full;

        for t in [&soon, &later, &full] {
            TripRepository::create(&store, t).await.unwrap();
        }

        let all = store.list_available(&TripFilters::default(), now).await.unwrap();
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![soon.id, later.id]);

        let filters = TripFilters { departure_from: None, departure_to: Some((now + Duration::days(2)).date_naive()) };
        let filtered = store.list_available(&filters, now).await.unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, soon.id);
    }

    #[tokio::test]
    async fn test_eco_credit_is_recorded_once_per_trip() {
        let store = InMemoryStore::new();
        let driver = Uuid::new_v4();
        let trip_id = Uuid::new_v4();
        let credit = EcoCredit { co2_kg: 30, trees: 2 };

        store.credit_driver(driver, trip_id, credit).await.unwrap();
        store.credit_driver(driver, trip_id, credit).await.unwrap();

        assert_eq!(store.driver_credit(driver).await, credit);
    }
}
