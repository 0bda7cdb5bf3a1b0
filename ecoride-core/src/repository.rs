use async_trait::async_trait;
use uuid::Uuid;

use crate::booking::{Booking, BookingChanges};
use crate::eco::{EcoCredit, EcoFactors};
use crate::promotion::{Promotion, Subscription, TripAttributes};
use crate::trip::{Trip, TripChanges, TripFilters, TripStatus};

/// Opaque infrastructure error surfaced by storage adapters
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Repository trait for trip data access
#[async_trait]
pub trait TripRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Trip>, StoreError>;

    async fn create(&self, trip: &Trip) -> Result<(), StoreError>;

    /// Applies the changes and returns the updated trip, `None` when it does not exist.
    async fn update_fields(&self, id: Uuid, changes: &TripChanges) -> Result<Option<Trip>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError>;

    async fn list_by_driver(&self, driver_id: Uuid) -> Result<Vec<Trip>, StoreError>;

    /// Bookable trips with free seats departing after `after`, ordered by departure.
    async fn list_available(
        &self,
        filters: &TripFilters,
        after: chrono::DateTime<chrono::Utc>,
    ) -> Result<Vec<Trip>, StoreError>;

    async fn list_by_status(&self, statuses: &[TripStatus]) -> Result<Vec<Trip>, StoreError>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn get_by_validation_code(&self, code: &str) -> Result<Option<Booking>, StoreError>;

    async fn create(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn update_fields(&self, id: Uuid, changes: &BookingChanges) -> Result<Option<Booking>, StoreError>;

    async fn list_by_passenger(&self, passenger_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// Ordered by booking date.
    async fn list_by_trip(&self, trip_id: Uuid) -> Result<Vec<Booking>, StoreError>;
}

#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    async fn get_active_for_user(&self, user_id: Uuid) -> Result<Option<Subscription>, StoreError>;
}

#[async_trait]
pub trait PromotionLookup: Send + Sync {
    async fn list_eligible(&self, trip: &TripAttributes) -> Result<Vec<Promotion>, StoreError>;
}

#[async_trait]
pub trait EcoSettingsProvider: Send + Sync {
    async fn get_factors(&self) -> Result<EcoFactors, StoreError>;
}

/// Receives the eco accrual of a completed trip.
#[async_trait]
pub trait EcoLedger: Send + Sync {
    async fn credit_driver(&self, driver_id: Uuid, trip_id: Uuid, credit: EcoCredit) -> Result<(), StoreError>;
}
