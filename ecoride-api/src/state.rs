use chrono::Duration;
use ecoride_booking::{BookingCoordinator, TripLocks};
use ecoride_catalog::{PriceQuoter, PricingConfig, PricingEngine};
use ecoride_core::repository::{
    BookingRepository, EcoLedger, EcoSettingsProvider, PromotionLookup, SubscriptionLookup, TripRepository,
};
use ecoride_core::{Clock, EcoFactors};
use ecoride_store::app_config::{LifecycleConfig, RateLimitConfig};
use ecoride_store::{
    Config, DbClient, EventPublisher, InMemoryStore, RedisClient, StoreBookingRepository, StoreReferenceRepository,
    StoreTripRepository,
};
use ecoride_trip::{LifecyclePolicy, TripLifecycleManager};
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

/// Storage adapters behind the domain traits.
#[derive(Clone)]
pub struct Stores {
    pub trips: Arc<dyn TripRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub subscriptions: Arc<dyn SubscriptionLookup>,
    pub promotions: Arc<dyn PromotionLookup>,
    pub eco_settings: Arc<dyn EcoSettingsProvider>,
    pub ledger: Arc<dyn EcoLedger>,
}

impl Stores {
    pub fn in_memory(store: Arc<InMemoryStore>) -> Self {
        Self {
            trips: store.clone(),
            bookings: store.clone(),
            subscriptions: store.clone(),
            promotions: store.clone(),
            eco_settings: store.clone(),
            ledger: store,
        }
    }

    pub fn postgres(db: &DbClient, default_factors: EcoFactors) -> Self {
        let pool = db.pool.clone();
        let reference = Arc::new(StoreReferenceRepository::new(pool.clone(), default_factors));
        Self {
            trips: Arc::new(StoreTripRepository::new(pool.clone())),
            bookings: Arc::new(StoreBookingRepository::new(pool)),
            subscriptions: reference.clone(),
            promotions: reference.clone(),
            eco_settings: reference.clone(),
            ledger: reference,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub trips: Arc<TripLifecycleManager>,
    pub bookings: Arc<BookingCoordinator>,
    pub events: EventPublisher,
    pub redis: Option<Arc<RedisClient>>,
    pub auth: AuthConfig,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(config: &Config, stores: Stores, clock: Arc<dyn Clock>, redis: Option<Arc<RedisClient>>) -> Self {
        let events = EventPublisher::default();
        // Booking and lifecycle changes on one trip share its lock
        let locks = TripLocks::new();

        let engine = PricingEngine::new(PricingConfig { service_fee_percent: config.pricing.service_fee_percent });
        let quoter = PriceQuoter::new(engine, stores.subscriptions.clone(), stores.promotions.clone());

        let bookings = BookingCoordinator::new(
            stores.trips.clone(),
            stores.bookings.clone(),
            quoter,
            locks.clone(),
            clock.clone(),
            events.clone(),
        );
        let trips = TripLifecycleManager::new(
            stores.trips,
            stores.bookings,
            locks,
            clock,
            stores.eco_settings,
            stores.ledger,
            events.clone(),
            lifecycle_policy(&config.lifecycle),
        );

        Self {
            trips: Arc::new(trips),
            bookings: Arc::new(bookings),
            events,
            redis,
            auth: AuthConfig {
                secret: config.auth.jwt_secret.clone(),
                expiration: config.auth.jwt_expiration_seconds,
            },
            rate_limit: config.rate_limit.clone(),
        }
    }
}

pub fn lifecycle_policy(cfg: &LifecycleConfig) -> LifecyclePolicy {
    LifecyclePolicy {
        open_radius_m: cfg.open_radius_m,
        complete_radius_m: cfg.complete_radius_m,
        open_window: Duration::minutes(cfg.open_window_minutes),
        cancel_empty_on_sweep: cfg.cancel_empty_on_sweep,
    }
}
