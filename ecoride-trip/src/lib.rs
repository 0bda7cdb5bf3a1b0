pub mod classify;
pub mod lifecycle;
pub mod search;
pub mod sweep;

pub use classify::{categorize, TripCategory, TripRole, UserTripEntry, UserTrips};
pub use lifecycle::{
    CompleteOutcome, Earnings, LifecyclePolicy, OpenOutcome, TripLifecycleManager, TripUpdate,
};
pub use search::TripSearch;
pub use sweep::SweepReport;
