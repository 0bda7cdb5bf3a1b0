pub mod actor;
pub mod booking;
pub mod clock;
pub mod eco;
pub mod geo;
pub mod promotion;
pub mod repository;
pub mod trip;

pub use actor::{Actor, Role};
pub use booking::{Booking, BookingChanges, BookingStatus, Review};
pub use clock::{Clock, FixedClock, SystemClock};
pub use eco::{EcoCredit, EcoFactors};
pub use promotion::{GeoBounds, Promotion, Subscription, TripAttributes};
pub use repository::StoreError;
pub use trip::{Location, NewTrip, Trip, TripChanges, TripFilters, TripStatus};

use std::fmt;
use uuid::Uuid;

/// Why a driver action fell outside its time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowViolation {
    TooEarly { minutes_remaining: i64 },
    TooLate,
}

impl fmt::Display for WindowViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowViolation::TooEarly { minutes_remaining } => write!(
                f,
                "too early, the trip can be opened in {} minute(s)",
                minutes_remaining
            ),
            WindowViolation::TooLate => write!(f, "too late, the opening window has closed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Outside time window: {0}")]
    OutOfWindow(WindowViolation),

    #[error("Out of range: {distance_m:.0} m from the {reference} (limit {limit_m:.0} m)")]
    OutOfRange {
        reference: &'static str,
        distance_m: f64,
        limit_m: f64,
    },

    #[error("Capacity exceeded: requested {requested}, available {available}")]
    CapacityExceeded { requested: u32, available: u32 },

    #[error("Passenger already holds a booking on trip {trip_id}")]
    DuplicateBooking { trip_id: Uuid },

    #[error("Validation code already used")]
    AlreadyUsed,

    #[error("Nothing to update")]
    NoOp,

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl CoreError {
    pub fn trip_not_found(id: Uuid) -> Self {
        CoreError::NotFound { entity: "Trip", id: id.to_string() }
    }

    pub fn booking_not_found(id: Uuid) -> Self {
        CoreError::NotFound { entity: "Booking", id: id.to_string() }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(vec![message.into()])
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
