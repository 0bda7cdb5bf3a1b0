use chrono::{DateTime, Utc};
use ecoride_shared::Masked;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

pub const MAX_REVIEW_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Counts against the trip's taken seats.
    pub fn holds_seats(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(CoreError::validation(format!("unknown booking status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub rating: u8,
    pub comment: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}

impl Review {
    pub fn new(rating: u8, comment: Option<String>, now: DateTime<Utc>) -> CoreResult<Self> {
        let mut errors = Vec::new();
        if !(1..=5).contains(&rating) {
            errors.push("rating must be between 1 and 5".to_string());
        }
        let comment = comment.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
        if let Some(c) = &comment {
            if c.chars().count() > MAX_REVIEW_COMMENT_CHARS {
                errors.push(format!(
                    "comment must be at most {} characters",
                    MAX_REVIEW_COMMENT_CHARS
                ));
            }
        }
        if !errors.is_empty() {
            return Err(CoreError::Validation(errors));
        }
        Ok(Self { rating, comment, reviewed_at: now })
    }
}

/// A passenger's seats on one trip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub trip_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_booked: u32,
    pub status: BookingStatus,
    pub validation_code: Masked<String>,
    pub code_used: bool,
    pub booking_date: DateTime<Utc>,
    pub total_price_cents: i64,
    pub review: Option<Review>,
}

impl Booking {
    pub fn confirmed(
        trip_id: Uuid,
        passenger_id: Uuid,
        seats_booked: u32,
        validation_code: String,
        total_price_cents: i64,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id,
            seats_booked,
            status: BookingStatus::Confirmed,
            validation_code: Masked(validation_code),
            code_used: false,
            booking_date: now,
            total_price_cents,
            review: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.holds_seats()
    }
}

/// Partial update persisted by the booking store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingChanges {
    pub status: Option<BookingStatus>,
    pub code_used: Option<bool>,
    pub review: Option<Review>,
}

impl BookingChanges {
    pub fn is_empty(&self) -> bool {
        self == &BookingChanges::default()
    }

    pub fn apply_to(&self, booking: &mut Booking) {
        if let Some(status) = self.status {
            booking.status = status;
        }
        if let Some(used) = self.code_used {
            booking.code_used = used;
        }
        if let Some(review) = &self.review {
            booking.review = Some(review.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_bounds() {
        let now = Utc::now();
        assert!(Review::new(5, Some("Great ride".into()), now).is_ok());
        assert!(Review::new(0, None, now).is_err());
        assert!(Review::new(6, None, now).is_err());

        let long = "x".repeat(MAX_REVIEW_COMMENT_CHARS + 1);
        assert!(Review::new(4, Some(long), now).is_err());

        let blank = Review::new(3, Some("   ".into()), now).unwrap();
        assert_eq!(blank.comment, None);
    }

    #[test]
    fn test_validation_code_is_masked_in_debug() {
        let booking = Booking::confirmed(Uuid::new_v4(), Uuid::new_v4(), 1, "SECRET42".into(), 1200, Utc::now());
        let debug = format!("{:?}", booking);
        assert!(!debug.contains("SECRET42"));
        assert_eq!(booking.validation_code.expose(), "SECRET42");
    }

    #[test]
    fn test_changes_apply() {
        let mut booking = Booking::confirmed(Uuid::new_v4(), Uuid::new_v4(), 2, "CODE".into(), 2400, Utc::now());
        BookingChanges { status: Some(BookingStatus::Cancelled), ..Default::default() }.apply_to(&mut booking);
        assert!(!booking.is_active());
        assert!(BookingChanges::default().is_empty());
    }
}
