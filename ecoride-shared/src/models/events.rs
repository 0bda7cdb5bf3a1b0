use uuid::Uuid;

/// Events broadcast after a trip or booking changed state.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RideEvent {
    TripOpened(TripOpenedEvent),
    TripStarted(TripStatusEvent),
    TripCompleted(TripCompletedEvent),
    TripCancelled(TripStatusEvent),
    BookingConfirmed(BookingEvent),
    BookingCancelled(BookingEvent),
    CodeRedeemed(BookingEvent),
}

impl RideEvent {
    pub fn trip_id(&self) -> Uuid {
        match self {
            RideEvent::TripOpened(e) => e.trip_id,
            RideEvent::TripStarted(e) | RideEvent::TripCancelled(e) => e.trip_id,
            RideEvent::TripCompleted(e) => e.trip_id,
            RideEvent::BookingConfirmed(e)
            | RideEvent::BookingCancelled(e)
            | RideEvent::CodeRedeemed(e) => e.trip_id,
        }
    }

    /// Name used as the SSE event field.
    pub fn name(&self) -> &'static str {
        match self {
            RideEvent::TripOpened(_) => "trip_opened",
            RideEvent::TripStarted(_) => "trip_started",
            RideEvent::TripCompleted(_) => "trip_completed",
            RideEvent::TripCancelled(_) => "trip_cancelled",
            RideEvent::BookingConfirmed(_) => "booking_confirmed",
            RideEvent::BookingCancelled(_) => "booking_cancelled",
            RideEvent::CodeRedeemed(_) => "code_redeemed",
        }
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TripOpenedEvent {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub distance_from_start_m: f64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TripStatusEvent {
    pub trip_id: Uuid,
    pub status: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct TripCompletedEvent {
    pub trip_id: Uuid,
    pub driver_id: Uuid,
    pub co2_saved_kg: i64,
    pub trees_equivalent: i64,
    pub earnings_cents: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone, PartialEq)]
pub struct BookingEvent {
    pub booking_id: Uuid,
    pub trip_id: Uuid,
    pub seats: u32,
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged() {
        let event = RideEvent::BookingConfirmed(BookingEvent {
            booking_id: Uuid::new_v4(),
            trip_id: Uuid::new_v4(),
            seats: 2,
            timestamp: 0,
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "booking_confirmed");
        assert_eq!(json["seats"], 2);
        assert_eq!(event.name(), "booking_confirmed");
    }
}
