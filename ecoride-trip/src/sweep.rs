use chrono::{DateTime, Duration, Utc};
use ecoride_core::{CoreResult, TripChanges, TripStatus};
use serde::Serialize;
use tracing::{error, info};

use crate::lifecycle::TripLifecycleManager;

/// How long before departure a booked trip moves to pending departure.
pub const PENDING_DEPARTURE_LEAD: i64 = 30;

/// True while `now` falls in the lead window ending at departure.
pub(crate) fn in_departure_lead(departure_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    departure_at - Duration::minutes(PENDING_DEPARTURE_LEAD) <= now && now < departure_at
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub promoted: usize,
    pub cancelled: usize,
    pub failed: usize,
}

impl TripLifecycleManager {
    /// Moves bookable trips departing within the next half hour to
    /// `pending_departure`; empty ones are cancelled when the policy says so.
    pub async fn sweep_pending_departures(&self) -> CoreResult<SweepReport> {
        let now = self.clock.now();
        let candidates = self
            .trips
            .list_by_status(&[TripStatus::Available, TripStatus::Full])
            .await?;

        let mut report = SweepReport::default();
        for candidate in candidates {
            if !in_departure_lead(candidate.departure_at, now) {
                continue;
            }

            let _guard = self.locks.acquire(candidate.id).await;
            // Bookings or the departure may have changed since the listing
            let trip = match self.trips.get(candidate.id).await {
                Ok(Some(trip))
                    if matches!(trip.status, TripStatus::Available | TripStatus::Full)
                        && in_departure_lead(trip.departure_at, now) =>
                {
                    trip
                }
                Ok(_) => continue,
                Err(e) => {
                    error!("Sweep could not reload trip {}: {}", candidate.id, e);
                    report.failed += 1;
                    continue;
                }
            };

            let target = if trip.taken_seats > 0 {
                TripStatus::PendingDeparture
            } else if self.policy.cancel_empty_on_sweep {
                TripStatus::Cancelled
            } else {
                continue;
            };

            match self.trips.update_fields(trip.id, &TripChanges::status(target)).await {
                Ok(Some(updated)) => {
                    if target == TripStatus::Cancelled {
                        info!("Sweep cancelled empty trip {}", trip.id);
                        report.cancelled += 1;
                        self.publish_status(&updated);
                    } else {
                        info!("Trip {} is pending departure", trip.id);
                        report.promoted += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    error!("Sweep failed to update trip {}: {}", trip.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
