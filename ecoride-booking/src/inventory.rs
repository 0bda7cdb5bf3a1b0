use dashmap::DashMap;
use ecoride_core::{CoreError, CoreResult, Trip, TripChanges};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

/// One async mutex per trip. Seat counts and read-then-write status changes of a
/// trip happen while holding its guard; different trips never contend.
#[derive(Clone, Default)]
pub struct TripLocks {
    locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TripLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, trip_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(trip_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drops the entry of a deleted or terminal trip if nobody holds or waits on it.
    pub fn forget(&self, trip_id: Uuid) {
        self.locks.remove_if(&trip_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

/// Seat arithmetic on a trip. Produces the changes to persist; callers hold the trip lock.
pub struct SeatInventory;

impl SeatInventory {
    pub fn reserve(trip: &Trip, seats: u32) -> CoreResult<TripChanges> {
        let available = trip.free_seats();
        if seats > available {
            return Err(CoreError::CapacityExceeded { requested: seats, available });
        }

        let taken = trip.taken_seats + seats;
        Ok(TripChanges {
            taken_seats: Some(taken),
            status: Some(trip.status.for_occupancy(taken, trip.total_seats)),
            ..Default::default()
        })
    }

    pub fn release(trip: &Trip, seats: u32) -> TripChanges {
        let taken = trip.taken_seats.saturating_sub(seats);
        TripChanges {
            taken_seats: Some(taken),
            status: Some(trip.status.for_occupancy(taken, trip.total_seats)),
            ..Default::default()
        }
    }

    /// Capacity change requested by the driver.
    pub fn resize(trip: &Trip, total_seats: u32) -> CoreResult<TripChanges> {
        if total_seats < trip.taken_seats {
            return Err(CoreError::CapacityExceeded {
                requested: trip.taken_seats,
                available: total_seats,
            });
        }
        Ok(TripChanges {
            total_seats: Some(total_seats),
            status: Some(trip.status.for_occupancy(trip.taken_seats, total_seats)),
            ..Default::default()
        })
    }
}
