pub mod coordinator;
pub mod inventory;
pub mod validation;

pub use coordinator::{BookingCoordinator, BookingReceipt, PassengerSeat};
pub use inventory::{SeatInventory, TripLocks};
