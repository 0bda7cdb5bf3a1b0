pub mod events;

pub use events::RideEvent;
