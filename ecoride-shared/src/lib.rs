pub mod models;
pub mod pii;

pub use models::RideEvent;
pub use pii::Masked;
