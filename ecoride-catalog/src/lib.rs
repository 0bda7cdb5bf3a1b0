pub mod estimate;
pub mod pricing;

pub use estimate::{estimate, TripEstimate};
pub use pricing::{AppliedPromotion, PriceBreakdown, PriceQuoter, PricingConfig, PricingEngine};
