pub mod auth;
pub mod rate_limit;

pub use auth::{issue_token, require_auth, Claims};
pub use rate_limit::rate_limit;
