pub mod rate_limiter_adapter;
pub mod session_adapter;

pub use rate_limiter_adapter::RateLimiterAdapter;
pub use session_adapter::{RequestSession, USER_ID_HEADER};
