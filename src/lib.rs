pub mod config;
#[cfg(feature = "db")]
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod rate_limiter;
pub mod server;
pub mod storage;

// Actions and the ports they depend on
pub mod app;
// Adapters from HTTP requests and the limiter onto those ports
pub mod infra;
