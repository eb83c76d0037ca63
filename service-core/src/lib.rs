//! service-core: shared HTTP service infrastructure (config, errors,
//! request ids, tracing setup).
pub mod config;
pub mod error;
pub mod middleware;
pub mod observability;

pub use axum;
pub use tracing;
