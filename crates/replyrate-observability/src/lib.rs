//! ReplyRate Observability
//!
//! This crate provides observability features:
//! - Structured logging setup
//! - Metrics collection (Prometheus)
//! - Health endpoints

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{BackendStatus, HealthState, Readiness, ReadinessChecker, health_router};
pub use logging::{build_env_filter, init_logging};
pub use metrics::Metrics;
