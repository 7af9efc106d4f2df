//! # chat-common
//!
//! Shared utilities for the client SDK: configuration and telemetry.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{
    CacheConfig, ClientConfig, ConfigError, Environment, GatewayConfig, LimiterConfig, RestConfig,
};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
