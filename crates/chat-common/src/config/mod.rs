//! Configuration structs

mod client_config;

pub use client_config::{
    CacheConfig, ClientConfig, ConfigError, Environment, GatewayConfig, LimiterConfig, RestConfig,
};
