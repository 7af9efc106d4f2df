//! Value objects for the client domain

mod snowflake;

pub use snowflake::{Snowflake, SnowflakeParseError};
