//! API error shape

mod api_error;

pub use api_error::ApiError;
