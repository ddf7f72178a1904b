//! Common utility helpers
//!
//! - **[`serde`]**: serialization helpers for durations in config and cache
//!   records

pub mod serde;

pub use self::serde::{duration_millis, option_duration_millis};
