//! # Courier Domain
//!
//! Data types shared by every layer of the request pipeline.
//!
//! This crate contains:
//! - Request descriptors, options and responses
//! - The closed pipeline error taxonomy
//! - Pipeline configuration structures and defaults
//!
//! ## Architecture
//! - Depends only on `courier-common` (foundation tier) and external crates
//! - No I/O and no async runtime

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;
