//! # Courier Infrastructure
//!
//! Infrastructure implementations of the pipeline's ports.
//!
//! This crate contains:
//! - The `reqwest` transport
//! - File-backed and in-memory persistent cache stores
//! - A host-driven connectivity oracle
//! - Configuration loading and logging setup
//!
//! ## Architecture
//! - Implements traits defined in `courier-core`
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod connectivity;
pub mod errors;
pub mod http;
pub mod observability;
pub mod storage;

// Re-export commonly used items
pub use connectivity::ManualConnectivity;
pub use http::{ReqwestTransport, ReqwestTransportBuilder};
pub use observability::{init_logging, LogFormat, LoggingConfig};
pub use storage::{FileStore, MemoryStore};
