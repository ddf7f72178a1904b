//! # Courier Core
//!
//! The request pipeline itself - no HTTP client, file system or platform
//! code.
//!
//! This crate contains:
//! - Port interfaces for the transport and the collaborators the pipeline
//!   drives (credentials, connectivity, persistent storage)
//! - Cache store, deduplicator, scheduler and retrier
//! - The [`Client`] facade and its interceptor chain
//!
//! ## Architecture Principles
//! - Depends on `courier-common` and `courier-domain` only
//! - All I/O goes through the traits in [`ports`]
//! - No global state: each [`Client`] owns its background tasks

pub mod auth;
pub mod cache;
pub mod client;
pub mod dedup;
pub mod ports;
pub mod retry;
pub mod scheduler;

// Re-export commonly used items
pub use auth::CredentialGate;
pub use cache::{CacheEntry, CacheStats, CacheStore, EntryOptions, Tiers};
pub use client::interceptor::{AuthInterceptor, Interceptor, Replay, TracingInterceptor};
pub use client::{Client, ClientBuilder};
pub use dedup::{Deduplicator, SharedResult};
pub use ports::{
    AlwaysOnline, ConnectivityOracle, CredentialProvider, PersistentStore, StoreError, Transport,
};
pub use retry::{NoopObserver, Retrier, RetryObserver};
pub use scheduler::{PipelineStats, PipelineStatus, RequestHandle, Scheduler};
