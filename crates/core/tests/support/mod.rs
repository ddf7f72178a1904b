//! Shared test helpers for `courier-core` integration tests.
//!
//! The mocks here stand in for the collaborators the pipeline drives so the
//! tests can focus on scheduling, caching and retry behaviour.

#![allow(dead_code)]

pub mod collaborators;
pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use courier_core::{Client, ClientBuilder};
use courier_domain::{PipelineConfig, RetryPolicy};

pub use self::collaborators::{MapStore, StaticCredentials, ToggleConnectivity};
pub use self::transport::{MockTransport, Reply};

/// Configuration with fast, jitter-free retries.
pub fn test_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.request.retry =
        RetryPolicy::exponential(3, Duration::from_millis(100), 2.0).with_jitter(0.0);
    config.request.timeout = Duration::from_secs(5);
    config
}

/// Builder preloaded with the given transport.
pub fn builder(config: PipelineConfig, transport: &Arc<MockTransport>) -> ClientBuilder {
    Client::builder(config).transport(transport.clone())
}

/// Client over `transport` with [`test_config`].
pub fn client(transport: &Arc<MockTransport>) -> Client {
    builder(test_config(), transport).build().expect("client should build")
}
