//! Shared helpers for `courier-infra` integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Client, ClientBuilder, CredentialProvider};
use courier_domain::{PipelineConfig, PipelineError, RetryPolicy, Token};
use courier_infra::ReqwestTransport;
use wiremock::MockServer;

/// Configuration pointed at `server` with short, jitter-free retries.
pub fn config_for(server: &MockServer) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.http.base_url = Some(server.uri());
    config.request.retry =
        RetryPolicy::exponential(2, Duration::from_millis(10), 2.0).with_jitter(0.0);
    config.request.timeout = Duration::from_secs(2);
    config
}

/// Builder over a real `reqwest` transport.
pub fn builder_for(server: &MockServer) -> ClientBuilder {
    let config = config_for(server);
    let transport = ReqwestTransport::from_config(&config.http).expect("transport should build");
    Client::builder(config).transport(Arc::new(transport))
}

/// Hands out `token-N`, where N counts refreshes.
#[derive(Debug, Default)]
pub struct CountingCredentials {
    refreshes: AtomicUsize,
}

impl CountingCredentials {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialProvider for CountingCredentials {
    async fn token(&self) -> Result<Option<Token>, PipelineError> {
        Ok(Some(Token::new(format!("token-{}", self.refreshes()))))
    }

    async fn refresh(&self) -> Result<Token, PipelineError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Token::new(format!("token-{n}")))
    }
}
