use std::time::Duration;

use async_trait::async_trait;
use courier_core::Transport;
use courier_domain::{HttpConfig, Method, PipelineError, RequestDescriptor, Response};
use reqwest::Client as ReqwestClient;
use tracing::debug;
use url::Url;

use crate::errors::from_reqwest;

/// [`Transport`] over a pooled `reqwest` client.
///
/// Sends exactly one request per call. Retries, timeouts per attempt and
/// status classification belong to the pipeline, so every response is
/// returned as-is whatever its status.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Start building a new transport.
    pub fn builder() -> ReqwestTransportBuilder {
        ReqwestTransportBuilder::default()
    }

    /// Transport configured from the `[http]` section.
    pub fn from_config(config: &HttpConfig) -> Result<Self, PipelineError> {
        Self::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()
    }

    fn to_reqwest(request: &RequestDescriptor) -> reqwest::Method {
        match request.method() {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, PipelineError> {
        let url = Url::parse(request.url()).map_err(|err| {
            PipelineError::validation(format!("invalid url '{}': {err}", request.url()))
                .with_cause(err)
        })?;

        let mut builder = self.client.request(Self::to_reqwest(request), url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.to_vec());
        }

        let method = request.method().as_http();
        debug!(request_id = %request.id(), method, url = request.url(), "sending HTTP request");

        let reply = builder.send().await.map_err(from_reqwest)?;
        let status = reply.status().as_u16();
        let headers: Vec<(String, String)> = reply
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value.to_str().ok().map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = reply.bytes().await.map_err(from_reqwest)?;

        debug!(request_id = %request.id(), method, status, bytes = body.len(), "received HTTP response");

        let mut response = Response::new(status).with_body(body.to_vec());
        for (name, value) in headers {
            response = response.with_header(name, value);
        }
        Ok(response)
    }
}

/// Builder for [`ReqwestTransport`].
#[derive(Debug)]
pub struct ReqwestTransportBuilder {
    timeout: Option<Duration>,
    connect_timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<reqwest::header::HeaderMap>,
}

impl Default for ReqwestTransportBuilder {
    fn default() -> Self {
        Self {
            timeout: None,
            connect_timeout: HttpConfig::default().connect_timeout,
            user_agent: None,
            default_headers: None,
        }
    }
}

impl ReqwestTransportBuilder {
    /// Hard ceiling on a single exchange. The pipeline applies its own
    /// per-attempt timeout, so this is unset by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<ReqwestTransport, PipelineError> {
        let mut builder = ReqwestClient::builder().connect_timeout(self.connect_timeout).no_proxy();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(from_reqwest)?;
        Ok(ReqwestTransport { client })
    }
}
