use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::Transport;
use courier_domain::{Method, PipelineError, RequestDescriptor, Response};
use parking_lot::Mutex;
use tokio::time::Instant;

/// Scripted outcome for one transport call.
#[derive(Debug, Clone)]
pub enum Reply {
    Respond(Response),
    Fail(PipelineError),
    /// Never completes.
    Hang,
}

impl Reply {
    pub fn status(status: u16) -> Self {
        Self::Respond(Response::new(status))
    }

    pub fn body(body: &str) -> Self {
        Self::Respond(Response::ok(body.to_string()))
    }
}

/// One observed transport call.
#[derive(Debug, Clone)]
pub struct Call {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub at: Instant,
}

impl Call {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// In-memory transport.
///
/// Replies are scripted per url and consumed in order; a url with no script
/// left answers `200` with the url as the body.
#[derive(Debug, Default)]
pub struct MockTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<Call>>,
    delay: Duration,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call takes `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    /// Append scripted replies for `url`.
    pub fn script(&self, url: &str, replies: impl IntoIterator<Item = Reply>) {
        self.scripts.lock().entry(url.to_string()).or_default().extend(replies);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.lock().iter().map(|call| call.url.clone()).collect()
    }

    pub fn call_count(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|call| call.url == url).count()
    }

    /// Gaps between consecutive calls to `url`.
    pub fn gaps(&self, url: &str) -> Vec<Duration> {
        let times: Vec<Instant> =
            self.calls.lock().iter().filter(|call| call.url == url).map(|call| call.at).collect();
        times.windows(2).map(|pair| pair[1] - pair[0]).collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &RequestDescriptor) -> Result<Response, PipelineError> {
        self.calls.lock().push(Call {
            method: request.method(),
            url: request.url().to_string(),
            headers: request.headers().to_vec(),
            at: Instant::now(),
        });

        let reply = self.scripts.lock().get_mut(request.url()).and_then(VecDeque::pop_front);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(error)) => Err(error),
            Some(Reply::Hang) => std::future::pending().await,
            None => Ok(Response::ok(request.url().to_string())),
        }
    }
}
