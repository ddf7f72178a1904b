use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, PipelineError};

/// Settled transport response.
///
/// Non-2xx responses are still `Response`s at the transport boundary; the
/// retrier classifies them. Bodies are kept as raw bytes and serialized as
/// base64 when a response is written to the persistent cache tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    status: u16,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default, with = "base64_body")]
    body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self { status, headers: Vec::new(), body: Vec::new() }
    }

    /// 200 response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::new(200).with_body(body)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str, PipelineError> {
        std::str::from_utf8(&self.body).map_err(|e| {
            PipelineError::new(ErrorKind::Validation, "response body is not valid UTF-8")
                .with_cause(e)
        })
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, PipelineError> {
        serde_json::from_slice(&self.body).map_err(|e| {
            PipelineError::new(ErrorKind::Validation, format!("invalid JSON response body: {e}"))
                .with_cause(e)
        })
    }
}

mod base64_body {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let response = Response::new(429).with_header("retry-after", "3");
        assert_eq!(response.header("Retry-After"), Some("3"));
        assert_eq!(response.header("X-Missing"), None);
        assert!(!response.is_success());
    }

    #[test]
    fn test_json_body() {
        #[derive(Debug, Deserialize)]
        struct Lesson {
            id: u32,
        }

        let response = Response::ok(r#"{"id": 7}"#);
        assert_eq!(response.json::<Lesson>().unwrap().id, 7);

        let err = Response::ok("nope").json::<Lesson>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_body_is_base64_in_json() {
        let response = Response::ok(vec![0xff, 0x00]);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["body"], "/wA=");
        let back: Response = serde_json::from_value(json).unwrap();
        assert_eq!(back.body(), &[0xff, 0x00]);
    }
}
