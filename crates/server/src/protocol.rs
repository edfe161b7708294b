//! Newline-delimited JSON events and replies.
//!
//! ```text
//! → {"id":1,"event":"install"}
//! → {"id":2,"event":"fetch","url":"index.html","mode":"navigate"}
//! ← {"id":1,"ok":true,"result":{...}}
//! ← {"id":2,"ok":true,"result":{"source":"cache","status":200,...}}
//! ```
//!
//! `id` is optional and echoed verbatim. Fetch replies may arrive out of order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shelter_client::{Resolution, Source};
use shelter_core::{Method, Request, RequestMode};
use url::Url;

use crate::error::{ErrorBody, ProtocolError};

/// One incoming line.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub event: Event,
}

impl Envelope {
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(line).map_err(|e| ProtocolError::InvalidInput(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Event {
    Install,
    Activate,
    Status,
    Fetch(FetchParams),
}

/// Parameters of a `fetch` event. Method names are upper-case (`"POST"`).
#[derive(Debug, Deserialize)]
pub struct FetchParams {
    pub url: String,
    #[serde(default)]
    pub method: Method,
    #[serde(default)]
    pub mode: RequestMode,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl FetchParams {
    /// Build the intercepted request, resolving relative URLs against `origin`.
    pub fn into_request(self, origin: &Url) -> Result<Request, ProtocolError> {
        let url = shelter_client::fetch::resolve(origin, &self.url)
            .map_err(|e| ProtocolError::InvalidUrl(format!("{}: {e}", self.url)))?;

        let mut request = Request::get(url).with_method(self.method);
        request.mode = self.mode;
        request.headers = self.headers.into_iter().collect();
        if let Some(body) = self.body {
            request = request.with_body(body);
        }
        Ok(request)
    }
}

/// Fetch result as written back to the caller.
#[derive(Debug, Serialize)]
pub struct FetchReply {
    pub source: Source,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8 (lossy).
    pub body: String,
    pub body_len: usize,
}

impl From<Resolution> for FetchReply {
    fn from(resolution: Resolution) -> Self {
        let response = resolution.response;
        Self {
            source: resolution.source,
            status: response.status,
            status_text: response.status_text.clone(),
            body: response.text(),
            body_len: response.body.len(),
            headers: response.headers,
        }
    }
}

/// One outgoing line.
#[derive(Debug, Serialize)]
pub struct Reply {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl Reply {
    pub fn success(id: Option<Value>, result: impl Serialize) -> Self {
        match serde_json::to_value(result) {
            Ok(value) => Self { id, ok: true, result: Some(value), error: None },
            Err(e) => Self::failure(id, ProtocolError::InvalidInput(format!("failed to serialize result: {e}"))),
        }
    }

    pub fn failure(id: Option<Value>, error: impl Into<ErrorBody>) -> Self {
        Self { id, ok: false, result: None, error: Some(error.into()) }
    }
}
