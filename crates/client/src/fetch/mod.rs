//! Network primitive used by the interceptor.
//!
//! [`Network`] is the seam: the dispatcher and installer only see the trait,
//! [`HttpNetwork`] is the reqwest-backed implementation used by the host
//! binary.
//!
//! ### Failure channel
//! - Transport errors (DNS, refused, reset) → `Error::Network`
//! - Body above `max_bytes` → `Error::FetchTooLarge`
//! - Non-2xx statuses are *responses*, not errors; callers decide
//!
//! Cancellation is by dropping the future, which is what
//! [`fetch_with_timeout`] does on expiry.

pub mod timeout;
pub mod url;

use bytes::Bytes;
use reqwest::Client;
use std::time::Instant;

pub use self::timeout::fetch_with_timeout;
pub use self::url::{UrlError, resolve};

use shelter_core::{AppConfig, Error, Method, Request, Response};

/// The network-call primitive.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    /// Issue `request` and return whatever response the peer produced.
    async fn fetch(&self, request: &Request) -> Result<Response, Error>;
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "shelter/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self { user_agent: "shelter/0.1".to_string(), max_bytes: 5 * 1024 * 1024, max_redirects: 5 }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), max_bytes: config.max_bytes, ..Self::default() }
    }
}

/// reqwest-backed [`Network`].
///
/// No client-level timeout is set; deadlines belong to the caller.
pub struct HttpNetwork {
    http: Client,
    config: FetchConfig,
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Patch => reqwest::Method::PATCH,
        Method::Options => reqwest::Method::OPTIONS,
    }
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(to_reqwest_method(request.method), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", request.url, e))
            } else {
                Error::Network(format!("{}: {}", request.url, e))
            }
        })?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes: Bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if bytes.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", bytes.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            "fetched {} {} -> {} in {}ms ({} bytes)",
            request.method,
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body: bytes,
            url: Some(final_url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::url::Url;
    use wiremock::matchers::{body_string, header as match_header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn network() -> HttpNetwork {
        HttpNetwork::new(FetchConfig::default()).unwrap()
    }

    #[test]
    fn test_fetch_config_default() {
        let config = FetchConfig::default();
        assert_eq!(config.user_agent, "shelter/0.1");
        assert_eq!(config.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_fetch_config_from_app_config() {
        let app = AppConfig { user_agent: "checksheet/2".into(), max_bytes: 1024, ..Default::default() };
        let config = FetchConfig::from(&app);
        assert_eq!(config.user_agent, "checksheet/2");
        assert_eq!(config.max_bytes, 1024);
    }

    #[tokio::test]
    async fn test_fetch_get() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.html"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("<html></html>", "text/html"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/index.html", server.uri())).unwrap();
        let response = network().fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.status_text, "OK");
        assert_eq!(response.text(), "<html></html>");
        assert_eq!(response.content_type(), Some("text/html"));
        assert!(response.url.is_some());
    }

    #[tokio::test]
    async fn test_fetch_non_success_is_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();
        let response = network().fetch(&Request::get(url)).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(!response.is_ok());
    }

    #[tokio::test]
    async fn test_fetch_post_forwards_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .and(match_header("x-sheet", "daily"))
            .and(body_string("{\"row\":1}"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"result\":\"success\"}"))
            .mount(&server)
            .await;

        let url = Url::parse(&format!("{}/exec", server.uri())).unwrap();
        let request = Request::get(url)
            .with_method(Method::Post)
            .with_header("x-sheet", "daily")
            .with_body("{\"row\":1}");
        let response = network().fetch(&request).await.unwrap();

        assert_eq!(response.text(), "{\"result\":\"success\"}");
    }

    #[tokio::test]
    async fn test_fetch_too_large() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/big"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 64]))
            .mount(&server)
            .await;

        let network = HttpNetwork::new(FetchConfig { max_bytes: 16, ..FetchConfig::default() }).unwrap();
        let url = Url::parse(&format!("{}/big", server.uri())).unwrap();
        let err = network.fetch(&Request::get(url)).await.unwrap_err();

        assert!(matches!(err, Error::FetchTooLarge(_)));
    }

    #[tokio::test]
    async fn test_fetch_connection_refused() {
        let url = Url::parse("http://127.0.0.1:9/unreachable").unwrap();
        let err = network().fetch(&Request::get(url)).await.unwrap_err();
        assert!(err.is_network_failure());
    }
}
