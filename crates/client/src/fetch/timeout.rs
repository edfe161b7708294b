//! Deadline-bounded network calls.

use std::time::Duration;

use shelter_core::{Error, Request, Response};

use super::Network;

/// Issue `request` on `network`, failing with `Error::FetchTimeout` if it has
/// not settled within `timeout`.
///
/// On expiry the in-flight call is dropped, which aborts the underlying
/// transfer. Transport failures come back unchanged through the same error
/// channel.
pub async fn fetch_with_timeout(network: &dyn Network, request: &Request, timeout: Duration) -> Result<Response, Error> {
    match tokio::time::timeout(timeout, network.fetch(request)).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(url = %request.url, timeout_ms = timeout.as_millis() as u64, "network call timed out");
            Err(Error::FetchTimeout(format!("{} after {}ms", request.url, timeout.as_millis())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubNetwork;
    use tokio::time::Instant;
    use url::Url;

    fn request(url: &str) -> Request {
        Request::get(Url::parse(url).unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_settles_before_deadline() {
        let network = StubNetwork::new().respond_after("https://example.com/a", Duration::from_millis(500), 200, "ok");
        let start = Instant::now();

        let response = fetch_with_timeout(&network, &request("https://example.com/a"), Duration::from_millis(3000))
            .await
            .unwrap();

        assert_eq!(response.text(), "ok");
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_call_times_out_at_deadline() {
        let network = StubNetwork::new().hang("https://example.com/slow");
        let start = Instant::now();

        let err = fetch_with_timeout(&network, &request("https://example.com/slow"), Duration::from_millis(3000))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::FetchTimeout(_)));
        assert!(err.is_network_failure());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3000));
        assert!(elapsed < Duration::from_millis(3050));
    }

    #[tokio::test]
    async fn test_transport_failure_passes_through() {
        let network = StubNetwork::new().fail("https://example.com/down");

        let err = fetch_with_timeout(&network, &request("https://example.com/down"), Duration::from_millis(3000))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Network(_)));
    }
}
