//! Synthesized terminal responses.

use shelter_core::Response;

/// JSON error payload for a bypassed request whose network call failed.
///
/// Status stays 200 so page scripts parse the body instead of treating the
/// call as a transport error.
pub fn offline_json(message: &str) -> Response {
    let body = serde_json::json!({ "result": "error", "msg": message }).to_string();
    Response::new(200, body).with_header("Content-Type", "application/json")
}

/// 503 plain-text response for a failed non-navigation request.
pub fn unavailable(message: &str) -> Response {
    Response::new(503, message.to_string()).with_header("Content-Type", "text/plain; charset=utf-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_json_shape() {
        let response = offline_json("You are offline.");
        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("application/json"));

        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["result"], "error");
        assert_eq!(body["msg"], "You are offline.");
    }

    #[test]
    fn test_offline_json_escapes_message() {
        let response = offline_json("say \"hi\"");
        let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(body["msg"], "say \"hi\"");
    }

    #[test]
    fn test_unavailable() {
        let response = unavailable("Offline or resource not found.");
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.text(), "Offline or resource not found.");
        assert!(response.content_type().unwrap().starts_with("text/plain"));
    }
}
