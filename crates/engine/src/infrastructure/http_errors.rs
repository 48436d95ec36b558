//! Classification of HTTP failures into transient and terminal.

use reqwest::StatusCode;

/// Longest slice of a response body carried into an error message.
const MAX_ERROR_BODY: usize = 200;

/// 408, 429 and 5xx are worth another attempt; other non-success codes are not.
pub fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
}

/// Connection failures and timeouts are transient; malformed requests are not.
pub fn is_transient_send_error(error: &reqwest::Error) -> bool {
    !error.is_builder() && !error.is_redirect()
}

/// `HTTP <code>: <body prefix>`
pub fn status_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return format!("HTTP {}", status.as_u16());
    }
    let mut prefix: String = body.chars().take(MAX_ERROR_BODY).collect();
    if prefix.len() < body.len() {
        prefix.push_str("...");
    }
    format!("HTTP {}: {}", status.as_u16(), prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_statuses() {
        for code in [408, 429, 500, 502, 503] {
            assert!(is_transient_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
        for code in [400, 401, 403, 404, 422] {
            assert!(!is_transient_status(StatusCode::from_u16(code).unwrap()), "{code}");
        }
    }

    #[test]
    fn status_message_truncates_long_bodies() {
        let message = status_message(StatusCode::BAD_REQUEST, &"x".repeat(500));
        assert!(message.starts_with("HTTP 400: "));
        assert!(message.ends_with("..."));
        assert_eq!(status_message(StatusCode::BAD_GATEWAY, "  "), "HTTP 502");
    }
}
