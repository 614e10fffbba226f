// SPDX-License-Identifier: MPL-2.0

use crate::net::{Response, ResponseSource, StatusCode};

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
    <title>Offline</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
    <div class="offline-container">
        <h1>You're Offline</h1>
        <p>You are currently offline. Some features may not be available. Please check your internet connection.</p>
        <p>Cached content will be displayed when available.</p>
    </div>
</body>
</html>
"#;

/// Placeholder returned when neither the network nor a cache can answer
pub fn offline_response() -> Response {
    Response::new(StatusCode::SERVICE_UNAVAILABLE, OFFLINE_PAGE)
        .with_header("content-type", "text/html")
        .with_source(ResponseSource::Offline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response_is_503_html() {
        let response = offline_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.source(), ResponseSource::Offline);
        assert_eq!(response.header("Content-Type"), Some("text/html"));
        assert!(response.text().contains("You're Offline"));
    }
}
