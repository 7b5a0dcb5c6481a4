//! Assertion helpers for tests.

use axum::http::StatusCode;
use pretty_assertions::assert_eq;

use super::app::TestResponse;

/// Assert response has expected status code
pub fn assert_status(response: &TestResponse, expected: StatusCode) {
    assert_eq!(
        response.status,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        response.status,
        response.text()
    );
}

/// Assert response is OK (200)
pub fn assert_ok(response: &TestResponse) {
    assert_status(response, StatusCode::OK);
}

/// Assert an error response with the JSON error envelope
pub fn assert_api_error(response: &TestResponse, expected: StatusCode) {
    assert_status(response, expected);

    let json: serde_json::Value = response.json();
    assert_eq!(
        json["status"].as_u64(),
        Some(expected.as_u16() as u64),
        "Expected JSON status {}, got {:?}",
        expected.as_u16(),
        json["status"]
    );
    assert!(
        json["error"].as_str().is_some_and(|e| !e.is_empty()),
        "Expected an error message, got {json}"
    );
}

/// Assert a palette response holds `k` well-formed colors
pub fn assert_palette(json: &serde_json::Value, k: usize) {
    let colors = json["colors"].as_array().expect("colors should be an array");
    assert_eq!(colors.len(), k, "Expected {k} colors, got {json}");

    for color in colors {
        let hex = color["hex"].as_str().expect("hex should be a string");
        assert_eq!(hex.len(), 7);
        assert!(hex.starts_with('#'));
        assert!(hex[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

        let rgb = color["rgb"].as_array().expect("rgb should be an array");
        assert_eq!(rgb.len(), 3);
        let expected = format!(
            "#{:02x}{:02x}{:02x}",
            rgb[0].as_u64().unwrap(),
            rgb[1].as_u64().unwrap(),
            rgb[2].as_u64().unwrap()
        );
        assert_eq!(hex, expected);
    }
}
