//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::MockServer;

use huebot::models::{AppConfig, ChatConfig, RevealConfig};
use huebot::server::{build_router, create_app_state_with, AppState};
use huebot::services::{ChatGateway, GeminiGateway};

/// API key the mock Gemini server expects
pub const TEST_API_KEY: &str = "test-key";

/// Test application backed by a temporary engagement table and a mock
/// Gemini server
pub struct TestApp {
    router: axum::Router,
    pub state: AppState,
    pub gemini: MockServer,
    pub data_path: PathBuf,
    _dir: TempDir,
}

impl TestApp {
    /// Create a new test application with an API key configured
    pub async fn new() -> Self {
        Self::build(Some(TEST_API_KEY)).await
    }

    /// Create a test application whose gateway has no API key
    pub async fn without_api_key() -> Self {
        Self::build(None).await
    }

    async fn build(api_key: Option<&str>) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let data_path = dir.path().join("engagement_data.csv");
        let gemini = MockServer::start().await;

        let config = AppConfig {
            data_path: data_path.clone(),
            chat: ChatConfig {
                api_base: gemini.uri(),
                timeout_secs: 5,
                ..Default::default()
            },
            // Instant reveal keeps streams short
            reveal: RevealConfig {
                chunk_chars: 4,
                delay_ms: 0,
            },
            ..Default::default()
        };

        let gateway: Arc<dyn ChatGateway> = Arc::new(
            GeminiGateway::new(config.chat.clone(), api_key.map(str::to_string))
                .expect("Failed to create gateway"),
        );
        let state = create_app_state_with(config, gateway);
        let router = build_router(state.clone());

        Self {
            router,
            state,
            gemini,
            data_path,
            _dir: dir,
        }
    }

    /// Make a GET request to the given path
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a DELETE request to the given path
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Request::delete(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request without a body
    pub async fn post(&self, path: &str) -> TestResponse {
        self.request(Request::post(path).body(Body::empty()).unwrap())
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> TestResponse {
        let request = Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.request(request).await
    }

    /// Make a POST request with a multipart body carrying one file field
    pub async fn post_multipart(&self, path: &str, field: &str, file: &[u8]) -> TestResponse {
        let (content_type, body) = super::fixtures::multipart_body(field, file);
        let request = Request::post(path)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();
        self.request(request).await
    }

    /// Create a chat session and return its id
    pub async fn create_session(&self) -> String {
        let response = self.post("/api/sessions").await;
        assert_eq!(response.status, StatusCode::CREATED);

        let json: serde_json::Value = response.json();
        json["session_id"].as_str().unwrap().to_string()
    }

    /// Submit a feedback payload and return the response
    pub async fn submit_feedback(&self, body: &serde_json::Value) -> TestResponse {
        self.post_json("/api/feedback", body).await
    }

    /// Send a request to the router
    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Request failed");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        TestResponse {
            status,
            headers,
            body,
        }
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

impl SseEvent {
    /// Decode the JSON payload of a data line
    pub fn json_string(&self) -> String {
        serde_json::from_str(&self.data).expect("SSE data is not a JSON string")
    }
}

/// Test response with convenience methods
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> T {
        serde_json::from_slice(&self.body).expect("Failed to parse JSON response")
    }

    /// Get body as string
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Get a header value as string
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Parse body as an event stream, skipping comments
    pub fn sse_events(&self) -> Vec<SseEvent> {
        self.text()
            .split("\n\n")
            .filter_map(|block| {
                let mut event = None;
                let mut data = Vec::new();
                for line in block.lines() {
                    if let Some(name) = line.strip_prefix("event:") {
                        event = Some(name.trim().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
                    }
                }
                event.map(|event| SseEvent {
                    event,
                    data: data.join("\n"),
                })
            })
            .collect()
    }
}
