//! Integration tests for chat sessions and the streamed answers.

mod common;

use axum::http::StatusCode;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use common::fixtures::{gemini_answer, mock_answer, solid_png, GENERATE_PATH};
use common::{assert_api_error, assert_ok, assert_status, TestApp};
use huebot::services::SessionStore;

const ANSWER: &str = "Blue feels calm and trustworthy. Which audience is your app for?";

fn ask_path(id: &str) -> String {
    format!("/api/sessions/{id}/ask")
}

async fn mock_slow_answer(app: &TestApp, text: &str, delay: Duration) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gemini_answer(text))
                .set_delay(delay),
        )
        .mount(&app.gemini)
        .await;
}

#[tokio::test]
async fn test_create_and_get_session() {
    let app = TestApp::new().await;
    let id = app.create_session().await;

    let response = app.get(&format!("/api/sessions/{id}")).await;

    assert_ok(&response);
    let json: serde_json::Value = response.json();
    assert_eq!(json["session_id"], id.as_str());
    assert_eq!(json["is_generating"], false);
    assert_eq!(json["transcript"], json!([]));
}

#[tokio::test]
async fn test_sessions_have_distinct_ids() {
    let app = TestApp::new().await;
    let first = app.create_session().await;
    let second = app.create_session().await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_unknown_session() {
    let app = TestApp::new().await;

    let response = app.get("/api/sessions/does-not-exist").await;
    assert_api_error(&response, StatusCode::NOT_FOUND);

    let response = app
        .post_json(&ask_path("does-not-exist"), &json!({"question": "hi"}))
        .await;
    assert_api_error(&response, StatusCode::NOT_FOUND);

    let response = app.post("/api/sessions/does-not-exist/stop").await;
    assert_api_error(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_ask_streams_answer_then_done() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, ANSWER).await;
    let id = app.create_session().await;

    let response = app
        .post_json(&ask_path(&id), &json!({"question": "Is blue calming?"}))
        .await;

    assert_ok(&response);
    assert!(response
        .header("content-type")
        .is_some_and(|v| v.starts_with("text/event-stream")));

    let events = response.sse_events();
    let (last, chunks) = events.split_last().unwrap();
    assert!(chunks.iter().all(|e| e.event == "chunk"));
    assert!(chunks.len() > 1);

    let revealed: String = chunks.iter().map(|e| e.json_string()).collect();
    assert_eq!(revealed, ANSWER);
    assert_eq!(last.event, "done");
    assert_eq!(last.json_string(), ANSWER);
}

#[tokio::test]
async fn test_completed_answer_is_in_transcript() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, ANSWER).await;
    let id = app.create_session().await;

    app.post_json(&ask_path(&id), &json!({"question": "  Is blue calming? "}))
        .await;
    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();

    assert_eq!(json["is_generating"], false);
    assert_eq!(json["transcript"][0]["question"], "Is blue calming?");
    assert_eq!(json["transcript"][0]["status"], "complete");
    assert_eq!(json["transcript"][0]["answer"], ANSWER);
}

#[tokio::test]
async fn test_follow_up_sends_history() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, ANSWER).await;
    let id = app.create_session().await;

    app.post_json(&ask_path(&id), &json!({"question": "Is blue calming?"}))
        .await;
    app.post_json(&ask_path(&id), &json!({"question": "And for kids?"}))
        .await;

    let requests = app.gemini.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    let contents = body["contents"].as_array().unwrap();
    assert_eq!(contents.len(), 3);
    assert_eq!(contents[0]["role"], "user");
    assert_eq!(contents[0]["parts"][0]["text"], "Is blue calming?");
    assert_eq!(contents[1]["role"], "model");
    assert_eq!(contents[1]["parts"][0]["text"], ANSWER);
    assert_eq!(contents[2]["parts"][0]["text"], "And for kids?");
    assert!(body["systemInstruction"]["parts"][0]["text"]
        .as_str()
        .unwrap()
        .starts_with("You are HueBot"));
}

#[tokio::test]
async fn test_sessions_do_not_share_history() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, ANSWER).await;
    let first = app.create_session().await;
    let second = app.create_session().await;

    app.post_json(&ask_path(&first), &json!({"question": "Is blue calming?"}))
        .await;
    app.post_json(&ask_path(&second), &json!({"question": "Is red loud?"}))
        .await;

    let requests = app.gemini.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[1].body).unwrap();
    assert_eq!(body["contents"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_question_is_rejected() {
    let app = TestApp::new().await;
    let id = app.create_session().await;

    let response = app.post_json(&ask_path(&id), &json!({"question": "   "})).await;

    assert_api_error(&response, StatusCode::BAD_REQUEST);
    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(json["transcript"], json!([]));
}

#[tokio::test]
async fn test_missing_api_key_is_unavailable() {
    let app = TestApp::without_api_key().await;
    let id = app.create_session().await;

    let response = app.post_json(&ask_path(&id), &json!({"question": "hi"})).await;

    assert_api_error(&response, StatusCode::SERVICE_UNAVAILABLE);
    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(json["is_generating"], false);
    assert_eq!(json["transcript"], json!([]));
}

#[tokio::test]
async fn test_gateway_failure_is_bad_gateway() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": 500, "message": "backend exploded"}
        })))
        .mount(&app.gemini)
        .await;
    let id = app.create_session().await;

    let response = app.post_json(&ask_path(&id), &json!({"question": "hi"})).await;

    assert_api_error(&response, StatusCode::BAD_GATEWAY);
    let json: serde_json::Value = response.json();
    assert!(json["error"].as_str().unwrap().contains("backend exploded"));

    // the failed question is dropped and the session accepts new ones
    let session: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(session["transcript"], json!([]));
    assert_eq!(session["is_generating"], false);
}

#[tokio::test]
async fn test_stop_when_idle() {
    let app = TestApp::new().await;
    let id = app.create_session().await;

    let response = app.post(&format!("/api/sessions/{id}/stop")).await;

    assert_ok(&response);
    let json: serde_json::Value = response.json();
    assert_eq!(json["stopped"], false);
}

#[tokio::test]
async fn test_stop_while_thinking_interrupts_answer() {
    let app = TestApp::new().await;
    mock_slow_answer(&app, ANSWER, Duration::from_millis(500)).await;
    let id = app.create_session().await;

    let ask_path = ask_path(&id);
    let stop_path = format!("/api/sessions/{id}/stop");
    let ask_body = json!({"question": "Is blue calming?"});
    let ask = app.post_json(&ask_path, &ask_body);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        app.post(&stop_path).await
    };
    let (ask, stop) = tokio::join!(ask, stop);

    assert_ok(&stop);
    let stopped: serde_json::Value = stop.json();
    assert_eq!(stopped["stopped"], true);

    assert_ok(&ask);
    let events = ask.sse_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event, "interrupted");
    assert_eq!(events[0].json_string(), "HueBot was stopped");

    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(json["is_generating"], false);
    assert_eq!(json["transcript"][0]["status"], "interrupted");
    assert_eq!(json["transcript"][0]["answer"], "HueBot was stopped");

    // the model still remembers the full answer
    let session = app.state.sessions.get(&id).await.unwrap();
    let history = session.history().await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text, ANSWER);
}

#[tokio::test]
async fn test_client_leaving_while_thinking_settles_session() {
    let app = TestApp::new().await;
    mock_slow_answer(&app, ANSWER, Duration::from_millis(500)).await;
    let id = app.create_session().await;

    let path = ask_path(&id);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(100),
        app.post_json(&path, &json!({"question": "first"})),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(800)).await;

    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(json["is_generating"], false);
    assert_eq!(json["transcript"][0]["status"], "interrupted");

    let response = app.post_json(&path, &json!({"question": "second"})).await;
    assert_ok(&response);
    assert_eq!(response.sse_events().last().unwrap().event, "done");

    // both answers reached the model history
    let session = app.state.sessions.get(&id).await.unwrap();
    assert_eq!(session.history().await.len(), 4);
}

#[tokio::test]
async fn test_concurrent_question_is_busy() {
    let app = TestApp::new().await;
    mock_slow_answer(&app, ANSWER, Duration::from_millis(400)).await;
    let id = app.create_session().await;

    let path = ask_path(&id);
    let first_body = json!({"question": "first"});
    let first = app.post_json(&path, &first_body);
    let second = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        app.post_json(&path, &json!({"question": "second"})).await
    };
    let (first, second) = tokio::join!(first, second);

    assert_ok(&first);
    assert_api_error(&second, StatusCode::CONFLICT);

    let json: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(json["transcript"].as_array().unwrap().len(), 1);
    assert_eq!(json["transcript"][0]["status"], "complete");
}

#[tokio::test]
async fn test_new_question_after_stop() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, ANSWER).await;
    let id = app.create_session().await;

    app.post(&format!("/api/sessions/{id}/stop")).await;
    let response = app.post_json(&ask_path(&id), &json!({"question": "hi"})).await;

    let events = response.sse_events();
    assert_eq!(events.last().unwrap().event, "done");
}

#[tokio::test]
async fn test_delete_session() {
    let app = TestApp::new().await;
    let id = app.create_session().await;

    let response = app.delete(&format!("/api/sessions/{id}")).await;
    assert_status(&response, StatusCode::NO_CONTENT);

    let response = app.get(&format!("/api/sessions/{id}")).await;
    assert_api_error(&response, StatusCode::NOT_FOUND);

    let response = app.delete(&format!("/api/sessions/{id}")).await;
    assert_api_error(&response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_session_analyze_returns_advice() {
    let app = TestApp::new().await;
    mock_answer(&app.gemini, "Cyan reads as fresh and techy.").await;
    let id = app.create_session().await;
    let image = solid_png(24, 24, [0, 247, 255]);

    let response = app
        .post_multipart(&format!("/api/sessions/{id}/analyze?k=2"), "image", &image)
        .await;

    assert_ok(&response);
    let json: serde_json::Value = response.json();
    assert_eq!(json["colors"].as_array().unwrap().len(), 2);
    assert_eq!(json["advice"], "Cyan reads as fresh and techy.");
    assert_eq!(json["interrupted"], false);
    let prompt = json["prompt"].as_str().unwrap().to_string();

    let requests = app.gemini.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["contents"][0]["parts"][0]["text"], prompt.as_str());

    let session: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(session["transcript"][0]["question"], prompt.as_str());
    assert_eq!(session["transcript"][0]["status"], "complete");
}

#[tokio::test]
async fn test_session_analyze_stopped_while_thinking() {
    let app = TestApp::new().await;
    mock_slow_answer(&app, "Cyan reads as fresh.", Duration::from_millis(600)).await;
    let id = app.create_session().await;
    let image = solid_png(24, 24, [0, 247, 255]);

    let analyze_path = format!("/api/sessions/{id}/analyze?k=2");
    let stop_path = format!("/api/sessions/{id}/stop");
    let analyze = app.post_multipart(&analyze_path, "image", &image);
    let stop = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        app.post(&stop_path).await
    };
    let (analyze, stop) = tokio::join!(analyze, stop);

    let stopped: serde_json::Value = stop.json();
    assert_eq!(stopped["stopped"], true);

    assert_ok(&analyze);
    let json: serde_json::Value = analyze.json();
    assert_eq!(json["interrupted"], true);
    assert_eq!(json["advice"], "HueBot was stopped");

    let session: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(session["is_generating"], false);
    assert_eq!(session["transcript"][0]["status"], "interrupted");
    assert_eq!(session["transcript"][0]["answer"], "HueBot was stopped");
}

#[tokio::test]
async fn test_session_analyze_client_leaving_settles_session() {
    let app = TestApp::new().await;
    mock_slow_answer(&app, "Cyan reads as fresh.", Duration::from_millis(500)).await;
    let id = app.create_session().await;
    let image = solid_png(24, 24, [0, 247, 255]);

    let analyze_path = format!("/api/sessions/{id}/analyze?k=2");
    let abandoned = tokio::time::timeout(
        Duration::from_millis(200),
        app.post_multipart(&analyze_path, "image", &image),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(700)).await;

    let session: serde_json::Value = app.get(&format!("/api/sessions/{id}")).await.json();
    assert_eq!(session["is_generating"], false);
    assert_eq!(session["transcript"][0]["status"], "complete");
    assert_eq!(session["transcript"][0]["answer"], "Cyan reads as fresh.");
}

#[tokio::test]
async fn test_session_analyze_gateway_failure() {
    let app = TestApp::new().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&app.gemini)
        .await;
    let id = app.create_session().await;
    let image = solid_png(24, 24, [0, 247, 255]);

    let response = app
        .post_multipart(&format!("/api/sessions/{id}/analyze"), "image", &image)
        .await;

    assert_api_error(&response, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_session_analyze_bad_image_skips_model() {
    let app = TestApp::new().await;
    let id = app.create_session().await;

    let response = app
        .post_multipart(&format!("/api/sessions/{id}/analyze"), "image", b"nope")
        .await;

    assert_api_error(&response, StatusCode::BAD_REQUEST);
    assert!(app.gemini.received_requests().await.unwrap().is_empty());
}
