//! Chat session endpoints.
//!
//! Answers are streamed to the client as server-sent events. The model call
//! itself completes before the first chunk is sent; the stream only paces
//! the display.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::Stream;
use serde::{Deserialize, Serialize};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use utoipa::ToSchema;

use super::analysis::{extract_palette, ColorInfo, ImageUpload, PaletteQuery};
use crate::error::ApiError;
use crate::server::AppState;
use crate::services::{
    reveal, ChatGateway, ChatSession, ChatTurn, Outcome, RevealEvent, RevealOptions,
    SessionSnapshot, SessionStore,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateSessionResponse {
    pub session_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopResponse {
    /// Whether a generation was running
    pub stopped: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionAnalysisResponse {
    pub colors: Vec<ColorInfo>,
    pub prompt: String,
    /// HueBot's analysis of the palette, or the notice when it was stopped
    pub advice: String,
    /// Whether the session was stopped before the analysis arrived
    pub interrupted: bool,
}

async fn find_session(state: &AppState, id: &str) -> Result<Arc<ChatSession>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound)
}

/// Ask the gateway on behalf of a session that has already begun a question
async fn ask_gateway(
    state: &AppState,
    session: &ChatSession,
    history: &[ChatTurn],
    prompt: &str,
) -> Result<String, ApiError> {
    match state.gateway.send_message(history, prompt).await {
        Ok(answer) => {
            session.record_answer(&answer).await;
            Ok(answer)
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id(), error = %e, "Chat request failed");
            session.fail().await;
            Err(e.into())
        }
    }
}

type AnswerStream = mpsc::Receiver<Result<Event, axum::Error>>;

/// Answer `question` and reveal it on a task of its own.
///
/// The reply carries the gateway error, or the receiving end of the event
/// stream once the model has answered. The session is settled even if the
/// client goes away while the model is working or mid-stream.
fn spawn_answer(
    state: AppState,
    session: Arc<ChatSession>,
    history: Vec<ChatTurn>,
    question: String,
) -> oneshot::Receiver<Result<AnswerStream, ApiError>> {
    let (reply, receiver) = oneshot::channel();

    tokio::spawn(async move {
        let answer = match ask_gateway(&state, &session, &history, &question).await {
            Ok(answer) => answer,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let (tx, rx) = mpsc::channel(64);
        if reply.send(Ok(rx)).is_err() {
            tracing::debug!(session_id = %session.id(), "Client left while the model was answering");
        }
        let options = RevealOptions::from(&state.config.reveal);
        reveal_to(session, answer, options, tx).await;
    });

    receiver
}

/// Send the reveal of `answer` as SSE events and settle the session
async fn reveal_to(
    session: Arc<ChatSession>,
    answer: String,
    options: RevealOptions,
    tx: mpsc::Sender<Result<Event, axum::Error>>,
) {
    let mut events = Box::pin(reveal(answer, options, session.stop_flag()));

    let (outcome, terminal) = loop {
        match events.next().await {
            Some(RevealEvent::Chunk(text)) => {
                let event = Event::default().event("chunk").json_data(text);
                if tx.send(event).await.is_err() {
                    tracing::debug!(session_id = %session.id(), "Client left during reveal");
                    break (Outcome::Interrupted, None);
                }
            }
            Some(RevealEvent::Finished(full)) => break (Outcome::Complete(full), Some("done")),
            Some(RevealEvent::Interrupted { .. }) | None => {
                break (Outcome::Interrupted, Some("interrupted"))
            }
        }
    };

    let completed = matches!(outcome, Outcome::Complete(_));
    let stored = session.finish(outcome).await.unwrap_or_default();
    if let Some(name) = terminal {
        let _ = tx.send(Event::default().event(name).json_data(stored)).await;
    }
    tracing::info!(session_id = %session.id(), completed, "Answer settled");
}

/// Answer a palette prompt and settle the session.
///
/// A stop that arrived while the model was working wins over the answer.
async fn answer_palette(
    state: AppState,
    session: Arc<ChatSession>,
    history: Vec<ChatTurn>,
    prompt: String,
) -> Result<(String, bool), ApiError> {
    let advice = ask_gateway(&state, &session, &history, &prompt).await?;

    let interrupted = session.stop_flag().load(Ordering::SeqCst);
    let outcome = if interrupted {
        Outcome::Interrupted
    } else {
        Outcome::Complete(advice)
    };
    let stored = session.finish(outcome).await.unwrap_or_default();
    Ok((stored, interrupted))
}

/// Start a new chat session
#[utoipa::path(
    post,
    path = "/api/sessions",
    responses(
        (status = 201, description = "Session created", body = CreateSessionResponse),
    ),
    tag = "Chat"
)]
pub async fn handle_create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = state.sessions.create().await;
    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id().to_string(),
        }),
    )
}

/// Transcript and status of a session
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session state", body = SessionSnapshot),
        (status = 404, description = "Unknown session"),
    ),
    tag = "Chat"
)]
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &id).await?;
    Ok(Json(session.snapshot().await))
}

/// Discard a session and its history
#[utoipa::path(
    delete,
    path = "/api/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 204, description = "Session removed"),
        (status = 404, description = "Unknown session"),
    ),
    tag = "Chat"
)]
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if let Some(session) = state.sessions.get(&id).await {
        session.request_stop().await;
    }
    if state.sessions.remove(&id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::SessionNotFound)
    }
}

/// Ask HueBot a question
///
/// Streams `chunk` events with JSON-encoded text pieces, then either `done`
/// with the full answer or `interrupted` with the notice stored for the
/// exchange.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/ask",
    params(("id" = String, Path, description = "Session id")),
    request_body = AskRequest,
    responses(
        (status = 200, description = "Event stream of `chunk` events ending in `done` or `interrupted`"),
        (status = 400, description = "Empty question"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "A question is already being answered"),
        (status = 502, description = "Chat model request failed"),
        (status = 503, description = "Chat model not configured"),
    ),
    tag = "Chat"
)]
pub async fn handle_ask(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let session = find_session(&state, &id).await?;
    let history = session.begin(&request.question).await?;

    tracing::info!(
        session_id = %session.id(),
        history = history.len(),
        "Question received"
    );

    let question = request.question.trim().to_string();
    let events = spawn_answer(state, session, history, question)
        .await
        .map_err(|_| ApiError::Internal("Answer task ended unexpectedly".to_string()))??;

    Ok(Sse::new(ReceiverStream::new(events)).keep_alive(KeepAlive::default()))
}

/// Stop the answer currently being produced
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/stop",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Stop requested", body = StopResponse),
        (status = 404, description = "Unknown session"),
    ),
    tag = "Chat"
)]
pub async fn handle_stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    let stopped = session.request_stop().await;
    Ok(Json(StopResponse { stopped }))
}

/// Extract a palette and ask HueBot to analyze it within a session
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/analyze",
    params(
        ("id" = String, Path, description = "Session id"),
        PaletteQuery,
    ),
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Palette analyzed", body = SessionAnalysisResponse),
        (status = 400, description = "Missing or undecodable image, or invalid k"),
        (status = 404, description = "Unknown session"),
        (status = 409, description = "A question is already being answered"),
        (status = 502, description = "Chat model request failed"),
        (status = 503, description = "Chat model not configured"),
    ),
    tag = "Chat"
)]
pub async fn handle_session_analyze(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<PaletteQuery>,
    multipart: Multipart,
) -> Result<Json<SessionAnalysisResponse>, ApiError> {
    let session = find_session(&state, &id).await?;
    let (colors, prompt) = extract_palette(&state, &query, multipart).await?;

    let history = session.begin(&prompt).await?;
    let (advice, interrupted) =
        tokio::spawn(answer_palette(state, session, history, prompt.clone()))
            .await
            .map_err(|e| ApiError::Internal(format!("Analysis task failed: {e}")))??;

    Ok(Json(SessionAnalysisResponse {
        colors: colors.into_iter().map(ColorInfo::from).collect(),
        prompt,
        advice,
        interrupted,
    }))
}
