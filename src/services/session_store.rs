//! Per-user chat sessions.
//!
//! Each session owns its transcript and the model history sent to the chat
//! gateway. Sessions are created explicitly and looked up by id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use utoipa::ToSchema;

use super::chat_gateway::ChatTurn;
use crate::models::SessionConfig;

/// Shown when a stop arrives while the model is still thinking
pub const STOPPED_MESSAGE: &str = "HueBot was stopped";

/// Shown when the reveal of an answer was stopped
pub const INTERRUPTED_MESSAGE: &str =
    "You stopped HueBot's response. Please rephrase or ask something else!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("HueBot is already answering a question")]
    Busy,

    #[error("Question must not be empty")]
    EmptyQuestion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Pending,
    Complete(String),
    Interrupted(String),
}

/// One question and its answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: Answer,
}

/// How a generation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Complete(String),
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Pending,
    Complete,
    Interrupted,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExchangeView {
    pub question: String,
    pub status: AnswerStatus,
    /// Answer text, or the interruption notice
    pub answer: Option<String>,
}

impl From<&Exchange> for ExchangeView {
    fn from(exchange: &Exchange) -> Self {
        let (status, answer) = match &exchange.answer {
            Answer::Pending => (AnswerStatus::Pending, None),
            Answer::Complete(text) => (AnswerStatus::Complete, Some(text.clone())),
            Answer::Interrupted(text) => (AnswerStatus::Interrupted, Some(text.clone())),
        };
        Self {
            question: exchange.question.clone(),
            status,
            answer,
        }
    }
}

/// Session state as returned by the API
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    pub session_id: String,
    #[schema(value_type = String)]
    pub created_at: DateTime<Utc>,
    pub is_generating: bool,
    pub transcript: Vec<ExchangeView>,
}

struct SessionState {
    transcript: Vec<Exchange>,
    history: Vec<ChatTurn>,
    generating: bool,
    last_active: DateTime<Utc>,
}

/// One user's chat context
pub struct ChatSession {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    stop: Arc<AtomicBool>,
}

impl ChatSession {
    pub fn new(id: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: id.into(),
            created_at,
            state: Mutex::new(SessionState {
                transcript: Vec::new(),
                history: Vec::new(),
                generating: false,
                last_active: created_at,
            }),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Flag polled by the reveal of the current answer
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Start answering `question`.
    ///
    /// Returns the model history to send along with the question.
    pub async fn begin(&self, question: &str) -> Result<Vec<ChatTurn>, SessionError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(SessionError::EmptyQuestion);
        }

        let mut state = self.state.lock().await;
        if state.generating {
            return Err(SessionError::Busy);
        }

        state.generating = true;
        state.last_active = Utc::now();
        state.transcript.push(Exchange {
            question: question.to_string(),
            answer: Answer::Pending,
        });
        self.stop.store(false, Ordering::SeqCst);

        Ok(state.history.clone())
    }

    /// Remember the model's full answer to the current question
    pub async fn record_answer(&self, answer: &str) {
        let mut state = self.state.lock().await;
        let Some(question) = state.transcript.last().map(|e| e.question.clone()) else {
            return;
        };
        state.history.push(ChatTurn::user(question));
        state.history.push(ChatTurn::model(answer));
    }

    /// Drop the current question after the gateway failed
    pub async fn fail(&self) {
        let mut state = self.state.lock().await;
        if state.generating {
            state.transcript.pop();
            state.generating = false;
            state.last_active = Utc::now();
        }
    }

    /// Ask the current generation to stop. Returns whether one was running.
    pub async fn request_stop(&self) -> bool {
        self.stop.store(true, Ordering::SeqCst);

        let mut state = self.state.lock().await;
        if !state.generating {
            return false;
        }
        if let Some(exchange) = state.transcript.last_mut() {
            if exchange.answer == Answer::Pending {
                exchange.answer = Answer::Interrupted(STOPPED_MESSAGE.to_string());
            }
        }

        tracing::info!(session_id = %self.id, "Stop requested");
        true
    }

    /// Settle the current exchange and accept new questions again.
    ///
    /// Returns the text now stored for the exchange: the answer, or the
    /// interruption notice.
    pub async fn finish(&self, outcome: Outcome) -> Option<String> {
        let mut state = self.state.lock().await;
        state.generating = false;
        state.last_active = Utc::now();

        let exchange = state.transcript.last_mut()?;
        match outcome {
            Outcome::Complete(text) => exchange.answer = Answer::Complete(text.clone()),
            Outcome::Interrupted => {
                if !matches!(exchange.answer, Answer::Interrupted(_)) {
                    exchange.answer = Answer::Interrupted(INTERRUPTED_MESSAGE.to_string());
                }
            }
        }
        match &exchange.answer {
            Answer::Complete(text) | Answer::Interrupted(text) => Some(text.clone()),
            Answer::Pending => None,
        }
    }

    pub async fn is_generating(&self) -> bool {
        self.state.lock().await.generating
    }

    /// When the session last settled, or `None` while it is answering
    pub async fn idle_since(&self) -> Option<DateTime<Utc>> {
        let state = self.state.lock().await;
        (!state.generating).then_some(state.last_active)
    }

    pub async fn transcript(&self) -> Vec<Exchange> {
        self.state.lock().await.transcript.clone()
    }

    pub async fn history(&self) -> Vec<ChatTurn> {
        self.state.lock().await.history.clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let state = self.state.lock().await;
        SessionSnapshot {
            session_id: self.id.clone(),
            created_at: self.created_at,
            is_generating: state.generating,
            transcript: state.transcript.iter().map(ExchangeView::from).collect(),
        }
    }
}

/// Trait for chat session storage
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Create a session with a fresh id
    async fn create(&self) -> Arc<ChatSession>;

    async fn get(&self, id: &str) -> Option<Arc<ChatSession>>;

    /// Forget a session. Returns whether it existed.
    async fn remove(&self, id: &str) -> bool;
}

/// In-memory session storage.
///
/// Idle sessions past the timeout are evicted when a session is created,
/// then the longest idle ones while the store is full. Sessions that are
/// answering are never evicted.
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<ChatSession>>>>,
    max_sessions: usize,
    idle_timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            max_sessions: config.max_sessions.max(1),
            idle_timeout: config.idle_timeout(),
        }
    }

    async fn evict(&self, sessions: &mut HashMap<String, Arc<ChatSession>>) {
        let now = Utc::now();
        let mut idle = Vec::new();
        for (id, session) in sessions.iter() {
            if let Some(since) = session.idle_since().await {
                idle.push((since, id.clone()));
            }
        }
        idle.sort();

        let mut evicted = 0usize;
        for (since, id) in idle {
            let expired = (now - since)
                .to_std()
                .is_ok_and(|age| age >= self.idle_timeout);
            if !expired && sessions.len() < self.max_sessions {
                break;
            }
            sessions.remove(&id);
            evicted += 1;
        }

        if evicted > 0 {
            tracing::info!(evicted, remaining = sessions.len(), "Evicted idle sessions");
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionConfig::default())
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self) -> Arc<ChatSession> {
        let session = Arc::new(ChatSession::new(uuid::Uuid::new_v4().to_string()));
        let mut sessions = self.sessions.write().await;
        self.evict(&mut sessions).await;
        sessions.insert(session.id().to_string(), session.clone());
        drop(sessions);

        tracing::info!(session_id = %session.id(), "Session created");
        session
    }

    async fn get(&self, id: &str) -> Option<Arc<ChatSession>> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "Session removed");
        }
        removed
    }
}
