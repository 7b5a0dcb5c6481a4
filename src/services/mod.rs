pub mod chat_gateway;
pub mod color_extractor;
pub mod feedback_aggregator;
pub mod feedback_store;
pub mod prompt;
pub mod reveal;
pub mod session_store;

pub use chat_gateway::{ChatError, ChatGateway, ChatTurn, GeminiGateway, Role};
pub use color_extractor::ColorExtractor;
pub use feedback_aggregator::{ChartData, FeedbackFilter, FeedbackSummary, FilterOptions};
pub use feedback_store::{CsvFeedbackStore, FeedbackStore};
pub use reveal::{reveal, RevealEvent, RevealOptions};
pub use session_store::{
    ChatSession, InMemorySessionStore, Outcome, SessionError, SessionSnapshot, SessionStore,
};
