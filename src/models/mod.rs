pub mod color;
pub mod config;
pub mod feedback;

pub use color::{Color, ColorParseError};
pub use config::{AppConfig, ChatConfig, ExtractionConfig, RevealConfig, SessionConfig};
pub use feedback::{
    AppCategory, FeedbackError, FeedbackRecord, FeedbackSubmission, Section, StoredRow, ThemeName,
    COLUMNS, DATE_FORMAT, MAX_PREFERRED_COLORS,
};
