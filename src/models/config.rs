use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration loaded from config.yaml
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Engagement table (CSV) location
    pub data_path: PathBuf,

    /// Color extraction tuning
    pub extraction: ExtractionConfig,

    /// Hosted chat model settings
    pub chat: ChatConfig,

    /// Typing-effect settings for streamed answers
    pub reveal: RevealConfig,

    /// Chat session retention
    pub sessions: SessionConfig,
}

/// Configuration for dominant color extraction
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Side length of the square canvas images are resized to
    pub canvas_size: u32,

    /// Number of colors when the caller does not ask for a specific k
    pub default_k: usize,

    /// Upper bound on k-means iterations
    pub max_iterations: usize,

    /// Convergence threshold on the k-means score
    pub converge: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            canvas_size: 150,
            default_k: 5,
            max_iterations: 20,
            converge: 0.0025,
        }
    }
}

/// Configuration for the Gemini chat gateway
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash-lite".to_string(),
            temperature: 0.3,
            top_p: 0.95,
            top_k: 64,
            max_output_tokens: 2048,
            timeout_secs: 60,
        }
    }
}

/// Configuration for the chunked answer reveal
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RevealConfig {
    /// Characters per chunk
    pub chunk_chars: usize,

    /// Pause between chunks in milliseconds
    pub delay_ms: u64,
}

impl RevealConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RevealConfig {
    fn default() -> Self {
        Self {
            chunk_chars: 1,
            delay_ms: 15,
        }
    }
}

/// Limits on the in-memory chat sessions
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Most sessions kept at once; the longest idle ones are evicted first
    pub max_sessions: usize,

    /// Idle sessions older than this are evicted, in seconds
    pub idle_timeout_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            idle_timeout_secs: 3600,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("engagement_data.csv"),
            extraction: ExtractionConfig::default(),
            chat: ChatConfig::default(),
            reveal: RevealConfig::default(),
            sessions: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            tracing::info!("No config file configured, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(path) {
            Ok(content) => match serde_yaml::from_str::<Self>(&content) {
                Ok(config) => {
                    tracing::info!(
                        path = %path.display(),
                        data_path = %config.data_path.display(),
                        model = %config.chat.model,
                        "Loaded configuration"
                    );
                    config
                }
                Err(e) => {
                    tracing::warn!(%e, "Failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(%e, path = %path.display(), "Failed to read config, using defaults");
                Self::default()
            }
        }
    }

    /// Load from `CONFIG_FILE`, then apply the `DATA_FILE` override
    pub fn from_env() -> Self {
        let config_file = std::env::var("CONFIG_FILE").ok().map(PathBuf::from);
        let mut config = Self::load(config_file.as_deref());
        if let Ok(data_file) = std::env::var("DATA_FILE") {
            config.data_path = PathBuf::from(data_file);
        }
        config
    }
}
