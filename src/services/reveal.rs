//! Typing effect for chat answers.
//!
//! The answer is already complete when the reveal starts. Stopping a reveal
//! hides the rest of the text from the user; it cannot abort the remote
//! request, which has finished by then.

use futures_util::stream::{self, Stream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::models::RevealConfig;

/// Pacing of a reveal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealOptions {
    /// Characters per chunk, at least 1
    pub chunk_chars: usize,
    /// Pause between chunks
    pub delay: Duration,
}

impl From<&RevealConfig> for RevealOptions {
    fn from(config: &RevealConfig) -> Self {
        Self {
            chunk_chars: config.chunk_chars,
            delay: config.delay(),
        }
    }
}

impl Default for RevealOptions {
    fn default() -> Self {
        Self::from(&RevealConfig::default())
    }
}

/// Items produced by [`reveal`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    /// Next piece of the answer
    Chunk(String),
    /// Every chunk was shown; carries the full text
    Finished(String),
    /// The stop flag was raised; carries what had been shown
    Interrupted { shown: String },
}

impl RevealEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RevealEvent::Chunk(_))
    }
}

struct RevealState {
    chars: Vec<char>,
    shown: usize,
    options: RevealOptions,
    stop: Arc<AtomicBool>,
}

/// Yield `text` in chunks, checking `stop` before every chunk.
///
/// The stream always ends with exactly one terminal event. A stop raised
/// after the last chunk still finishes.
pub fn reveal(
    text: String,
    options: RevealOptions,
    stop: Arc<AtomicBool>,
) -> impl Stream<Item = RevealEvent> + Send + 'static {
    let state = RevealState {
        chars: text.chars().collect(),
        shown: 0,
        options: RevealOptions {
            chunk_chars: options.chunk_chars.max(1),
            ..options
        },
        stop,
    };

    stream::unfold(Some(state), |state| async move {
        let mut state = state?;
        let total = state.chars.len();

        if state.shown > 0 && state.shown < total && !state.options.delay.is_zero() {
            tokio::time::sleep(state.options.delay).await;
        }

        if state.shown >= total {
            let full = state.chars.iter().collect();
            return Some((RevealEvent::Finished(full), None));
        }

        if state.stop.load(Ordering::SeqCst) {
            let shown = state.chars[..state.shown].iter().collect();
            return Some((RevealEvent::Interrupted { shown }, None));
        }

        let end = (state.shown + state.options.chunk_chars).min(total);
        let chunk = state.chars[state.shown..end].iter().collect();
        state.shown = end;
        Some((RevealEvent::Chunk(chunk), Some(state)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    fn instant(chunk_chars: usize) -> RevealOptions {
        RevealOptions {
            chunk_chars,
            delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_reveals_every_character_then_finishes() {
        let stop = Arc::new(AtomicBool::new(false));
        let events: Vec<RevealEvent> = reveal("héllo".into(), instant(1), stop).collect().await;

        assert_eq!(events.len(), 6);
        assert_eq!(events[1], RevealEvent::Chunk("é".into()));
        assert_eq!(events[5], RevealEvent::Finished("héllo".into()));
    }

    #[tokio::test]
    async fn test_chunk_size() {
        let stop = Arc::new(AtomicBool::new(false));
        let events: Vec<RevealEvent> = reveal("abcdefg".into(), instant(3), stop).collect().await;

        assert_eq!(
            events,
            vec![
                RevealEvent::Chunk("abc".into()),
                RevealEvent::Chunk("def".into()),
                RevealEvent::Chunk("g".into()),
                RevealEvent::Finished("abcdefg".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_zero_chunk_size_is_treated_as_one() {
        let stop = Arc::new(AtomicBool::new(false));
        let events: Vec<RevealEvent> = reveal("ab".into(), instant(0), stop).collect().await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_finishes_immediately() {
        let stop = Arc::new(AtomicBool::new(false));
        let events: Vec<RevealEvent> = reveal(String::new(), instant(1), stop).collect().await;
        assert_eq!(events, vec![RevealEvent::Finished(String::new())]);
    }

    #[tokio::test]
    async fn test_stop_flag_interrupts_mid_reveal() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut events = Box::pin(reveal("abcdef".into(), instant(1), stop.clone()));

        assert_eq!(events.next().await, Some(RevealEvent::Chunk("a".into())));
        assert_eq!(events.next().await, Some(RevealEvent::Chunk("b".into())));
        stop.store(true, Ordering::SeqCst);

        assert_eq!(
            events.next().await,
            Some(RevealEvent::Interrupted { shown: "ab".into() })
        );
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_stop_after_last_chunk_still_finishes() {
        let stop = Arc::new(AtomicBool::new(false));
        let mut events = Box::pin(reveal("ab".into(), instant(2), stop.clone()));

        assert_eq!(events.next().await, Some(RevealEvent::Chunk("ab".into())));
        stop.store(true, Ordering::SeqCst);

        assert_eq!(events.next().await, Some(RevealEvent::Finished("ab".into())));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn test_stop_before_start() {
        let stop = Arc::new(AtomicBool::new(true));
        let events: Vec<RevealEvent> = reveal("abc".into(), instant(1), stop).collect().await;
        assert_eq!(
            events,
            vec![RevealEvent::Interrupted {
                shown: String::new()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_chunks() {
        let stop = Arc::new(AtomicBool::new(false));
        let options = RevealOptions {
            chunk_chars: 1,
            delay: Duration::from_millis(15),
        };

        let started = tokio::time::Instant::now();
        let events: Vec<RevealEvent> = reveal("abcd".into(), options, stop).collect().await;

        assert_eq!(events.len(), 5);
        assert_eq!(started.elapsed(), Duration::from_millis(45));
    }

    #[test]
    fn test_is_terminal() {
        assert!(!RevealEvent::Chunk("a".into()).is_terminal());
        assert!(RevealEvent::Finished("a".into()).is_terminal());
        assert!(RevealEvent::Interrupted { shown: "".into() }.is_terminal());
    }
}
