//! HueBot - color psychology assistant for mobile UI design
//!
//! Dominant-color extraction, feedback collection with dashboard
//! aggregation, and an LLM chat with a cancellable typing reveal.
//! This library exposes modules for integration testing.

pub mod api;
pub mod error;
pub mod models;
pub mod server;
pub mod services;
