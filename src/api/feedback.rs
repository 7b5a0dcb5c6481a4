use axum::{extract::State, http::StatusCode, Json};
use chrono::Local;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::ApiError;
use crate::models::{AppCategory, FeedbackSubmission, ThemeName};
use crate::server::AppState;
use crate::services::FeedbackStore;

/// Initial values of the feedback form
#[derive(Debug, Serialize, ToSchema)]
pub struct FormDefaults {
    pub preferred_colors: Vec<&'static str>,
    pub dominant_color: &'static str,
    pub landing_color: &'static str,
    pub header_color: &'static str,
    pub button_color: &'static str,
    pub background_color: &'static str,
    pub text_color: &'static str,
    pub rating: u8,
    pub engagement_score: u8,
}

impl Default for FormDefaults {
    fn default() -> Self {
        Self {
            preferred_colors: vec!["#0b111e", "#00f7ff", "#ffffff", "#000000", "#ff0000"],
            dominant_color: "#00f7ff",
            landing_color: "#0b111e",
            header_color: "#00f7ff",
            button_color: "#00ff00",
            background_color: "#ffffff",
            text_color: "#000000",
            rating: 3,
            engagement_score: 50,
        }
    }
}

/// Choices and defaults for the feedback form
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackOptions {
    pub app_types: Vec<&'static str>,
    pub themes: Vec<&'static str>,
    pub defaults: FormDefaults,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackResponse {
    pub status: &'static str,
    /// Id assigned to this submission
    pub user_id: String,
}

/// App categories, themes and form defaults
#[utoipa::path(
    get,
    path = "/api/feedback/options",
    responses(
        (status = 200, description = "Form options", body = FeedbackOptions),
    ),
    tag = "Feedback"
)]
pub async fn handle_feedback_options() -> Json<FeedbackOptions> {
    Json(FeedbackOptions {
        app_types: AppCategory::ALL.iter().map(|c| c.as_str()).collect(),
        themes: ThemeName::ALL.iter().map(|t| t.as_str()).collect(),
        defaults: FormDefaults::default(),
    })
}

/// Record a feedback submission
///
/// The submission is validated, given a fresh user id and today's date, and
/// appended to the engagement table.
#[utoipa::path(
    post,
    path = "/api/feedback",
    request_body = FeedbackSubmission,
    responses(
        (status = 201, description = "Feedback stored", body = FeedbackResponse),
        (status = 422, description = "Invalid submission"),
        (status = 500, description = "Engagement table could not be written"),
    ),
    tag = "Feedback"
)]
pub async fn handle_submit_feedback(
    State(state): State<AppState>,
    Json(submission): Json<FeedbackSubmission>,
) -> Result<(StatusCode, Json<FeedbackResponse>), ApiError> {
    let record = submission.into_record(Local::now().date_naive())?;
    state.store.append(&record).await?;

    Ok((
        StatusCode::CREATED,
        Json(FeedbackResponse {
            status: "success",
            user_id: record.user_id,
        }),
    ))
}
