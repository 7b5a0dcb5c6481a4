use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::models::DATE_FORMAT;
use crate::server::AppState;
use crate::services::feedback_aggregator::{chart_data, filter_options, filter_rows, summarize_subset};
use crate::services::feedback_store::export_csv;
use crate::services::{ChartData, FeedbackFilter, FeedbackStore, FeedbackSummary, FilterOptions};

/// File name offered for the CSV export
pub const EXPORT_FILE_NAME: &str = "filtered_feedback.csv";

/// Dashboard filter. Omitted dimensions are unrestricted.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DashboardQuery {
    /// Comma-separated app types
    pub app_types: Option<String>,
    /// Comma-separated theme names
    pub themes: Option<String>,
    /// First day to include, `YYYY-MM-DD`
    pub from: Option<String>,
    /// Last day to include, `YYYY-MM-DD`
    pub to: Option<String>,
}

fn parse_list(value: Option<&str>) -> Option<BTreeSet<String>> {
    let set: BTreeSet<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();
    (!set.is_empty()).then_some(set)
}

fn parse_date(name: &str, value: Option<&str>) -> Result<Option<NaiveDate>, ApiError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => NaiveDate::parse_from_str(v, DATE_FORMAT)
            .map(Some)
            .map_err(|_| ApiError::BadRequest(format!("Invalid {name} date '{v}', expected YYYY-MM-DD"))),
    }
}

impl DashboardQuery {
    pub fn to_filter(&self) -> Result<FeedbackFilter, ApiError> {
        let filter = FeedbackFilter {
            app_types: parse_list(self.app_types.as_deref()),
            themes: parse_list(self.themes.as_deref()),
            from: parse_date("from", self.from.as_deref())?,
            to: parse_date("to", self.to.as_deref())?,
        };

        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from > to {
                return Err(ApiError::BadRequest(format!(
                    "Date range is reversed: {from} is after {to}"
                )));
            }
        }
        Ok(filter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DashboardState {
    /// Rows matched the filter
    Ok,
    /// The table has rows, but none match the filter
    NoData,
    /// No engagement table exists yet
    MissingTable,
    /// The table exists but holds no rows
    EmptyTable,
    /// The table exists but could not be parsed
    UnreadableTable,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardResponse {
    pub state: DashboardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<FilterOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<FeedbackSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charts: Option<ChartData>,
}

impl DashboardResponse {
    fn warning(state: DashboardState, message: impl Into<String>) -> Self {
        Self {
            state,
            warning: Some(message.into()),
            options: None,
            summary: None,
            charts: None,
        }
    }
}

/// Aggregated feedback for the selected filters
#[utoipa::path(
    get,
    path = "/api/dashboard",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard data, or a warning state", body = DashboardResponse),
        (status = 400, description = "Malformed date"),
    ),
    tag = "Dashboard"
)]
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, ApiError> {
    let filter = query.to_filter()?;

    let rows = match state.store.load().await {
        Ok(Some(rows)) => rows,
        Ok(None) => {
            return Ok(Json(DashboardResponse::warning(
                DashboardState::MissingTable,
                "No feedback has been collected yet",
            )))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Engagement table could not be read");
            return Ok(Json(DashboardResponse::warning(
                DashboardState::UnreadableTable,
                format!("The engagement table could not be read: {e}"),
            )));
        }
    };
    if rows.is_empty() {
        return Ok(Json(DashboardResponse::warning(
            DashboardState::EmptyTable,
            "The engagement table is empty",
        )));
    }

    let options = filter_options(&rows);
    let subset = filter_rows(&rows, &filter);
    let summary = summarize_subset(&subset);

    tracing::debug!(
        total = rows.len(),
        matched = subset.len(),
        filter = ?filter,
        "Dashboard aggregated"
    );

    if summary.is_empty() {
        return Ok(Json(DashboardResponse {
            state: DashboardState::NoData,
            warning: Some("No data matches the selected filters".to_string()),
            options: Some(options),
            summary: Some(summary),
            charts: None,
        }));
    }

    Ok(Json(DashboardResponse {
        state: DashboardState::Ok,
        warning: None,
        options: Some(options),
        charts: Some(chart_data(&subset)),
        summary: Some(summary),
    }))
}

/// Download the filtered rows as CSV
#[utoipa::path(
    get,
    path = "/api/dashboard/export",
    params(DashboardQuery),
    responses(
        (status = 200, description = "CSV attachment `filtered_feedback.csv`"),
        (status = 400, description = "Malformed date"),
        (status = 500, description = "Engagement table could not be read"),
    ),
    tag = "Dashboard"
)]
pub async fn handle_export(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = query.to_filter()?;
    let rows = state.store.load().await?.unwrap_or_default();
    let subset: Vec<_> = filter_rows(&rows, &filter).into_iter().cloned().collect();
    let body = export_csv(&subset)?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        body,
    ))
}
