//! Read-side aggregation over the engagement table.
//!
//! Everything here is a pure function of the stored rows and a filter.
//! An empty filtered subset is a normal outcome: averages and the top color
//! come back as `None` rather than failing.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use utoipa::ToSchema;

use crate::models::{Color, Section, StoredRow};

/// Row filter; every dimension left as `None` is unrestricted
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackFilter {
    pub app_types: Option<BTreeSet<String>>,
    pub themes: Option<BTreeSet<String>>,
    /// Inclusive lower date bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub to: Option<NaiveDate>,
}

impl FeedbackFilter {
    /// All dimensions must match. Rows with an unparseable date are
    /// rejected as soon as either date bound is set.
    pub fn matches(&self, row: &StoredRow) -> bool {
        if let Some(app_types) = &self.app_types {
            if !app_types.contains(row.app_type.trim()) {
                return false;
            }
        }
        if let Some(themes) = &self.themes {
            if !themes.contains(row.theme_name.trim()) {
                return false;
            }
        }
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = row.date() else {
                return false;
            };
            if self.from.is_some_and(|from| date < from) {
                return false;
            }
            if self.to.is_some_and(|to| date > to) {
                return false;
            }
        }
        true
    }
}

/// Average color of one UI section across the subset
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SectionColor {
    pub section: Section,
    /// `#rrggbb`
    #[schema(value_type = String)]
    pub color: Color,
}

/// Summary statistics over a filtered subset
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FeedbackSummary {
    /// Rows in the subset
    pub record_count: usize,
    /// Mean rating, rounded to 2 decimals
    pub avg_rating: Option<f64>,
    /// Mean engagement score, rounded to 2 decimals
    pub avg_engagement: Option<f64>,
    /// Distinct user ids
    pub total_users: usize,
    /// Most frequent preferred-color token; `None` when there are none
    pub top_color: Option<String>,
    /// Per-section mean colors; sections without valid colors are omitted
    pub section_colors: Vec<SectionColor>,
}

impl FeedbackSummary {
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Values available for each filter dimension
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct FilterOptions {
    pub app_types: Vec<String>,
    pub themes: Vec<String>,
    #[schema(value_type = Option<String>)]
    pub date_min: Option<NaiveDate>,
    #[schema(value_type = Option<String>)]
    pub date_max: Option<NaiveDate>,
}

/// Box-plot statistics of ratings for one theme
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct RatingDistribution {
    pub theme: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Mean of one metric for a group
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct GroupMean {
    pub group: String,
    pub value: f64,
}

/// Mean rating and engagement for an app type
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AppMetrics {
    pub app_type: String,
    pub avg_rating: Option<f64>,
    pub avg_engagement: Option<f64>,
}

/// Series for the dashboard charts; groups are sorted by name
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChartData {
    pub rating_by_theme: Vec<RatingDistribution>,
    pub engagement_by_theme: Vec<GroupMean>,
    pub app_metrics: Vec<AppMetrics>,
}

/// Rows of `rows` accepted by `filter`, in table order
pub fn filter_rows<'a>(rows: &'a [StoredRow], filter: &FeedbackFilter) -> Vec<&'a StoredRow> {
    rows.iter().filter(|row| filter.matches(row)).collect()
}

/// Filter the table and summarize the matching rows
pub fn summarize(rows: &[StoredRow], filter: &FeedbackFilter) -> FeedbackSummary {
    summarize_subset(&filter_rows(rows, filter))
}

/// Summarize rows that have already been filtered
pub fn summarize_subset(subset: &[&StoredRow]) -> FeedbackSummary {
    let total_users = subset
        .iter()
        .map(|row| row.user_id.trim())
        .filter(|id| !id.is_empty())
        .collect::<HashSet<_>>()
        .len();

    FeedbackSummary {
        record_count: subset.len(),
        avg_rating: mean(subset.iter().filter_map(|row| row.rating())).map(round2),
        avg_engagement: mean(subset.iter().filter_map(|row| row.engagement_score())).map(round2),
        total_users,
        top_color: top_color(subset),
        section_colors: section_colors(subset),
    }
}

/// Mode of all preferred-color tokens. Ties go to the token seen first.
pub fn top_color(subset: &[&StoredRow]) -> Option<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for row in subset {
        for token in row.preferred_color_tokens() {
            let count = counts.entry(token).or_insert(0);
            if *count == 0 {
                order.push(token);
            }
            *count += 1;
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for token in order {
        let count = counts[token];
        if best.map_or(true, |(_, n)| count > n) {
            best = Some((token, count));
        }
    }
    best.map(|(token, _)| token.to_string())
}

/// Channel-wise mean color for each section, skipping unparseable values
pub fn section_colors(subset: &[&StoredRow]) -> Vec<SectionColor> {
    Section::ALL
        .into_iter()
        .filter_map(|section| {
            let colors: Vec<Color> = subset
                .iter()
                .filter_map(|row| Color::from_hex(row.section_color(section)).ok())
                .collect();
            Color::mean_truncated(&colors).map(|color| SectionColor { section, color })
        })
        .collect()
}

/// Distinct values (first-seen order) and the date span of the whole table
pub fn filter_options(rows: &[StoredRow]) -> FilterOptions {
    fn unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut seen = HashSet::new();
        values
            .map(str::trim)
            .filter(|v| !v.is_empty() && seen.insert(*v))
            .map(str::to_string)
            .collect()
    }

    let dates: Vec<NaiveDate> = rows.iter().filter_map(StoredRow::date).collect();

    FilterOptions {
        app_types: unique(rows.iter().map(|r| r.app_type.as_str())),
        themes: unique(rows.iter().map(|r| r.theme_name.as_str())),
        date_min: dates.iter().min().copied(),
        date_max: dates.iter().max().copied(),
    }
}

/// Chart series over an already filtered subset
pub fn chart_data(subset: &[&StoredRow]) -> ChartData {
    let by_theme = group_by(subset, |row| row.theme_name.trim());
    let by_app = group_by(subset, |row| row.app_type.trim());

    let rating_by_theme = by_theme
        .iter()
        .filter_map(|(theme, rows)| {
            let mut ratings: Vec<f64> = rows.iter().filter_map(|r| r.rating()).collect();
            ratings.sort_by(f64::total_cmp);
            distribution(&ratings).map(|(min, q1, median, q3, max)| RatingDistribution {
                theme: theme.to_string(),
                count: ratings.len(),
                min,
                q1,
                median,
                q3,
                max,
            })
        })
        .collect();

    let engagement_by_theme = by_theme
        .iter()
        .filter_map(|(theme, rows)| {
            mean(rows.iter().filter_map(|r| r.engagement_score())).map(|value| GroupMean {
                group: theme.to_string(),
                value: round2(value),
            })
        })
        .collect();

    let app_metrics = by_app
        .iter()
        .map(|(app_type, rows)| AppMetrics {
            app_type: app_type.to_string(),
            avg_rating: mean(rows.iter().filter_map(|r| r.rating())).map(round2),
            avg_engagement: mean(rows.iter().filter_map(|r| r.engagement_score())).map(round2),
        })
        .collect();

    ChartData {
        rating_by_theme,
        engagement_by_theme,
        app_metrics,
    }
}

fn group_by<'a, F>(subset: &[&'a StoredRow], key: F) -> BTreeMap<&'a str, Vec<&'a StoredRow>>
where
    F: Fn(&'a StoredRow) -> &'a str,
{
    let mut groups: BTreeMap<&str, Vec<&StoredRow>> = BTreeMap::new();
    for &row in subset {
        groups.entry(key(row)).or_default().push(row);
    }
    groups
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Linear-interpolated quantile of sorted, non-empty data
fn quantile(sorted: &[f64], p: f64) -> f64 {
    let pos = p * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

fn distribution(sorted: &[f64]) -> Option<(f64, f64, f64, f64, f64)> {
    let (&min, &max) = (sorted.first()?, sorted.last()?);
    Some((
        min,
        quantile(sorted, 0.25),
        quantile(sorted, 0.5),
        quantile(sorted, 0.75),
        max,
    ))
}
