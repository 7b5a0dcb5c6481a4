use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use utoipa::ToSchema;

use super::color::{Color, ColorParseError};

/// Date format of the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Maximum number of preferred colors per submission
pub const MAX_PREFERRED_COLORS: usize = 5;

/// Column order of the engagement table
pub const COLUMNS: [&str; 14] = [
    "user_id",
    "app_type",
    "theme_name",
    "preferred_colors",
    "dominant_color",
    "rating",
    "engagement_score",
    "comments",
    "landing_color",
    "header_color",
    "button_color",
    "background_color",
    "text_color",
    "date",
];

/// App category a feedback submitter is rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AppCategory {
    Education,
    #[serde(rename = "E-commerce")]
    ECommerce,
    Health,
    Gaming,
    News,
    Finance,
    Productivity,
    Travel,
    #[serde(rename = "Social Media")]
    SocialMedia,
    Music,
    Utility,
    Fitness,
}

impl AppCategory {
    pub const ALL: [AppCategory; 12] = [
        AppCategory::Education,
        AppCategory::ECommerce,
        AppCategory::Health,
        AppCategory::Gaming,
        AppCategory::News,
        AppCategory::Finance,
        AppCategory::Productivity,
        AppCategory::Travel,
        AppCategory::SocialMedia,
        AppCategory::Music,
        AppCategory::Utility,
        AppCategory::Fitness,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppCategory::Education => "Education",
            AppCategory::ECommerce => "E-commerce",
            AppCategory::Health => "Health",
            AppCategory::Gaming => "Gaming",
            AppCategory::News => "News",
            AppCategory::Finance => "Finance",
            AppCategory::Productivity => "Productivity",
            AppCategory::Travel => "Travel",
            AppCategory::SocialMedia => "Social Media",
            AppCategory::Music => "Music",
            AppCategory::Utility => "Utility",
            AppCategory::Fitness => "Fitness",
        }
    }

    /// Exact, case-sensitive match on the display name.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s.trim())
    }
}

impl fmt::Display for AppCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predefined color scheme offered to submitters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThemeName {
    #[serde(rename = "Dark Blue")]
    DarkBlue,
    #[serde(rename = "Soft Green")]
    SoftGreen,
    #[serde(rename = "Vibrant Orange")]
    VibrantOrange,
    #[serde(rename = "Minimal Gray")]
    MinimalGray,
    #[serde(rename = "Neon Pink")]
    NeonPink,
}

impl ThemeName {
    pub const ALL: [ThemeName; 5] = [
        ThemeName::DarkBlue,
        ThemeName::SoftGreen,
        ThemeName::VibrantOrange,
        ThemeName::MinimalGray,
        ThemeName::NeonPink,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ThemeName::DarkBlue => "Dark Blue",
            ThemeName::SoftGreen => "Soft Green",
            ThemeName::VibrantOrange => "Vibrant Orange",
            ThemeName::MinimalGray => "Minimal Gray",
            ThemeName::NeonPink => "Neon Pink",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s.trim())
    }
}

impl fmt::Display for ThemeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named UI section with its own color preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Landing,
    Header,
    Button,
    Background,
    Text,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Landing,
        Section::Header,
        Section::Button,
        Section::Background,
        Section::Text,
    ];

    /// CSV column holding this section's color
    pub fn column(self) -> &'static str {
        match self {
            Section::Landing => "landing_color",
            Section::Header => "header_color",
            Section::Button => "button_color",
            Section::Background => "background_color",
            Section::Text => "text_color",
        }
    }
}

/// Validation errors for a feedback submission
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("Unknown app type: {0}")]
    UnknownAppType(String),

    #[error("Unknown theme: {0}")]
    UnknownTheme(String),

    #[error("Please suggest at least one preferred color")]
    NoPreferredColors,

    #[error("At most 5 preferred colors are allowed, got {0}")]
    TooManyPreferredColors(usize),

    #[error("Invalid color in {field}: {source}")]
    InvalidColor {
        field: &'static str,
        #[source]
        source: ColorParseError,
    },

    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i64),

    #[error("Engagement score must be between 0 and 100, got {0}")]
    EngagementOutOfRange(i64),
}

/// Raw feedback form payload, before validation
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct FeedbackSubmission {
    /// One of the app categories
    pub app_type: String,
    /// One of the theme names
    pub theme_name: String,
    /// Up to five `#rrggbb` codes; empty strings are ignored
    #[serde(default)]
    pub preferred_colors: Vec<String>,
    pub dominant_color: String,
    /// 1-5
    pub rating: i64,
    /// 0-100
    pub engagement_score: i64,
    #[serde(default)]
    pub comments: String,
    pub landing_color: String,
    pub header_color: String,
    pub button_color: String,
    pub background_color: String,
    pub text_color: String,
}

fn parse_field(field: &'static str, value: &str) -> Result<Color, FeedbackError> {
    Color::from_hex(value).map_err(|source| FeedbackError::InvalidColor { field, source })
}

impl FeedbackSubmission {
    /// Validate the payload and stamp it with a fresh user id and date.
    pub fn into_record(self, date: NaiveDate) -> Result<FeedbackRecord, FeedbackError> {
        let app_type = AppCategory::parse(&self.app_type)
            .ok_or_else(|| FeedbackError::UnknownAppType(self.app_type.clone()))?;
        let theme_name = ThemeName::parse(&self.theme_name)
            .ok_or_else(|| FeedbackError::UnknownTheme(self.theme_name.clone()))?;

        let preferred_colors = self
            .preferred_colors
            .iter()
            .filter(|c| !c.trim().is_empty())
            .map(|c| parse_field("preferred_colors", c))
            .collect::<Result<Vec<_>, _>>()?;
        if preferred_colors.is_empty() {
            return Err(FeedbackError::NoPreferredColors);
        }
        if preferred_colors.len() > MAX_PREFERRED_COLORS {
            return Err(FeedbackError::TooManyPreferredColors(preferred_colors.len()));
        }

        if !(1..=5).contains(&self.rating) {
            return Err(FeedbackError::RatingOutOfRange(self.rating));
        }
        if !(0..=100).contains(&self.engagement_score) {
            return Err(FeedbackError::EngagementOutOfRange(self.engagement_score));
        }

        Ok(FeedbackRecord {
            user_id: uuid::Uuid::new_v4().to_string(),
            app_type,
            theme_name,
            preferred_colors,
            dominant_color: parse_field("dominant_color", &self.dominant_color)?,
            rating: self.rating as u8,
            engagement_score: self.engagement_score as u8,
            comments: self.comments,
            landing_color: parse_field("landing_color", &self.landing_color)?,
            header_color: parse_field("header_color", &self.header_color)?,
            button_color: parse_field("button_color", &self.button_color)?,
            background_color: parse_field("background_color", &self.background_color)?,
            text_color: parse_field("text_color", &self.text_color)?,
            date,
        })
    }
}

/// One validated feedback submission
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackRecord {
    pub user_id: String,
    pub app_type: AppCategory,
    pub theme_name: ThemeName,
    pub preferred_colors: Vec<Color>,
    pub dominant_color: Color,
    pub rating: u8,
    pub engagement_score: u8,
    pub comments: String,
    pub landing_color: Color,
    pub header_color: Color,
    pub button_color: Color,
    pub background_color: Color,
    pub text_color: Color,
    pub date: NaiveDate,
}

impl FeedbackRecord {
    /// Flatten into the persisted row layout
    pub fn to_row(&self) -> StoredRow {
        StoredRow {
            user_id: self.user_id.clone(),
            app_type: self.app_type.as_str().to_string(),
            theme_name: self.theme_name.as_str().to_string(),
            preferred_colors: self
                .preferred_colors
                .iter()
                .map(|c| c.to_hex())
                .collect::<Vec<_>>()
                .join(", "),
            dominant_color: self.dominant_color.to_hex(),
            rating: self.rating.to_string(),
            engagement_score: self.engagement_score.to_string(),
            comments: self.comments.clone(),
            landing_color: self.landing_color.to_hex(),
            header_color: self.header_color.to_hex(),
            button_color: self.button_color.to_hex(),
            background_color: self.background_color.to_hex(),
            text_color: self.text_color.to_hex(),
            date: self.date.format(DATE_FORMAT).to_string(),
        }
    }
}

/// A row of the engagement table, as stored.
///
/// Fields stay textual so hand-edited or older files can still be read;
/// the aggregator parses what it needs and skips what it cannot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub app_type: String,
    #[serde(default)]
    pub theme_name: String,
    #[serde(default)]
    pub preferred_colors: String,
    #[serde(default)]
    pub dominant_color: String,
    #[serde(default)]
    pub rating: String,
    #[serde(default)]
    pub engagement_score: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub landing_color: String,
    #[serde(default)]
    pub header_color: String,
    #[serde(default)]
    pub button_color: String,
    #[serde(default)]
    pub background_color: String,
    #[serde(default)]
    pub text_color: String,
    #[serde(default)]
    pub date: String,
}

impl StoredRow {
    pub fn rating(&self) -> Option<f64> {
        parse_number(&self.rating)
    }

    pub fn engagement_score(&self) -> Option<f64> {
        parse_number(&self.engagement_score)
    }

    /// Accepts `YYYY-MM-DD`, optionally followed by a time part.
    pub fn date(&self) -> Option<NaiveDate> {
        let s = self.date.trim();
        let head = s.get(..10).unwrap_or(s);
        NaiveDate::parse_from_str(head, DATE_FORMAT).ok()
    }

    pub fn section_color(&self, section: Section) -> &str {
        match section {
            Section::Landing => &self.landing_color,
            Section::Header => &self.header_color,
            Section::Button => &self.button_color,
            Section::Background => &self.background_color,
            Section::Text => &self.text_color,
        }
    }

    /// Trimmed, non-empty tokens of the comma-joined preferred colors
    pub fn preferred_color_tokens(&self) -> impl Iterator<Item = &str> {
        self.preferred_colors
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
