use axum::{
    extract::{Multipart, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::error::ApiError;
use crate::models::Color;
use crate::server::AppState;
use crate::services::prompt::palette_prompt;

/// Largest palette a client may ask for
pub const MAX_COLORS: usize = 16;

/// Multipart field carrying the screenshot
pub const IMAGE_FIELD: &str = "image";

/// Query parameters for palette extraction
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaletteQuery {
    /// Number of colors to extract (default 5)
    pub k: Option<usize>,
}

/// Multipart upload form
#[derive(ToSchema)]
pub struct ImageUpload {
    /// Screenshot in any common raster format
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

/// One extracted color
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ColorInfo {
    /// `#rrggbb`
    pub hex: String,
    pub rgb: [u8; 3],
}

impl From<Color> for ColorInfo {
    fn from(color: Color) -> Self {
        Self {
            hex: color.to_hex(),
            rgb: color.to_rgb(),
        }
    }
}

/// Result of a palette extraction
#[derive(Debug, Serialize, ToSchema)]
pub struct AnalysisResponse {
    /// Dominant colors in cluster order
    pub colors: Vec<ColorInfo>,
    /// Prompt that would be sent to HueBot for this palette
    pub prompt: String,
}

/// Pull the image bytes out of a multipart body
pub(crate) async fn read_image(mut multipart: Multipart) -> Result<Vec<u8>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {e}")))?;
        if bytes.is_empty() {
            return Err(ApiError::BadRequest("Uploaded image is empty".to_string()));
        }
        return Ok(bytes.to_vec());
    }

    Err(ApiError::BadRequest(format!(
        "Missing multipart field '{IMAGE_FIELD}'"
    )))
}

/// Resolve the requested palette size
pub(crate) fn palette_size(state: &AppState, query: &PaletteQuery) -> Result<usize, ApiError> {
    let k = query.k.unwrap_or_else(|| state.extractor.default_k());
    if k > MAX_COLORS {
        return Err(ApiError::BadRequest(format!(
            "At most {MAX_COLORS} colors can be extracted, got {k}"
        )));
    }
    Ok(k)
}

/// Extract colors for an upload and build the matching prompt
pub(crate) async fn extract_palette(
    state: &AppState,
    query: &PaletteQuery,
    multipart: Multipart,
) -> Result<(Vec<Color>, String), ApiError> {
    let k = palette_size(state, query)?;
    let image = read_image(multipart).await?;
    let size = image.len();

    let colors = state.extractor.extract_async(image, k).await?;
    let prompt = palette_prompt(&colors);

    tracing::info!(
        bytes = size,
        k = k,
        colors = ?crate::services::color_extractor::to_hex_list(&colors),
        "Palette extracted"
    );
    Ok((colors, prompt))
}

/// Extract the dominant colors of an uploaded screenshot
///
/// The image is downscaled and clustered with k-means; exactly `k` colors are
/// returned together with the prompt HueBot would receive for them.
#[utoipa::path(
    post,
    path = "/api/analyze",
    params(PaletteQuery),
    request_body(content = ImageUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Palette extracted", body = AnalysisResponse),
        (status = 400, description = "Missing or undecodable image, or invalid k"),
    ),
    tag = "Analysis"
)]
pub async fn handle_analyze(
    State(state): State<AppState>,
    Query(query): Query<PaletteQuery>,
    multipart: Multipart,
) -> Result<Json<AnalysisResponse>, ApiError> {
    let (colors, prompt) = extract_palette(&state, &query, multipart).await?;

    Ok(Json(AnalysisResponse {
        colors: colors.into_iter().map(ColorInfo::from).collect(),
        prompt,
    }))
}
