//! Dominant color extraction.
//!
//! Images are resized to a small fixed canvas before clustering so the cost
//! of a call does not depend on the source resolution. The pixels are then
//! partitioned with k-means in RGB space and the centroids are returned as
//! 8-bit colors.

use image::imageops::FilterType;
use kmeans_colors::get_kmeans;
use palette::Srgb;

use crate::error::ExtractError;
use crate::models::{Color, ExtractionConfig};

/// Number of k-means runs with different seeds; the lowest score wins
const RUNS: u64 = 3;

/// Base random seed, fixed so repeated calls give identical output
const SEED: u64 = 0x4875_6542;

/// Extracts dominant colors from encoded image bytes
#[derive(Debug, Clone)]
pub struct ColorExtractor {
    config: ExtractionConfig,
}

impl ColorExtractor {
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Number of colors used when the caller does not specify one
    pub fn default_k(&self) -> usize {
        self.config.default_k
    }

    /// Extract exactly `k` colors. See [`extract_dominant_colors`].
    pub fn extract(&self, image: &[u8], k: usize) -> Result<Vec<Color>, ExtractError> {
        extract_dominant_colors(image, k, &self.config)
    }

    /// Run [`ColorExtractor::extract`] on the blocking thread pool.
    pub async fn extract_async(&self, image: Vec<u8>, k: usize) -> Result<Vec<Color>, ExtractError> {
        let extractor = self.clone();
        tokio::task::spawn_blocking(move || extractor.extract(&image, k))
            .await
            .map_err(|e| ExtractError::Task(e.to_string()))?
    }
}

impl Default for ColorExtractor {
    fn default() -> Self {
        Self::new(ExtractionConfig::default())
    }
}

/// Extract `k` dominant colors from an encoded image.
///
/// The result always has exactly `k` entries in cluster order. Duplicates
/// are possible: an image with `k` or fewer distinct colors yields each of
/// them once, padded by repeating the last one.
pub fn extract_dominant_colors(
    image: &[u8],
    k: usize,
    config: &ExtractionConfig,
) -> Result<Vec<Color>, ExtractError> {
    if k == 0 {
        return Err(ExtractError::InvalidK(k));
    }

    let decoded =
        image::load_from_memory(image).map_err(|e| ExtractError::Decode(e.to_string()))?;

    // Alpha is dropped before resampling so transparent pixels keep their RGB.
    let side = config.canvas_size.max(1);
    let canvas = image::imageops::resize(&decoded.to_rgb8(), side, side, FilterType::CatmullRom);

    let pixels: Vec<Color> = canvas
        .pixels()
        .map(|p| Color::new(p[0], p[1], p[2]))
        .collect();

    let distinct = distinct_colors(&pixels, k);
    let mut centroids = if distinct.len() <= k {
        // Every distinct color is its own cluster.
        distinct
    } else {
        cluster(&pixels, k, config)
    };

    pad_to(&mut centroids, k);

    tracing::debug!(
        k,
        canvas = side,
        colors = ?to_hex_list(&centroids),
        "Extracted dominant colors"
    );

    Ok(centroids)
}

/// Distinct colors in first-seen order, stopping once more than `limit`
/// have been found.
fn distinct_colors(pixels: &[Color], limit: usize) -> Vec<Color> {
    let mut seen = std::collections::HashSet::new();
    let mut distinct = Vec::new();
    for &p in pixels {
        if seen.insert(p) {
            distinct.push(p);
            if distinct.len() > limit {
                break;
            }
        }
    }
    distinct
}

/// k-means over RGB samples. Requires more than `k` distinct samples.
fn cluster(pixels: &[Color], k: usize, config: &ExtractionConfig) -> Vec<Color> {
    let samples: Vec<Srgb> = pixels
        .iter()
        .map(|c| Srgb::new(c.r, c.g, c.b).into_format::<f32>())
        .collect();

    let best = (0..RUNS)
        .map(|run| {
            get_kmeans(
                k,
                config.max_iterations,
                config.converge,
                false,
                &samples,
                SEED + run,
            )
        })
        .min_by(|a, b| a.score.total_cmp(&b.score));

    best.map(|result| {
        result
            .centroids
            .iter()
            .map(|c| Color::from_rounded(c.red * 255.0, c.green * 255.0, c.blue * 255.0))
            .collect()
    })
    .unwrap_or_default()
}

fn pad_to(colors: &mut Vec<Color>, k: usize) {
    let filler = colors.last().copied().unwrap_or(Color::new(0, 0, 0));
    colors.truncate(k);
    while colors.len() < k {
        colors.push(filler);
    }
}

/// Hex codes of the given colors, in order
pub fn to_hex_list(colors: &[Color]) -> Vec<String> {
    colors.iter().map(|c| c.to_hex()).collect()
}
