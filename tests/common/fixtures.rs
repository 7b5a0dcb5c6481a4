//! Test fixtures and constants.

use image::{ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Path the gateway posts to for the default model
pub const GENERATE_PATH: &str = "/models/gemini-2.0-flash-lite:generateContent";

/// Multipart boundary used by [`multipart_body`]
pub const BOUNDARY: &str = "huebot-test-boundary";

/// Encode an image as PNG bytes
pub fn png(image: &RgbImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG");
    bytes
}

/// Image of one flat color
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    png(&RgbImage::from_pixel(width, height, Rgb(color)))
}

/// Image split into vertical stripes of equal width
pub fn striped_png(colors: &[[u8; 3]], width: u32, height: u32) -> Vec<u8> {
    let stripe = width / colors.len() as u32;
    png(&RgbImage::from_fn(width, height, |x, _| {
        let index = ((x / stripe) as usize).min(colors.len() - 1);
        Rgb(colors[index])
    }))
}

/// Build a multipart/form-data body with one file field
pub fn multipart_body(field: &str, file: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"screen.png\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

/// A valid feedback submission using the form defaults
pub fn feedback(app_type: &str, theme: &str, rating: u8) -> Value {
    json!({
        "app_type": app_type,
        "theme_name": theme,
        "preferred_colors": ["#0b111e", "#00f7ff", "#ffffff", "#000000", "#ff0000"],
        "dominant_color": "#00f7ff",
        "rating": rating,
        "engagement_score": 50,
        "comments": "Looks good",
        "landing_color": "#0b111e",
        "header_color": "#00f7ff",
        "button_color": "#00ff00",
        "background_color": "#ffffff",
        "text_color": "#000000"
    })
}

/// Gemini response body carrying `text`
pub fn gemini_answer(text: &str) -> Value {
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": text}]},
            "finishReason": "STOP"
        }]
    })
}

/// Make the mock Gemini server answer every request with `text`
pub async fn mock_answer(server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(gemini_answer(text)))
        .mount(server)
        .await;
}

/// Engagement table written by hand, as an older version of the app might
pub const LEGACY_TABLE: &str = "\
user_id,app_type,theme_name,preferred_colors,dominant_color,rating,engagement_score,comments,landing_color,header_color,button_color,background_color,text_color,date
u1,Health,Dark Blue,\"#ff0000, #00ff00\",#00f7ff,5,80,great,#000000,#00f7ff,#00ff00,#ffffff,#000000,2024-01-10
u2,Health,Soft Green,#ff0000,#00f7ff,3,40,ok,#ffffff,#00f7ff,#00ff00,#ffffff,#000000,2024-02-15
u3,Finance,Dark Blue,#0000ff,#00f7ff,4,60,fine,#000000,#00f7ff,#00ff00,#ffffff,#000000,2024-03-20
";
