/// Screenshot preprocessing before images enter the model context.
///
/// Screenshots arrive base64-encoded (optionally with a `data:` URI prefix).
/// Each one is decoded, downscaled when it exceeds the model's pixel budget
/// and re-encoded as PNG. Screenshots are independent, so a batch is
/// processed concurrently on the blocking pool.
use base64::Engine as _;
use futures_util::future::try_join_all;

use crate::errors::{PilotError, PilotResult};

pub struct PreparedScreenshot {
    /// Base64 PNG without a data URI prefix.
    pub image_base64: String,
    pub width: u32,
    pub height: u32,
    pub resized: bool,
}

/// Strip a `data:image/...;base64,` prefix if present.
pub fn strip_data_uri(image: &str) -> &str {
    if image.starts_with("data:") {
        image.split_once(',').map(|(_, data)| data).unwrap_or(image)
    } else {
        image
    }
}

/// Decode, shrink to at most `max_pixels` and re-encode one screenshot.
pub fn preprocess_resize_image(image_base64: &str, max_pixels: u32) -> PilotResult<PreparedScreenshot> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(strip_data_uri(image_base64).trim())
        .map_err(|e| PilotError::Image(format!("base64 decode: {e}")))?;
    let img = image::load_from_memory(&bytes)
        .map_err(|e| PilotError::Image(format!("image decode: {e}")))?;
    let (w, h) = (img.width(), img.height());

    let pixels = w as u64 * h as u64;
    let (img, resized) = if pixels > max_pixels as u64 {
        let ratio = (max_pixels as f64 / pixels as f64).sqrt();
        let new_w = ((w as f64 * ratio).floor() as u32).max(1);
        let new_h = ((h as f64 * ratio).floor() as u32).max(1);
        tracing::debug!(from = %format!("{w}×{h}"), to = %format!("{new_w}×{new_h}"), "downscaling screenshot");
        (img.resize_exact(new_w, new_h, image::imageops::FilterType::Triangle), true)
    } else {
        (img, false)
    };

    let mut png_bytes = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)
        .map_err(|e| PilotError::Image(format!("PNG encode: {e}")))?;

    Ok(PreparedScreenshot {
        image_base64: base64::engine::general_purpose::STANDARD.encode(&png_bytes),
        width: img.width(),
        height: img.height(),
        resized,
    })
}

/// Preprocess every screenshot concurrently; the whole batch fails if any
/// single image cannot be decoded.
pub async fn prepare_screenshots(images: &[String], max_pixels: u32) -> PilotResult<Vec<String>> {
    let tasks = images.iter().cloned().map(|image| async move {
        tokio::task::spawn_blocking(move || preprocess_resize_image(&image, max_pixels))
            .await
            .map_err(|e| PilotError::Image(format!("join: {e}")))?
    });
    let prepared = try_join_all(tasks).await?;
    tracing::debug!(
        count = prepared.len(),
        resized = prepared.iter().filter(|p| p.resized).count(),
        "screenshots prepared"
    );
    Ok(prepared.into_iter().map(|p| p.image_base64).collect())
}

#[cfg(test)]
pub(crate) fn test_png_base64(width: u32, height: u32) -> String {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    base64::engine::general_purpose::STANDARD.encode(&bytes)
}
