//! Icon thumbnails: raw RGBA pixels from the platform, scaled to a fixed
//! square, PNG-encoded and returned as a base64 data URI.
//!
//! Pixel work runs on tokio's blocking pool.

use std::io::Cursor;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use base64::Engine as _;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat, RgbaImage};

use crate::config::{ICON_DATA_URI_PREFIX, ICON_SIZE_PX};
use crate::platform::IconEncoder;

/// Decoded application icon, 8-bit RGBA, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaIcon {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Platform hook that rasterizes a package's icon.
pub trait IconSource: Send + Sync + 'static {
    /// `Ok(None)` when the package has no icon. May block.
    fn load(&self, package_id: &str) -> anyhow::Result<Option<RgbaIcon>>;
}

/// [`IconEncoder`] producing `data:image/png;base64,...` thumbnails.
pub struct PngIconEncoder<S> {
    source: Arc<S>,
    size: u32,
}

impl<S: IconSource> PngIconEncoder<S> {
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            size: ICON_SIZE_PX,
        }
    }
}

#[async_trait]
impl<S: IconSource> IconEncoder for PngIconEncoder<S> {
    async fn encode(&self, package_id: &str) -> anyhow::Result<Option<String>> {
        let source = Arc::clone(&self.source);
        let package_id = package_id.to_string();
        let size = self.size;

        tokio::task::spawn_blocking(move || -> anyhow::Result<Option<String>> {
            let Some(icon) = source.load(&package_id)? else {
                return Ok(None);
            };
            let png = encode_thumbnail(icon, size)
                .with_context(|| format!("encoding icon for {package_id}"))?;
            Ok(Some(build_png_data_uri(&png)))
        })
        .await
        .context("icon encoding task failed")?
    }
}

/// Scale `icon` to `size`×`size` and encode as PNG.
fn encode_thumbnail(icon: RgbaIcon, size: u32) -> anyhow::Result<Vec<u8>> {
    let RgbaIcon {
        width,
        height,
        pixels,
    } = icon;
    if width == 0 || height == 0 {
        anyhow::bail!("icon has zero dimensions ({width}x{height})");
    }
    let image = RgbaImage::from_raw(width, height, pixels)
        .with_context(|| format!("pixel buffer too small for {width}x{height} RGBA"))?;

    let scaled = if width == size && height == size {
        image
    } else {
        image::imageops::resize(&image, size, size, FilterType::Triangle)
    };

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(scaled).write_to(&mut png, ImageOutputFormat::Png)?;
    Ok(png.into_inner())
}

fn build_png_data_uri(png: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(png);
    format!("{ICON_DATA_URI_PREFIX}{encoded}")
}
