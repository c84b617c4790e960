//! Alpha classification for source images.
//!
//! PNG files are classified from a single byte: the IHDR colour type at
//! offset 25. Colour type 6 (truecolour with alpha) means the image has an
//! alpha channel; every other value means it does not. No further PNG
//! validation happens, so malformed files get a meaningless but harmless
//! answer. A file too short to contain the byte is classified as opaque.
//!
//! JPEG sources never carry alpha.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Offset of the colour type byte in a well-formed PNG
pub const PNG_COLOR_TYPE_OFFSET: u64 = 25;

/// PNG colour type for RGBA
pub const PNG_COLOR_TYPE_RGBA: u8 = 6;

/// Source container kinds the converter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEncoding {
    Png,
    Jpeg,
}

impl SourceEncoding {
    /// Classify a file by extension (case-insensitive)
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "png" => Some(SourceEncoding::Png),
            "jpg" | "jpeg" => Some(SourceEncoding::Jpeg),
            _ => None,
        }
    }
}

fn classify_color_type(read: usize, byte: u8) -> bool {
    read == 1 && byte == PNG_COLOR_TYPE_RGBA
}

/// Read the PNG colour type byte and report whether the image has alpha.
///
/// The file is closed before returning on every path.
pub fn png_has_alpha(path: &Path) -> Result<bool> {
    let mut file = File::open(path)
        .with_context(|| format!("Failed to open PNG for alpha probe: {}", path.display()))?;

    file.seek(SeekFrom::Start(PNG_COLOR_TYPE_OFFSET))
        .with_context(|| format!("Failed to seek PNG header: {}", path.display()))?;

    let mut buf = [0u8; 1];
    let read = file
        .read(&mut buf)
        .with_context(|| format!("Failed to read PNG header: {}", path.display()))?;

    Ok(classify_color_type(read, buf[0]))
}

/// Non-blocking variant of [`png_has_alpha`] for detached runs.
pub async fn png_has_alpha_async(path: &Path) -> Result<bool> {
    let mut file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open PNG for alpha probe: {}", path.display()))?;

    file.seek(SeekFrom::Start(PNG_COLOR_TYPE_OFFSET))
        .await
        .with_context(|| format!("Failed to seek PNG header: {}", path.display()))?;

    let mut buf = [0u8; 1];
    let read = file
        .read(&mut buf)
        .await
        .with_context(|| format!("Failed to read PNG header: {}", path.display()))?;

    Ok(classify_color_type(read, buf[0]))
}

/// Classify any supported source image
pub fn has_alpha(path: &Path, encoding: SourceEncoding) -> Result<bool> {
    match encoding {
        SourceEncoding::Jpeg => Ok(false),
        SourceEncoding::Png => png_has_alpha(path),
    }
}

/// Non-blocking variant of [`has_alpha`]
pub async fn has_alpha_async(path: &Path, encoding: SourceEncoding) -> Result<bool> {
    match encoding {
        SourceEncoding::Jpeg => Ok(false),
        SourceEncoding::Png => png_has_alpha_async(path).await,
    }
}
