//! Screen capture to uncompressed 24-bit BMP.

use crate::error::{LibraryError, Result};
use crate::paths;
use crate::storage::Storage;
use std::io::Write;
use time::OffsetDateTime;
use tracing::{info, warn};

const HEADER_LEN: u32 = 54;
const DIB_HEADER_LEN: u32 = 40;

/// Anything that can hand out RGB565 pixels, such as a display sprite.
pub trait PixelSource {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn read_pixel(&self, x: u32, y: u32) -> u16;
}

fn row_size(width: u32) -> u32 {
    (width * 3).div_ceil(4) * 4
}

/// Expand one RGB565 pixel to 8-bit blue, green, red.
pub fn rgb565_to_bgr(pixel: u16) -> [u8; 3] {
    let r5 = ((pixel >> 11) & 0x1F) as u8;
    let g6 = ((pixel >> 5) & 0x3F) as u8;
    let b5 = (pixel & 0x1F) as u8;
    [
        (b5 << 3) | (b5 >> 2),
        (g6 << 2) | (g6 >> 4),
        (r5 << 3) | (r5 >> 2),
    ]
}

pub fn encode_bmp(source: &impl PixelSource) -> Vec<u8> {
    let width = source.width();
    let height = source.height();
    let row = row_size(width);
    let image_len = row * height;
    let file_len = HEADER_LEN + image_len;

    let mut out = Vec::with_capacity(file_len as usize);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&DIB_HEADER_LEN.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&24u16.to_le_bytes());
    // compression, image size, x/y resolution, palette counts
    out.extend_from_slice(&[0u8; 24]);

    // bottom-up rows
    for y in (0..height).rev() {
        let row_start = out.len();
        for x in 0..width {
            out.extend_from_slice(&rgb565_to_bgr(source.read_pixel(x, y)));
        }
        out.resize(row_start + row as usize, 0);
    }
    out
}

pub fn screenshot_name(at: OffsetDateTime) -> String {
    format!(
        "screenshot_{:04}{:02}{:02}_{:02}{:02}{:02}.bmp",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

/// Write the current frame under `screen_dir`, creating it if needed.
pub fn capture_screenshot<S: Storage>(
    storage: &mut S,
    screen_dir: &str,
    source: &impl PixelSource,
    at: OffsetDateTime,
) -> Result<String> {
    let dir = paths::normalize_dir(screen_dir);
    if !storage.exists(&dir) {
        storage
            .create_dir(&dir)
            .map_err(|source| LibraryError::io(dir.as_str(), source))?;
        info!(dir = %dir, "created screenshot directory");
    }

    let path = paths::join(&dir, &screenshot_name(at));
    let bytes = encode_bmp(source);
    let mut out = storage.create(&path).map_err(|source| {
        warn!(path = %path, error = %source, "failed to create screenshot file");
        LibraryError::io(path.as_str(), source)
    })?;
    out.write_all(&bytes)
        .and_then(|()| out.flush())
        .map_err(|source| LibraryError::io(path.as_str(), source))?;

    info!(path = %path, bytes = bytes.len(), "screenshot saved");
    Ok(path)
}

/// [`capture_screenshot`] stamped with the local time, or UTC when the
/// local offset cannot be determined.
pub fn capture_screenshot_now<S: Storage>(
    storage: &mut S,
    screen_dir: &str,
    source: &impl PixelSource,
) -> Result<String> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    capture_screenshot(storage, screen_dir, source, now)
}
