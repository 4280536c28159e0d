use std::io::Cursor;

use image::{GenericImageView, ImageFormat};

use crate::error::{ScanError, ScanResult};
use crate::service::types::data_url;

/// Longest edge of a rendered preview.
pub const PREVIEW_EDGE: u32 = 320;

/// Decodes the upload and renders a PNG thumbnail as a `data:` URL. Images
/// already within bounds are re-encoded at their own size.
pub fn render_preview(bytes: &[u8]) -> ScanResult<String> {
    let image = image::load_from_memory(bytes)
        .map_err(|err| ScanError::InvalidType(format!("unreadable image: {err}")))?;

    let (width, height) = image.dimensions();
    let image = if width > PREVIEW_EDGE || height > PREVIEW_EDGE {
        image.thumbnail(PREVIEW_EDGE, PREVIEW_EDGE)
    } else {
        image
    };

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| ScanError::InvalidType(format!("preview encoding failed: {err}")))?;

    Ok(data_url("image/png", &png))
}
