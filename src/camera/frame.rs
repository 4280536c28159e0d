use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::{ImageFormat, RgbImage};

use super::device::RawFrame;
use crate::error::{ScanError, ScanResult};
use crate::service::ImagePayload;

/// A still rasterized from the live stream.
#[derive(Debug, Clone)]
pub struct CapturedFrame {
    pub width: u32,
    pub height: u32,
    pub png: Arc<Vec<u8>>,
    pub captured_at: DateTime<Utc>,
}

impl CapturedFrame {
    pub fn into_payload(self) -> ImagePayload {
        ImagePayload::Frame { png: self.png }
    }
}

/// Encodes the frame as PNG. A frame without dimensions, or whose buffer does
/// not match them, is not ready yet.
pub fn rasterize(frame: &RawFrame) -> ScanResult<CapturedFrame> {
    if !frame.has_dimensions() {
        return Err(ScanError::FrameNotReady);
    }

    let image = RgbImage::from_raw(frame.width, frame.height, frame.rgb.as_ref().clone())
        .ok_or(ScanError::FrameNotReady)?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| {
            log::warn!("failed to encode {}x{} frame: {err}", frame.width, frame.height);
            ScanError::FrameNotReady
        })?;

    Ok(CapturedFrame {
        width: frame.width,
        height: frame.height,
        png: Arc::new(png),
        captured_at: Utc::now(),
    })
}
