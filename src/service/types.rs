use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::content::ContentInfo;
use crate::error::{ScanError, ScanResult};
use crate::models::{DecodedPayload, HistoryRecord, HistoryStats};

#[derive(Debug, Clone)]
pub enum ImagePayload {
    /// PNG still rasterized from the live camera.
    Frame { png: Arc<Vec<u8>> },
    /// User-selected file, sent as-is.
    File {
        file_name: String,
        media_type: String,
        bytes: Arc<Vec<u8>>,
    },
}

impl ImagePayload {
    pub fn len(&self) -> usize {
        match self {
            ImagePayload::Frame { png } => png.len(),
            ImagePayload::File { bytes, .. } => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct RecognitionRequest {
    pub image: ImagePayload,
    /// Whether failures and progress are shown to the user.
    pub interactive: bool,
}

impl RecognitionRequest {
    pub fn background(image: ImagePayload) -> Self {
        Self {
            image,
            interactive: false,
        }
    }

    pub fn interactive(image: ImagePayload) -> Self {
        Self {
            image,
            interactive: true,
        }
    }
}

pub fn data_url(media_type: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", media_type, STANDARD.encode(bytes))
}

/// Decodes the base64 body of a `data:` URL; a bare base64 string is accepted
/// too.
pub fn decode_data_url(url: &str) -> ScanResult<Vec<u8>> {
    let encoded = match url.split_once(',') {
        Some((header, body)) if header.starts_with("data:") => body,
        Some(_) => return Err(ScanError::service("malformed data URL")),
        None => url,
    };
    STANDARD
        .decode(encoded.trim())
        .map_err(|err| ScanError::service(format!("invalid base64 image: {err}")))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum ErrorCorrection {
    L,
    #[default]
    M,
    Q,
    H,
}

impl std::str::FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "L" => Ok(ErrorCorrection::L),
            "M" => Ok(ErrorCorrection::M),
            "Q" => Ok(ErrorCorrection::Q),
            "H" => Ok(ErrorCorrection::H),
            other => Err(format!("unknown error correction level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GenerateOptions {
    pub size: [u32; 2],
    pub border: u32,
    pub error_correction: ErrorCorrection,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            size: [300, 300],
            border: 4,
            error_correction: ErrorCorrection::M,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub text: &'a str,
    #[serde(flatten)]
    pub options: &'a GenerateOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedCode {
    /// PNG as a `data:` URL.
    pub image: String,
    pub size: [u32; 2],
}

impl GeneratedCode {
    pub fn png_bytes(&self) -> ScanResult<Vec<u8>> {
        decode_data_url(&self.image)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScanReply {
    #[serde(default)]
    pub results: Vec<DecodedPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateReply {
    pub qr_code: GeneratedCode,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InfoReply {
    pub info: ContentInfo,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryReply {
    #[serde(default)]
    pub history: Vec<HistoryRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatsReply {
    pub stats: HistoryStats,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageReply {
    #[serde(default)]
    pub message: Option<String>,
}
