use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::ContentType;

/// Location of a decoded symbol in source-image pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Position {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<i32>,
    pub width: u32,
    pub height: u32,
}

impl Position {
    pub fn sized(width: u32, height: u32) -> Self {
        Self {
            x: None,
            y: None,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodedPayload {
    pub data: String,
    pub position: Position,
    /// Symbology reported by the decoder, e.g. `QRCODE`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub symbology: Option<String>,
}

impl DecodedPayload {
    pub fn new(data: impl Into<String>, position: Position) -> Self {
        Self {
            data: data.into(),
            position,
            symbology: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ScanMethod {
    CameraCapture,
    FileUpload,
    TextInput,
    #[serde(other)]
    Unknown,
}

impl ScanMethod {
    pub fn label(&self) -> &'static str {
        match self {
            ScanMethod::CameraCapture => "Camera",
            ScanMethod::FileUpload => "File Upload",
            ScanMethod::TextInput => "Text Input",
            ScanMethod::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedContent {
    pub data: String,
    pub position: Position,
    pub content_type: ContentType,
    pub description: String,
}

/// Ordered, classified output of one recognition request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub id: String,
    pub method: ScanMethod,
    pub produced_at: DateTime<Utc>,
    pub items: Vec<ClassifiedContent>,
}

impl ResultSet {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }
}
