use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use image::ImageFormat;
use log::{debug, info, warn};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::preview::render_preview;
use crate::error::{ScanError, ScanResult};
use crate::events::{AppEvent, EventBus};
use crate::models::{ResultSet, ScanMethod};
use crate::results::ResultBoard;
use crate::service::{ImagePayload, RecognitionRequest, Recognizer};

pub const MAX_UPLOAD_BYTES: u64 = 16 * 1024 * 1024;

pub const ACCEPTED_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/gif",
    "image/bmp",
    "image/webp",
];

/// A file handed over by the host, not yet validated.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StagedFile {
    pub id: String,
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub bytes: Arc<Vec<u8>>,
    pub staged_at: DateTime<Utc>,
}

impl StagedFile {
    fn payload(&self) -> ImagePayload {
        ImagePayload::File {
            file_name: self.name.clone(),
            media_type: self.media_type.clone(),
            bytes: Arc::clone(&self.bytes),
        }
    }
}

/// Type check first, then size.
pub fn validate(media_type: &str, size: u64) -> ScanResult<()> {
    if !ACCEPTED_TYPES.contains(&media_type) {
        return Err(ScanError::InvalidType(media_type.to_string()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(ScanError::TooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    Ok(())
}

/// Holds at most one staged file. A rejected file leaves the previous one in
/// place.
#[derive(Clone)]
pub struct FilePipeline {
    staged: Arc<Mutex<Option<StagedFile>>>,
    recognizer: Arc<dyn Recognizer>,
    results: ResultBoard,
    events: EventBus,
}

impl FilePipeline {
    pub fn new(recognizer: Arc<dyn Recognizer>, results: ResultBoard, events: EventBus) -> Self {
        Self {
            staged: Arc::new(Mutex::new(None)),
            recognizer,
            results,
            events,
        }
    }

    pub async fn accept(&self, file: IncomingFile) -> ScanResult<StagedFile> {
        let media_type = file.media_type.trim().to_ascii_lowercase();
        let size = file.bytes.len() as u64;
        if let Err(err) = validate(&media_type, size) {
            warn!("Rejected {}: {err}", file.name);
            return Err(err);
        }

        let staged = StagedFile {
            id: Uuid::new_v4().to_string(),
            name: file.name,
            media_type,
            size,
            bytes: Arc::new(file.bytes),
            staged_at: Utc::now(),
        };
        *self.staged.lock().await = Some(staged.clone());
        info!("Staged {} ({} bytes)", staged.name, staged.size);

        self.spawn_preview(&staged);
        Ok(staged)
    }

    /// Reads a file from disk. The size is checked before the contents are
    /// read; the media type comes from the extension.
    pub async fn accept_path(&self, path: &Path) -> ScanResult<StagedFile> {
        let media_type = ImageFormat::from_path(path)
            .map(|format| format.to_mime_type().to_string())
            .map_err(|_| ScanError::InvalidType(path.display().to_string()))?;

        let size = tokio::fs::metadata(path).await?.len();
        validate(&media_type, size)?;

        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        self.accept(IncomingFile {
            name,
            media_type,
            bytes,
        })
        .await
    }

    fn spawn_preview(&self, staged: &StagedFile) {
        let staged_id = staged.id.clone();
        let file_name = staged.name.clone();
        let bytes = Arc::clone(&staged.bytes);
        let slot = Arc::clone(&self.staged);
        let events = self.events.clone();

        tokio::spawn(async move {
            let rendered = tokio::task::spawn_blocking(move || render_preview(&bytes)).await;
            let preview = match rendered {
                Ok(Ok(preview)) => preview,
                Ok(Err(err)) => {
                    warn!("No preview for {file_name}: {err}");
                    return;
                }
                Err(err) => {
                    warn!("Preview task for {file_name} failed: {err}");
                    return;
                }
            };

            let still_staged = slot
                .lock()
                .await
                .as_ref()
                .is_some_and(|current| current.id == staged_id);
            if still_staged {
                events.emit(AppEvent::PreviewReady { file_name, preview });
            } else {
                debug!("dropping preview for replaced file {file_name}");
            }
        });
    }

    /// Submits the staged file for interactive recognition.
    pub async fn submit(&self) -> ScanResult<ResultSet> {
        let staged = self.staged.lock().await.clone();
        let Some(staged) = staged else {
            self.events.emit(AppEvent::ScanFailed {
                message: ScanError::NoFileStaged.to_string(),
            });
            return Err(ScanError::NoFileStaged);
        };

        info!("Scanning {}", staged.name);
        let request = RecognitionRequest::interactive(staged.payload());
        self.results
            .submit(self.recognizer.as_ref(), request, ScanMethod::FileUpload)
            .await
    }

    pub async fn current(&self) -> Option<StagedFile> {
        self.staged.lock().await.clone()
    }

    pub async fn clear(&self) {
        if let Some(previous) = self.staged.lock().await.take() {
            debug!("cleared staged file {}", previous.name);
        }
    }
}
