use serde::Serialize;
use tokio::sync::broadcast;

use crate::camera::CameraStatus;
use crate::models::ResultSet;

const EVENT_CAPACITY: usize = 64;

/// Everything a presentation host needs to render the scanner.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum AppEvent {
    CameraStateChanged {
        status: CameraStatus,
    },
    PreviewReady {
        file_name: String,
        preview: String,
    },
    ResultsUpdated {
        results: ResultSet,
    },
    ResultsCleared,
    CodeDetected {
        count: usize,
    },
    NoCodesFound,
    ScanFailed {
        message: String,
    },
    DeviceLost,
}

impl AppEvent {
    pub fn name(&self) -> &'static str {
        match self {
            AppEvent::CameraStateChanged { .. } => "camera-state-changed",
            AppEvent::PreviewReady { .. } => "preview-ready",
            AppEvent::ResultsUpdated { .. } => "results-updated",
            AppEvent::ResultsCleared => "results-cleared",
            AppEvent::CodeDetected { .. } => "code-detected",
            AppEvent::NoCodesFound => "no-codes-found",
            AppEvent::ScanFailed { .. } => "scan-failed",
            AppEvent::DeviceLost => "device-lost",
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn emit(&self, event: AppEvent) {
        log::trace!("emit {}", event.name());
        // No subscribers is fine; nobody is rendering.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
