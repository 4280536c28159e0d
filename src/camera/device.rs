use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::{ScanError, ScanResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum FacingMode {
    /// Back camera on devices that have one.
    #[default]
    Environment,
    User,
}

/// Requested stream shape; backends treat the resolution as a target, not a
/// guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

impl Default for DeviceConstraints {
    fn default() -> Self {
        Self {
            facing: FacingMode::Environment,
            ideal_width: 640,
            ideal_height: 480,
        }
    }
}

/// Most recent decoded video frame, RGB24 row-major.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Arc<Vec<u8>>,
}

impl RawFrame {
    pub fn has_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackStatus {
    /// Granted, no frame yet.
    Waiting,
    Live,
    /// Stopped, revoked or failed.
    Ended,
}

/// An acquired video stream. Exclusively owned by the capture session.
pub trait VideoTrack: Send + Sync {
    fn latest_frame(&self) -> Option<RawFrame>;

    fn status(&self) -> watch::Receiver<TrackStatus>;

    /// Releases the underlying device. Must be safe to call more than once.
    fn stop(&mut self);
}

#[async_trait]
pub trait VideoSource: Send + Sync {
    async fn open(&self, constraints: &DeviceConstraints) -> ScanResult<Box<dyn VideoTrack>>;
}

/// Resolves once the track delivered its first frame.
pub async fn wait_until_live(
    mut status: watch::Receiver<TrackStatus>,
    timeout: Duration,
) -> ScanResult<()> {
    let wait = async {
        loop {
            match *status.borrow_and_update() {
                TrackStatus::Live => return Ok(()),
                TrackStatus::Ended => {
                    return Err(ScanError::DeviceUnavailable(
                        "camera stream ended before the first frame".into(),
                    ))
                }
                TrackStatus::Waiting => {}
            }
            if status.changed().await.is_err() {
                return Err(ScanError::DeviceUnavailable(
                    "camera stream closed before the first frame".into(),
                ));
            }
        }
    };

    tokio::time::timeout(timeout, wait).await.map_err(|_| {
        ScanError::DeviceUnavailable(format!(
            "no camera frame within {}ms",
            timeout.as_millis()
        ))
    })?
}
