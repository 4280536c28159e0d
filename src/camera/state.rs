use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::device::{RawFrame, TrackStatus, VideoTrack};
use super::sampler::FrameSampler;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum CameraStatus {
    #[default]
    Idle,
    Starting,
    Active,
    Scanning,
    Stopping,
}

impl CameraStatus {
    pub fn holds_device(&self) -> bool {
        matches!(self, CameraStatus::Active | CameraStatus::Scanning)
    }
}

/// One lifetime of an acquired device.
///
/// Dropping the session is the release path: the sampler is cancelled, the
/// environment subscription torn down and the track stopped, whichever way the
/// session ends.
pub struct CaptureSession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    track: Box<dyn VideoTrack>,
    pub(super) sampler: Option<FrameSampler>,
    subscription: CancellationToken,
}

impl CaptureSession {
    pub(super) fn new(track: Box<dyn VideoTrack>, subscription: CancellationToken) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            track,
            sampler: None,
            subscription,
        }
    }

    pub fn latest_frame(&self) -> Option<RawFrame> {
        self.track.latest_frame()
    }

    pub fn track_status(&self) -> watch::Receiver<TrackStatus> {
        self.track.status()
    }

    pub(super) fn sampler_run(&self) -> Option<u64> {
        self.sampler.as_ref().map(FrameSampler::run_id)
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            sampler.stop();
        }
        self.subscription.cancel();
        self.track.stop();
    }
}

#[derive(Default)]
pub struct CameraState {
    pub status: CameraStatus,
    /// Bumped on every start and every release; lets late async work detect
    /// that the session it belonged to is gone.
    pub generation: u64,
    pub session: Option<CaptureSession>,
    pub sampler_runs: u64,
    resume: Option<JoinHandle<()>>,
}

impl CameraState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_pending_resume(&mut self, handle: JoinHandle<()>) {
        self.cancel_resume();
        self.resume = Some(handle);
    }

    pub fn clear_pending_resume(&mut self) {
        self.resume = None;
    }

    pub fn cancel_resume(&mut self) {
        if let Some(handle) = self.resume.take() {
            handle.abort();
        }
    }

    pub fn has_pending_resume(&self) -> bool {
        self.resume.is_some()
    }

    /// Detaches the session; the caller drops it to release the device.
    pub fn release(&mut self) -> Option<CaptureSession> {
        self.cancel_resume();
        self.generation += 1;
        self.session.take()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraSnapshot {
    pub status: CameraStatus,
    pub session_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub resume_pending: bool,
}

impl From<&CameraState> for CameraSnapshot {
    fn from(state: &CameraState) -> Self {
        Self {
            status: state.status,
            session_id: state.session.as_ref().map(|s| s.id.clone()),
            started_at: state.session.as_ref().map(|s| s.started_at),
            resume_pending: state.has_pending_resume(),
        }
    }
}
