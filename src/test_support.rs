//! Scripted camera and recognizer fakes shared by unit tests.

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::camera::{DeviceConstraints, RawFrame, TrackStatus, VideoSource, VideoTrack};
use crate::error::{ScanError, ScanResult};
use crate::models::{DecodedPayload, Position};
use crate::service::{RecognitionRequest, Recognizer};

pub fn test_frame() -> RawFrame {
    RawFrame {
        width: 4,
        height: 4,
        rgb: Arc::new(vec![200; 4 * 4 * 3]),
    }
}

pub fn payload(data: &str) -> DecodedPayload {
    DecodedPayload::new(data, Position::sized(120, 120))
}

/// Camera double. Every opened track shares the counters, so tests can assert
/// on acquisitions and releases.
#[derive(Clone, Default)]
pub struct FakeSource {
    opened: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    deny: Option<String>,
    open_delay: Option<Duration>,
    never_live: bool,
    frame: Option<RawFrame>,
    senders: Arc<Mutex<Vec<watch::Sender<TrackStatus>>>>,
}

impl FakeSource {
    pub fn live() -> Self {
        Self {
            frame: Some(test_frame()),
            ..Self::default()
        }
    }

    pub fn denying(reason: &str) -> Self {
        Self {
            deny: Some(reason.to_string()),
            ..Self::default()
        }
    }

    /// Grants the device but never produces a frame.
    pub fn silent() -> Self {
        Self {
            never_live: true,
            ..Self::default()
        }
    }

    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = Some(delay);
        self
    }

    pub fn without_frames(mut self) -> Self {
        self.frame = None;
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    /// Simulates the device being revoked underneath the newest track.
    pub fn end_latest_track(&self) {
        if let Some(tx) = self.senders.lock().unwrap().last() {
            tx.send_replace(TrackStatus::Ended);
        }
    }
}

#[async_trait]
impl VideoSource for FakeSource {
    async fn open(&self, _constraints: &DeviceConstraints) -> ScanResult<Box<dyn VideoTrack>> {
        if let Some(delay) = self.open_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = &self.deny {
            return Err(ScanError::DeviceUnavailable(reason.clone()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        let initial = if self.never_live {
            TrackStatus::Waiting
        } else {
            TrackStatus::Live
        };
        let (tx, rx) = watch::channel(initial);
        self.senders.lock().unwrap().push(tx);

        Ok(Box::new(FakeTrack {
            frame: self.frame.clone(),
            status: rx,
            released: Arc::clone(&self.released),
            stopped: false,
        }))
    }
}

struct FakeTrack {
    frame: Option<RawFrame>,
    status: watch::Receiver<TrackStatus>,
    released: Arc<AtomicUsize>,
    stopped: bool,
}

impl VideoTrack for FakeTrack {
    fn latest_frame(&self) -> Option<RawFrame> {
        if self.stopped {
            None
        } else {
            self.frame.clone()
        }
    }

    fn status(&self) -> watch::Receiver<TrackStatus> {
        self.status.clone()
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Recognizer that replays queued replies, then answers with no codes.
#[derive(Default)]
pub struct ScriptedRecognizer {
    replies: Mutex<VecDeque<ScanResult<Vec<DecodedPayload>>>>,
    requests: Mutex<Vec<bool>>,
    calls: AtomicUsize,
}

impl ScriptedRecognizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, payloads: Vec<DecodedPayload>) {
        self.replies.lock().unwrap().push_back(Ok(payloads));
    }

    pub fn push_empty(&self, times: usize) {
        for _ in 0..times {
            self.push_ok(Vec::new());
        }
    }

    pub fn push_err(&self, err: ScanError) {
        self.replies.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn interactive_flags(&self) -> Vec<bool> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> ScanResult<Vec<DecodedPayload>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.interactive);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

/// Scripted recognizer whose replies take `delay` to come back. The reply is
/// chosen when the request arrives.
pub struct DelayedRecognizer {
    script: ScriptedRecognizer,
    delay: Duration,
}

impl DelayedRecognizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            script: ScriptedRecognizer::new(),
            delay,
        }
    }
}

impl Deref for DelayedRecognizer {
    type Target = ScriptedRecognizer;

    fn deref(&self) -> &Self::Target {
        &self.script
    }
}

#[async_trait]
impl Recognizer for DelayedRecognizer {
    async fn recognize(&self, request: &RecognitionRequest) -> ScanResult<Vec<DecodedPayload>> {
        let reply = self.script.recognize(request).await;
        tokio::time::sleep(self.delay).await;
        reply
    }
}
