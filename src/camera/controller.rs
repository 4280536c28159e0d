use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_util::sync::CancellationToken;

use super::device::{wait_until_live, TrackStatus, VideoSource, VideoTrack};
use super::environment::{Environment, EnvironmentSignal};
use super::frame::{rasterize, CapturedFrame};
use super::sampler::FrameSampler;
use super::state::{CameraSnapshot, CameraState, CameraStatus, CaptureSession};
use crate::error::{ScanError, ScanResult};
use crate::events::{AppEvent, EventBus};
use crate::models::{DecodedPayload, ResultSet, ScanMethod};
use crate::results::{aggregate, ResultBoard};
use crate::service::{RecognitionRequest, Recognizer};
use crate::settings::CameraSettings;

/// Settle time after the host becomes visible before sampling resumes.
const RESUME_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// Start while not idle is a no-op.
    AlreadyRunning(CameraStatus),
    /// A stop arrived while the device was being acquired.
    Cancelled,
}

/// Owns the camera lifecycle: acquisition, background sampling, manual
/// capture and release. At most one device is held at a time.
#[derive(Clone)]
pub struct CameraController {
    state: Arc<Mutex<CameraState>>,
    source: Arc<dyn VideoSource>,
    recognizer: Arc<dyn Recognizer>,
    results: ResultBoard,
    events: EventBus,
    environment: Environment,
    settings: CameraSettings,
}

impl CameraController {
    pub fn new(
        source: Arc<dyn VideoSource>,
        recognizer: Arc<dyn Recognizer>,
        results: ResultBoard,
        events: EventBus,
        environment: Environment,
        settings: CameraSettings,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(CameraState::new())),
            source,
            recognizer,
            results,
            events,
            environment,
            settings,
        }
    }

    pub(super) fn recognizer(&self) -> &Arc<dyn Recognizer> {
        &self.recognizer
    }

    pub async fn status(&self) -> CameraStatus {
        self.state.lock().await.status
    }

    pub async fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot::from(&*self.state.lock().await)
    }

    pub async fn has_device(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Acquires the device and begins background sampling.
    pub async fn start(&self) -> ScanResult<StartOutcome> {
        let generation = {
            let mut state = self.state.lock().await;
            if state.status != CameraStatus::Idle {
                debug!("camera start ignored while {:?}", state.status);
                return Ok(StartOutcome::AlreadyRunning(state.status));
            }
            state.generation += 1;
            self.set_status(&mut state, CameraStatus::Starting);
            state.generation
        };
        // Listen from the start so signals raised during acquisition count.
        let mut signals = self.environment.subscribe();

        let acquired = self.acquire().await;

        let mut state = self.state.lock().await;
        if state.generation != generation || state.status != CameraStatus::Starting {
            drop(state);
            if let Ok(mut track) = acquired {
                track.stop();
            }
            info!("Camera start cancelled by stop");
            return Ok(StartOutcome::Cancelled);
        }

        let pending = PendingSignals::drain(&mut signals);
        if pending.teardown {
            if let Ok(mut track) = acquired {
                track.stop();
            }
            self.set_status(&mut state, CameraStatus::Stopping);
            drop(state.release());
            self.set_status(&mut state, CameraStatus::Idle);
            info!("Camera start cancelled by teardown");
            return Ok(StartOutcome::Cancelled);
        }

        let track = match acquired {
            Ok(track) => track,
            Err(err) => {
                self.set_status(&mut state, CameraStatus::Idle);
                warn!("Camera unavailable: {err}");
                return Err(err);
            }
        };

        let subscription = CancellationToken::new();
        let session = CaptureSession::new(track, subscription.clone());
        let session_id = session.id.clone();
        let track_status = session.track_status();
        state.session = Some(session);
        self.set_status(&mut state, CameraStatus::Active);

        tokio::spawn(watch_session(
            self.clone(),
            generation,
            signals,
            track_status,
            subscription,
        ));

        if pending.hidden {
            info!("Camera session {session_id} started while hidden, sampling deferred");
        } else {
            self.begin_sampling(&mut state);
            info!("Camera session {session_id} started");
        }
        Ok(StartOutcome::Started)
    }

    async fn acquire(&self) -> ScanResult<Box<dyn VideoTrack>> {
        let mut track = self.source.open(&self.settings.constraints()).await?;
        if let Err(err) = wait_until_live(track.status(), self.settings.ready_timeout()).await {
            track.stop();
            return Err(err);
        }
        Ok(track)
    }

    /// Releases the device. Safe to call in any state, any number of times.
    /// Returns whether anything was running.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.status == CameraStatus::Idle {
            return false;
        }

        self.set_status(&mut state, CameraStatus::Stopping);
        let session = state.release();
        let session_id = session.as_ref().map(|s| s.id.clone());
        drop(session);
        self.set_status(&mut state, CameraStatus::Idle);

        match session_id {
            Some(id) => info!("Camera session {id} stopped"),
            None => info!("Camera start aborted"),
        }
        true
    }

    /// Re-enters background sampling after a detection. Returns false when
    /// already sampling.
    pub async fn scan(&self) -> ScanResult<bool> {
        let mut state = self.state.lock().await;
        match state.status {
            CameraStatus::Scanning => Ok(false),
            CameraStatus::Active if state.session.is_some() => {
                state.cancel_resume();
                self.begin_sampling(&mut state);
                Ok(true)
            }
            _ => Err(ScanError::CameraInactive),
        }
    }

    /// Rasterizes the current frame.
    pub async fn capture_frame(&self) -> ScanResult<CapturedFrame> {
        let frame = {
            let state = self.state.lock().await;
            if !state.status.holds_device() {
                return Err(ScanError::CameraInactive);
            }
            state.session.as_ref().and_then(|s| s.latest_frame())
        };

        let frame = frame.ok_or(ScanError::FrameNotReady)?;
        tokio::task::spawn_blocking(move || rasterize(&frame))
            .await
            .map_err(|err| {
                warn!("frame encoding task failed: {err}");
                ScanError::FrameNotReady
            })?
    }

    /// Manual capture: grabs the current frame and runs it through the
    /// interactive recognition path. Background sampling is left alone.
    pub async fn capture_and_scan(&self) -> ScanResult<ResultSet> {
        let frame = match self.capture_frame().await {
            Ok(frame) => frame,
            Err(err) => {
                self.events.emit(AppEvent::ScanFailed {
                    message: err.to_string(),
                });
                return Err(err);
            }
        };

        let request = RecognitionRequest::interactive(frame.into_payload());
        self.results
            .submit(self.recognizer.as_ref(), request, ScanMethod::CameraCapture)
            .await
    }

    /// Reacts to host lifecycle changes. Called by the session's listener,
    /// but hosts may also call it directly.
    pub async fn handle_signal(&self, signal: EnvironmentSignal) {
        match signal {
            EnvironmentSignal::Hidden => {
                let mut state = self.state.lock().await;
                state.cancel_resume();
                if state.status == CameraStatus::Scanning {
                    self.suspend_sampling(&mut state);
                    info!("Host hidden, sampling suspended");
                }
            }
            EnvironmentSignal::Visible => {
                let mut state = self.state.lock().await;
                if state.status != CameraStatus::Active || state.session.is_none() {
                    return;
                }
                let generation = state.generation;
                let controller = self.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(RESUME_DELAY).await;
                    controller.resume_after_settle(generation).await;
                });
                state.set_pending_resume(handle);
                debug!("sampling resumes in {}ms", RESUME_DELAY.as_millis());
            }
            EnvironmentSignal::Teardown => {
                if self.stop().await {
                    info!("Camera released on teardown");
                }
            }
        }
    }

    async fn resume_after_settle(&self, generation: u64) {
        let mut state = self.state.lock().await;
        state.clear_pending_resume();
        if state.generation != generation
            || state.status != CameraStatus::Active
            || state.session.is_none()
        {
            return;
        }
        self.begin_sampling(&mut state);
        info!("Sampling resumed");
    }

    /// First non-empty background result wins; anything from an older sampler
    /// run, or arriving after a stop, is dropped.
    ///
    /// The state lock is held through publishing so a concurrent stop either
    /// precedes the check or follows the publish.
    pub(super) async fn apply_detection(&self, run_id: u64, payloads: Vec<DecodedPayload>) {
        let mut state = self.state.lock().await;
        let current_run = state.session.as_ref().and_then(|s| s.sampler_run());
        if state.status != CameraStatus::Scanning || current_run != Some(run_id) {
            debug!("discarding late detection from sampler run {run_id}");
            return;
        }
        self.suspend_sampling(&mut state);

        let results = aggregate(payloads, ScanMethod::CameraCapture);
        let count = results.len();
        self.results.publish_detection(results).await;
        self.events.emit(AppEvent::CodeDetected { count });
        info!("Detected {count} code(s), sampling paused");
    }

    async fn release_lost_device(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if state.generation != generation || state.session.is_none() {
            return;
        }
        warn!("Camera track ended unexpectedly, releasing device");
        self.set_status(&mut state, CameraStatus::Stopping);
        drop(state.release());
        self.set_status(&mut state, CameraStatus::Idle);
        self.events.emit(AppEvent::DeviceLost);
    }

    fn begin_sampling(&self, state: &mut CameraState) {
        let Some(session) = state.session.as_mut() else {
            return;
        };
        state.sampler_runs += 1;
        let sampler = FrameSampler::spawn(self.clone(), state.sampler_runs);
        if let Some(previous) = session.sampler.replace(sampler) {
            previous.stop();
        }
        self.set_status(state, CameraStatus::Scanning);
    }

    fn suspend_sampling(&self, state: &mut CameraState) {
        if let Some(sampler) = state.session.as_mut().and_then(|s| s.sampler.take()) {
            sampler.stop();
        }
        self.set_status(state, CameraStatus::Active);
    }

    fn set_status(&self, state: &mut CameraState, status: CameraStatus) {
        if state.status == status {
            return;
        }
        debug!("camera {:?} -> {:?}", state.status, status);
        state.status = status;
        self.events.emit(AppEvent::CameraStateChanged { status });
    }
}

/// Host signals raised while the device was being acquired.
#[derive(Debug, Default)]
struct PendingSignals {
    teardown: bool,
    hidden: bool,
}

impl PendingSignals {
    fn drain(signals: &mut broadcast::Receiver<EnvironmentSignal>) -> Self {
        let mut pending = Self::default();
        loop {
            match signals.try_recv() {
                Ok(EnvironmentSignal::Teardown) => pending.teardown = true,
                Ok(EnvironmentSignal::Hidden) => pending.hidden = true,
                Ok(EnvironmentSignal::Visible) => pending.hidden = false,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("missed {skipped} environment signal(s) while starting");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        pending
    }
}

/// Per-session listener for host signals and device revocation. Ends with the
/// session.
async fn watch_session(
    controller: CameraController,
    generation: u64,
    mut signals: broadcast::Receiver<EnvironmentSignal>,
    mut track_status: watch::Receiver<TrackStatus>,
    subscription: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = subscription.cancelled() => break,
            changed = track_status.changed() => {
                if changed.is_err() || *track_status.borrow_and_update() == TrackStatus::Ended {
                    controller.release_lost_device(generation).await;
                    break;
                }
            }
            signal = signals.recv() => match signal {
                Ok(signal) => controller.handle_signal(signal).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("missed {skipped} environment signal(s)");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
    debug!("session listener for generation {generation} exited");
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::sleep;

    use super::*;
    use crate::test_support::{payload, DelayedRecognizer, FakeSource, ScriptedRecognizer};

    struct Rig {
        camera: CameraController,
        source: FakeSource,
        recognizer: Arc<ScriptedRecognizer>,
        results: ResultBoard,
        events: EventBus,
        environment: Environment,
    }

    fn rig(source: FakeSource) -> Rig {
        let events = EventBus::new();
        let results = ResultBoard::new(events.clone());
        let environment = Environment::new();
        let recognizer = Arc::new(ScriptedRecognizer::new());
        let camera = CameraController::new(
            Arc::new(source.clone()),
            recognizer.clone(),
            results.clone(),
            events.clone(),
            environment.clone(),
            CameraSettings::default(),
        );
        Rig {
            camera,
            source,
            recognizer,
            results,
            events,
            environment,
        }
    }

    fn drain(rx: &mut broadcast::Receiver<AppEvent>) -> Vec<&'static str> {
        let mut names = Vec::new();
        while let Ok(event) = rx.try_recv() {
            names.push(event.name());
        }
        names
    }

    #[tokio::test(start_paused = true)]
    async fn first_detection_pauses_sampling() {
        let rig = rig(FakeSource::live());
        rig.recognizer.push_empty(3);
        rig.recognizer.push_ok(vec![payload("https://example.com")]);

        assert_eq!(rig.camera.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);

        sleep(Duration::from_millis(2100)).await;

        assert_eq!(rig.camera.status().await, CameraStatus::Active);
        assert!(rig.camera.has_device().await);
        assert_eq!(rig.source.released(), 0);
        assert_eq!(rig.recognizer.calls(), 4);
        assert!(rig.recognizer.interactive_flags().iter().all(|flag| !flag));

        let shown = rig.results.current().await.unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown.items[0].description, "Website URL");
        assert_eq!(shown.method, ScanMethod::CameraCapture);

        // No further probes once paused.
        sleep(Duration::from_secs(3)).await;
        assert_eq!(rig.recognizer.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn first_tick_waits_one_period() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();

        sleep(Duration::from_millis(499)).await;
        assert_eq!(rig.recognizer.calls(), 0);
        sleep(Duration::from_millis(2)).await;
        assert_eq!(rig.recognizer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_frame_skips_tick() {
        let rig = rig(FakeSource::live().without_frames());
        rig.camera.start().await.unwrap();

        sleep(Duration::from_millis(1600)).await;
        assert_eq!(rig.recognizer.calls(), 0);
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let rig = rig(FakeSource::live());
        let mut rx = rig.events.subscribe();
        rig.camera.start().await.unwrap();

        assert!(rig.camera.stop().await);
        assert!(!rig.camera.stop().await);

        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert!(!rig.camera.has_device().await);
        assert_eq!(rig.source.released(), 1);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(rig.recognizer.calls(), 0);

        let changes = drain(&mut rx)
            .into_iter()
            .filter(|name| *name == "camera-state-changed")
            .count();
        // starting, active, scanning, stopping, idle
        assert_eq!(changes, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_running_is_noop() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();

        let outcome = rig.camera.start().await.unwrap();
        assert_eq!(outcome, StartOutcome::AlreadyRunning(CameraStatus::Scanning));
        assert_eq!(rig.source.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_device_returns_to_idle() {
        let rig = rig(FakeSource::denying("Permission denied"));

        let err = rig.camera.start().await.unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
        assert!(err.to_string().contains("Permission denied"));
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert!(!rig.camera.has_device().await);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_device_times_out_and_is_released() {
        let rig = rig(FakeSource::silent());

        let err = rig.camera.start().await.unwrap_err();
        assert!(matches!(err, ScanError::DeviceUnavailable(_)));
        assert_eq!(rig.source.opened(), 1);
        assert_eq!(rig.source.released(), 1);
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_start_wins() {
        let rig = rig(FakeSource::live().with_open_delay(Duration::from_millis(300)));

        let camera = rig.camera.clone();
        let starting = tokio::spawn(async move { camera.start().await });
        sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Starting);

        assert!(rig.camera.stop().await);
        let outcome = starting.await.unwrap().unwrap();

        assert_eq!(outcome, StartOutcome::Cancelled);
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert_eq!(rig.source.opened(), 1);
        assert_eq!(rig.source.released(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_during_start_releases_grant() {
        let rig = rig(FakeSource::live().with_open_delay(Duration::from_millis(300)));

        let camera = rig.camera.clone();
        let starting = tokio::spawn(async move { camera.start().await });
        sleep(Duration::from_millis(100)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Starting);

        rig.environment.signal(EnvironmentSignal::Teardown);
        let outcome = starting.await.unwrap().unwrap();

        assert_eq!(outcome, StartOutcome::Cancelled);
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert!(!rig.camera.has_device().await);
        assert_eq!(rig.source.opened(), 1);
        assert_eq!(rig.source.released(), 1);
        assert_eq!(rig.environment.listeners(), 0);

        sleep(Duration::from_secs(2)).await;
        assert_eq!(rig.recognizer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_during_start_defers_sampling() {
        let rig = rig(FakeSource::live().with_open_delay(Duration::from_millis(300)));

        let camera = rig.camera.clone();
        let starting = tokio::spawn(async move { camera.start().await });
        sleep(Duration::from_millis(100)).await;
        rig.environment.signal(EnvironmentSignal::Hidden);

        assert_eq!(starting.await.unwrap().unwrap(), StartOutcome::Started);
        assert_eq!(rig.camera.status().await, CameraStatus::Active);
        assert!(rig.camera.has_device().await);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(rig.recognizer.calls(), 0);

        rig.environment.signal(EnvironmentSignal::Visible);
        sleep(Duration::from_millis(1010)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_probes_apply_first_detection_only() {
        let events = EventBus::new();
        let results = ResultBoard::new(events.clone());
        let recognizer = Arc::new(DelayedRecognizer::new(Duration::from_millis(700)));
        recognizer.push_ok(vec![payload("first")]);
        recognizer.push_ok(vec![payload("second")]);
        let camera = CameraController::new(
            Arc::new(FakeSource::live()),
            recognizer.clone(),
            results.clone(),
            events.clone(),
            Environment::new(),
            CameraSettings::default(),
        );
        let mut rx = events.subscribe();

        camera.start().await.unwrap();
        // Probes leave at 500 and 1000 ms; the first reply lands at 1200 ms.
        sleep(Duration::from_millis(1100)).await;
        assert_eq!(recognizer.calls(), 2);
        assert_eq!(camera.status().await, CameraStatus::Scanning);

        sleep(Duration::from_millis(1400)).await;
        assert_eq!(recognizer.calls(), 2);
        assert_eq!(camera.status().await, CameraStatus::Active);
        assert_eq!(results.current().await.unwrap().items[0].data, "first");

        let names = drain(&mut rx);
        let count = |wanted: &str| names.iter().filter(|name| **name == wanted).count();
        assert_eq!(count("results-updated"), 1);
        assert_eq!(count("code-detected"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_follows_detection_in_progress() {
        let rig = rig(FakeSource::live());
        let mut rx = rig.events.subscribe();
        rig.camera.start().await.unwrap();

        let detecting = tokio::spawn({
            let camera = rig.camera.clone();
            async move { camera.apply_detection(1, vec![payload("hit")]).await }
        });
        let stopping = tokio::spawn({
            let camera = rig.camera.clone();
            async move { camera.stop().await }
        });
        detecting.await.unwrap();
        assert!(stopping.await.unwrap());

        let names = drain(&mut rx);
        let position = |wanted: &str| names.iter().position(|name| *name == wanted);
        let detected = position("code-detected").unwrap();
        let updated = position("results-updated").unwrap();
        let last_change = names
            .iter()
            .rposition(|name| *name == "camera-state-changed")
            .unwrap();
        assert!(updated < detected);
        // Stopping and idle are both announced after the detection.
        assert!(detected < last_change - 1);
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_then_visible_resumes_after_delay() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();

        rig.environment.signal(EnvironmentSignal::Hidden);
        sleep(Duration::from_millis(10)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Active);
        assert!(rig.camera.has_device().await);

        rig.environment.signal(EnvironmentSignal::Visible);
        sleep(Duration::from_millis(990)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Active);

        sleep(Duration::from_millis(20)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
        assert_eq!(rig.source.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hidden_cancels_pending_resume() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();

        rig.camera.handle_signal(EnvironmentSignal::Hidden).await;
        rig.camera.handle_signal(EnvironmentSignal::Visible).await;
        assert!(rig.camera.snapshot().await.resume_pending);
        sleep(Duration::from_millis(500)).await;
        rig.camera.handle_signal(EnvironmentSignal::Hidden).await;

        sleep(Duration::from_secs(2)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Active);
    }

    #[tokio::test(start_paused = true)]
    async fn visible_resumes_after_detection() {
        let rig = rig(FakeSource::live());
        rig.recognizer.push_ok(vec![payload("hello")]);
        rig.camera.start().await.unwrap();

        sleep(Duration::from_millis(600)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Active);

        rig.camera.handle_signal(EnvironmentSignal::Visible).await;
        sleep(Duration::from_millis(1001)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_releases_device() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();
        assert_eq!(rig.environment.listeners(), 1);

        rig.environment.signal(EnvironmentSignal::Teardown);
        sleep(Duration::from_millis(10)).await;

        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert_eq!(rig.source.released(), 1);
        assert_eq!(rig.environment.listeners(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn revoked_track_forces_idle() {
        let rig = rig(FakeSource::live());
        let mut rx = rig.events.subscribe();
        rig.camera.start().await.unwrap();

        rig.source.end_latest_track();
        sleep(Duration::from_millis(10)).await;

        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
        assert!(!rig.camera.has_device().await);
        assert!(drain(&mut rx).contains(&"device-lost"));

        // A fresh start acquires a new device.
        assert_eq!(rig.camera.start().await.unwrap(), StartOutcome::Started);
        assert_eq!(rig.source.opened(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn scan_reenters_sampling() {
        let rig = rig(FakeSource::live());
        rig.recognizer.push_ok(vec![payload("first")]);
        rig.camera.start().await.unwrap();
        assert!(!rig.camera.scan().await.unwrap());

        sleep(Duration::from_millis(600)).await;
        assert_eq!(rig.camera.status().await, CameraStatus::Active);

        assert!(rig.camera.scan().await.unwrap());
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
        sleep(Duration::from_millis(600)).await;
        assert_eq!(rig.recognizer.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn capture_requires_running_camera() {
        let rig = rig(FakeSource::live());
        assert!(matches!(
            rig.camera.capture_frame().await,
            Err(ScanError::CameraInactive)
        ));
        assert!(matches!(rig.camera.scan().await, Err(ScanError::CameraInactive)));
    }

    #[tokio::test(start_paused = true)]
    async fn manual_capture_is_interactive() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();
        rig.recognizer
            .push_ok(vec![payload("mailto:someone@example.com")]);

        let results = rig.camera.capture_and_scan().await.unwrap();

        assert_eq!(results.items[0].description, "Email Address");
        assert_eq!(rig.recognizer.interactive_flags(), vec![true]);
        assert_eq!(rig.camera.status().await, CameraStatus::Scanning);
    }

    #[tokio::test(start_paused = true)]
    async fn detection_after_stop_is_discarded() {
        let rig = rig(FakeSource::live());
        rig.camera.start().await.unwrap();
        rig.camera.stop().await;

        rig.camera.apply_detection(1, vec![payload("late")]).await;

        assert!(rig.results.current().await.is_none());
        assert_eq!(rig.camera.status().await, CameraStatus::Idle);
    }
}
