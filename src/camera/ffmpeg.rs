//! Camera backend that reads raw frames from an `ffmpeg` subprocess.
//!
//! ffmpeg grabs from a V4L2 device, scales to the requested resolution and
//! writes RGB24 frames back to back on stdout. A blocking reader keeps only the
//! most recent frame; the sampler never needs history.

use std::io::Read;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::sync::watch;

use super::device::{DeviceConstraints, RawFrame, TrackStatus, VideoSource, VideoTrack};
use crate::error::{ScanError, ScanResult};

pub struct FfmpegSource {
    program: String,
    device: String,
}

impl FfmpegSource {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            program: "ffmpeg".into(),
            device: device.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn args(&self, constraints: &DeviceConstraints) -> Vec<String> {
        let size = format!("{}x{}", constraints.ideal_width, constraints.ideal_height);
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "v4l2".into(),
            "-video_size".into(),
            size,
            "-i".into(),
            self.device.clone(),
            // The device may ignore -video_size; scaling pins the frame size.
            "-vf".into(),
            format!(
                "scale={}:{}",
                constraints.ideal_width, constraints.ideal_height
            ),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-f".into(),
            "rawvideo".into(),
            "-".into(),
        ]
    }
}

#[async_trait]
impl VideoSource for FfmpegSource {
    async fn open(&self, constraints: &DeviceConstraints) -> ScanResult<Box<dyn VideoTrack>> {
        if constraints.ideal_width == 0 || constraints.ideal_height == 0 {
            return Err(ScanError::DeviceUnavailable(
                "requested resolution has a zero dimension".into(),
            ));
        }

        let args = self.args(constraints);
        info!(
            "Opening camera {} at {}x{} ({:?} facing requested)",
            self.device, constraints.ideal_width, constraints.ideal_height, constraints.facing
        );
        debug!("{} args: {:?}", self.program, args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| {
                ScanError::DeviceUnavailable(format!("failed to launch {}: {err}", self.program))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            ScanError::DeviceUnavailable(format!("no stdout from {}", self.program))
        })?;

        let latest = Arc::new(Mutex::new(None));
        let (status_tx, status_rx) = watch::channel(TrackStatus::Waiting);
        let (width, height) = (constraints.ideal_width, constraints.ideal_height);
        let reader_slot = Arc::clone(&latest);
        tokio::task::spawn_blocking(move || {
            read_frames(stdout, width, height, reader_slot, status_tx);
        });

        Ok(Box::new(FfmpegTrack {
            child: Some(child),
            latest,
            status: status_rx,
        }))
    }
}

fn read_frames(
    mut stdout: ChildStdout,
    width: u32,
    height: u32,
    slot: Arc<Mutex<Option<RawFrame>>>,
    status: watch::Sender<TrackStatus>,
) {
    let frame_len = width as usize * height as usize * 3;
    let mut frames: u64 = 0;

    loop {
        let mut buf = vec![0u8; frame_len];
        if let Err(err) = stdout.read_exact(&mut buf) {
            debug!("camera stream closed after {frames} frames: {err}");
            break;
        }

        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(RawFrame {
            width,
            height,
            rgb: Arc::new(buf),
        });
        frames += 1;
        if frames == 1 {
            let _ = status.send(TrackStatus::Live);
        }
    }

    let _ = status.send(TrackStatus::Ended);
}

struct FfmpegTrack {
    child: Option<Child>,
    latest: Arc<Mutex<Option<RawFrame>>>,
    status: watch::Receiver<TrackStatus>,
}

impl VideoTrack for FfmpegTrack {
    fn latest_frame(&self) -> Option<RawFrame> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn status(&self) -> watch::Receiver<TrackStatus> {
        self.status.clone()
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                warn!("failed to kill camera process: {err}");
            }
            let _ = child.wait();
            info!("Camera released");
        }
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl Drop for FfmpegTrack {
    fn drop(&mut self) {
        self.stop();
    }
}
