use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::CameraController;
use super::frame::CapturedFrame;
use crate::error::ScanError;
use crate::service::RecognitionRequest;

// Set to false to silence the per-tick chatter.
const ENABLE_LOGS: bool = true;

/// Time between background probes of the live stream.
pub(super) const SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

use crate::{log_debug, log_info, log_warn};

/// Periodic background probe of the live stream.
///
/// Ticks are not gated on earlier round trips; overlapping requests are fine
/// because only the first non-empty result is applied.
pub struct FrameSampler {
    run_id: u64,
    cancel_token: CancellationToken,
}

impl FrameSampler {
    pub(super) fn spawn(controller: CameraController, run_id: u64) -> Self {
        let cancel_token = CancellationToken::new();
        tokio::spawn(sampling_loop(
            controller,
            run_id,
            SAMPLE_INTERVAL,
            cancel_token.clone(),
        ));

        Self {
            run_id,
            cancel_token,
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Cancels future ticks. Recognitions already in flight keep running;
    /// the controller discards what they return.
    pub fn stop(self) {
        self.cancel_token.cancel();
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn sampling_loop(
    controller: CameraController,
    run_id: u64,
    period: Duration,
    cancel_token: CancellationToken,
) {
    // First probe one period after start, like a plain repeating timer.
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut ticks: u64 = 0;

    log_info!(
        "frame sampler {} started ({}ms period)",
        run_id,
        period.as_millis()
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("frame sampler {} stopped after {} ticks", run_id, ticks);
                break;
            }
            _ = ticker.tick() => {
                ticks += 1;
                match controller.capture_frame().await {
                    Ok(frame) => {
                        tokio::spawn(probe(controller.clone(), run_id, ticks, frame));
                    }
                    Err(ScanError::FrameNotReady) => {
                        log_debug!("sampler {} tick {}: frame not ready", run_id, ticks);
                    }
                    // Lost a race with stop; cancellation follows.
                    Err(ScanError::CameraInactive) => {}
                    Err(err) => {
                        log_warn!("sampler {} tick {}: capture failed: {}", run_id, ticks, err);
                    }
                }
            }
        }
    }
}

async fn probe(controller: CameraController, run_id: u64, tick: u64, frame: CapturedFrame) {
    let request = RecognitionRequest::background(frame.into_payload());
    match controller.recognizer().recognize(&request).await {
        Ok(payloads) if payloads.is_empty() => {
            log_debug!("sampler {} tick {}: no codes", run_id, tick);
        }
        Ok(payloads) => {
            log_info!(
                "sampler {} tick {}: {} code(s) detected",
                run_id,
                tick,
                payloads.len()
            );
            controller.apply_detection(run_id, payloads).await;
        }
        Err(err) => {
            // Background failures are retried by the next tick.
            log_debug!("sampler {} tick {}: recognition failed: {}", run_id, tick, err);
        }
    }
}
