use std::sync::Arc;

use tokio::{
    sync::mpsc::UnboundedSender,
    time::{self, Duration, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use super::{DetectionAdapter, DetectionSignal, FrameSource};

// Set to true to enable per-poll logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Messages from detection tasks to the focus flow.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionReport {
    /// Outcome of one poll, tagged with the generation the loop was armed for.
    Signal {
        generation: u64,
        signal: DetectionSignal,
    },
    ModelReady(bool),
    /// The camera could not be opened or stopped delivering frames.
    CameraUnavailable,
}

pub(crate) struct PollContext {
    pub generation: u64,
    pub adapter: DetectionAdapter,
    pub frames: Arc<dyn FrameSource>,
    pub interval: Duration,
    pub reports: UnboundedSender<DetectionReport>,
}

/// Poll the camera every `interval` until cancelled. The adapter allows one
/// `detect` call at a time across every loop sharing it; ticks that land
/// while one is running are skipped.
pub(crate) async fn detection_loop(ctx: PollContext, cancel_token: CancellationToken) {
    let mut ticker = time::interval_at(Instant::now() + ctx.interval, ctx.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if ctx.adapter.is_busy() {
                    log_debug!("detection poll skipped: previous analysis still running");
                    continue;
                }

                let frame = match ctx.frames.latest_frame() {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        log_debug!("no camera frame available, skipping poll");
                        continue;
                    }
                    Err(err) => {
                        log_warn!("camera unavailable: {err:#}");
                        let _ = ctx.reports.send(DetectionReport::CameraUnavailable);
                        break;
                    }
                };

                let outcome = tokio::select! {
                    outcome = ctx.adapter.analyze_frame(frame) => outcome,
                    _ = cancel_token.cancelled() => break,
                };

                let Some(signal) = outcome else {
                    log_debug!("detection poll skipped: previous analysis still running");
                    continue;
                };

                log_debug!(
                    "detection gen={} phone={} present={} confidence={:.2}",
                    ctx.generation, signal.phone_detected, signal.user_present, signal.confidence
                );
                let report = DetectionReport::Signal { generation: ctx.generation, signal };
                if ctx.reports.send(report).is_err() {
                    break;
                }
            }
            _ = cancel_token.cancelled() => {
                break;
            }
        }
    }

    log_info!("detection loop (generation {}) shutting down", ctx.generation);
}
