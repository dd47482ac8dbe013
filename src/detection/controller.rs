use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle, time::Duration};
use tokio_util::sync::CancellationToken;

use super::{
    loop_worker::{detection_loop, DetectionReport, PollContext},
    DetectionAdapter, FrameSource,
};

/// Owns the polling task. At most one loop runs at a time, and every loop
/// shares the same adapter so a `detect` call left running by a stopped loop
/// still blocks the next one.
pub struct DetectionController {
    adapter: DetectionAdapter,
    frames: Arc<dyn FrameSource>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl DetectionController {
    pub fn new(adapter: DetectionAdapter, frames: Arc<dyn FrameSource>, interval: Duration) -> Self {
        Self {
            adapter,
            frames,
            interval,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.handle.is_some()
    }

    /// True while a frame is being analysed.
    pub fn is_scanning(&self) -> bool {
        self.adapter.is_busy()
    }

    pub fn start_polling(
        &mut self,
        generation: u64,
        reports: UnboundedSender<DetectionReport>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("detection already active");
        }

        let cancel_token = CancellationToken::new();
        let ctx = PollContext {
            generation,
            adapter: self.adapter.clone(),
            frames: Arc::clone(&self.frames),
            interval: self.interval,
            reports,
        };

        let handle = tokio::spawn(detection_loop(ctx, cancel_token.clone()));
        info!("Detection polling started (generation {generation})");

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop_polling(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("detection loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }

    /// Load the model in the background and report the outcome.
    pub fn load_in_background(&self, reports: UnboundedSender<DetectionReport>) {
        let adapter = self.adapter.clone();
        tokio::spawn(async move {
            let ready = adapter.load_model().await;
            let _ = reports.send(DetectionReport::ModelReady(ready));
        });
    }

    /// Try to acquire the camera off the runtime threads. Only a failure is
    /// reported.
    pub fn open_camera_in_background(&self, reports: UnboundedSender<DetectionReport>) {
        let frames = Arc::clone(&self.frames);
        tokio::spawn(async move {
            let outcome = tokio::task::spawn_blocking(move || frames.open()).await;
            let failed = match outcome {
                Ok(Ok(())) => false,
                Ok(Err(err)) => {
                    warn!("Camera unavailable: {err:#}");
                    true
                }
                Err(join_err) => {
                    warn!("Camera open panicked: {join_err}");
                    true
                }
            };
            if failed {
                let _ = reports.send(DetectionReport::CameraUnavailable);
            }
        });
    }
}

impl Drop for DetectionController {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}
