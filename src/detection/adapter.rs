use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::Duration,
};

use image::DynamicImage;
use log::{info, warn};

use super::{DetectionSignal, ObjectDetector, Prediction, PERSON_CLASS, PHONE_CLASS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ModelStatus {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectionConfig {
    /// Minimum score for a `person` or `cell phone` prediction to count.
    pub threshold: f32,
    pub analyze_timeout: Duration,
    pub load_timeout: Duration,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            analyze_timeout: Duration::from_secs(5),
            load_timeout: Duration::from_secs(30),
        }
    }
}

/// Marks a `detect` call as running. Released on drop, which happens on the
/// blocking thread once `detect` returns, even if the caller gave up waiting.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Wraps the vision model so callers only ever see a [`DetectionSignal`].
/// Clones share the model, its load status and the in-flight marker.
#[derive(Clone)]
pub struct DetectionAdapter {
    detector: Arc<dyn ObjectDetector>,
    status: Arc<Mutex<ModelStatus>>,
    in_flight: Arc<AtomicBool>,
    config: DetectionConfig,
}

impl DetectionAdapter {
    pub fn new(detector: Arc<dyn ObjectDetector>, config: DetectionConfig) -> Self {
        Self {
            detector,
            status: Arc::new(Mutex::new(ModelStatus::Unloaded)),
            in_flight: Arc::new(AtomicBool::new(false)),
            config,
        }
    }

    pub fn is_ready(&self) -> bool {
        *self.lock_status() == ModelStatus::Ready
    }

    /// True while a `detect` call is running on a blocking thread.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    fn begin_detect(&self) -> Option<InFlight> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(InFlight(Arc::clone(&self.in_flight)))
        }
    }

    /// Load the model if needed. Returns true once ready; false while another
    /// load is in progress or when loading failed. Safe to call repeatedly.
    pub async fn load_model(&self) -> bool {
        {
            let mut status = self.lock_status();
            match *status {
                ModelStatus::Ready => return true,
                ModelStatus::Loading => return false,
                ModelStatus::Unloaded | ModelStatus::Failed => *status = ModelStatus::Loading,
            }
        }

        info!("Loading detection model...");
        let detector = Arc::clone(&self.detector);
        let outcome = tokio::time::timeout(
            self.config.load_timeout,
            tokio::task::spawn_blocking(move || detector.load()),
        )
        .await;

        let ready = match outcome {
            Ok(Ok(Ok(()))) => {
                info!("Detection model loaded");
                true
            }
            Ok(Ok(Err(err))) => {
                warn!("Failed to load detection model: {err:#}");
                false
            }
            Ok(Err(join_err)) => {
                warn!("Detection model loader panicked: {join_err}");
                false
            }
            Err(_) => {
                warn!(
                    "Detection model load timed out after {:?}",
                    self.config.load_timeout
                );
                false
            }
        };

        *self.lock_status() = if ready {
            ModelStatus::Ready
        } else {
            ModelStatus::Failed
        };
        ready
    }

    /// Classify one frame. Returns `None` without touching the model while an
    /// earlier `detect` call is still running; any failure yields
    /// [`DetectionSignal::safe_default`].
    pub async fn analyze_frame(&self, frame: DynamicImage) -> Option<DetectionSignal> {
        let guard = self.begin_detect()?;

        if !self.is_ready() && !self.load_model().await {
            return Some(DetectionSignal::safe_default());
        }

        let detector = Arc::clone(&self.detector);
        let outcome = tokio::time::timeout(
            self.config.analyze_timeout,
            tokio::task::spawn_blocking(move || {
                let _guard = guard;
                detector.detect(&frame)
            }),
        )
        .await;

        let signal = match outcome {
            Ok(Ok(Ok(predictions))) => normalize(&predictions, self.config.threshold),
            Ok(Ok(Err(err))) => {
                warn!("Detection failed: {err:#}");
                DetectionSignal::safe_default()
            }
            Ok(Err(join_err)) => {
                warn!("Detection worker panicked: {join_err}");
                DetectionSignal::safe_default()
            }
            Err(_) => {
                warn!(
                    "Detection timed out after {:?}",
                    self.config.analyze_timeout
                );
                DetectionSignal::safe_default()
            }
        };
        Some(signal)
    }

    fn lock_status(&self) -> std::sync::MutexGuard<'_, ModelStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Reduce raw predictions to a signal. Confidence is the best score seen for
/// any class, thresholded or not.
pub fn normalize(predictions: &[Prediction], threshold: f32) -> DetectionSignal {
    let mut signal = DetectionSignal {
        phone_detected: false,
        user_present: false,
        confidence: 0.0,
    };

    for prediction in predictions {
        signal.confidence = signal.confidence.max(prediction.score);
        if prediction.score <= threshold {
            continue;
        }
        match prediction.class.as_str() {
            PERSON_CLASS => signal.user_present = true,
            PHONE_CLASS => signal.phone_detected = true,
            _ => {}
        }
    }

    signal
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedDetector {
        predictions: Vec<Prediction>,
        loads: AtomicUsize,
    }

    impl FixedDetector {
        fn new(predictions: Vec<Prediction>) -> Self {
            Self {
                predictions,
                loads: AtomicUsize::new(0),
            }
        }
    }

    impl ObjectDetector for FixedDetector {
        fn load(&self) -> Result<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn detect(&self, _frame: &DynamicImage) -> Result<Vec<Prediction>> {
            Ok(self.predictions.clone())
        }
    }

    struct BrokenDetector {
        load_ok: bool,
    }

    impl ObjectDetector for BrokenDetector {
        fn load(&self) -> Result<()> {
            if self.load_ok {
                Ok(())
            } else {
                Err(anyhow!("weights unavailable"))
            }
        }

        fn detect(&self, _frame: &DynamicImage) -> Result<Vec<Prediction>> {
            Err(anyhow!("inference error"))
        }
    }

    struct SlowDetector;

    impl ObjectDetector for SlowDetector {
        fn load(&self) -> Result<()> {
            Ok(())
        }

        fn detect(&self, _frame: &DynamicImage) -> Result<Vec<Prediction>> {
            std::thread::sleep(Duration::from_millis(500));
            Ok(vec![Prediction::new(PHONE_CLASS, 0.99)])
        }
    }

    fn frame() -> DynamicImage {
        DynamicImage::new_rgb8(4, 4)
    }

    #[test]
    fn thresholds_person_and_phone() {
        let signal = normalize(
            &[
                Prediction::new(PERSON_CLASS, 0.41),
                Prediction::new(PHONE_CLASS, 0.40),
                Prediction::new("cup", 0.9),
            ],
            0.4,
        );

        assert!(signal.user_present);
        assert!(!signal.phone_detected);
        assert_eq!(signal.confidence, 0.9);
    }

    #[test]
    fn empty_frame_means_nobody_there() {
        let signal = normalize(&[], 0.4);
        assert!(!signal.user_present);
        assert!(!signal.phone_detected);
        assert!(!signal.is_clear());
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let detector = Arc::new(FixedDetector::new(Vec::new()));
        let adapter = DetectionAdapter::new(detector.clone(), DetectionConfig::default());

        assert!(adapter.load_model().await);
        assert!(adapter.load_model().await);
        assert_eq!(detector.loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn analyze_loads_lazily_and_reports_phone() {
        let detector = Arc::new(FixedDetector::new(vec![
            Prediction::new(PERSON_CLASS, 0.8),
            Prediction::new(PHONE_CLASS, 0.7),
        ]));
        let adapter = DetectionAdapter::new(detector, DetectionConfig::default());

        let signal = adapter.analyze_frame(frame()).await.unwrap();
        assert!(signal.phone_detected);
        assert!(signal.user_present);
        assert!(adapter.is_ready());
    }

    #[tokio::test]
    async fn failed_load_falls_back_to_present() {
        let adapter = DetectionAdapter::new(
            Arc::new(BrokenDetector { load_ok: false }),
            DetectionConfig::default(),
        );

        assert!(!adapter.load_model().await);
        assert_eq!(
            adapter.analyze_frame(frame()).await,
            Some(DetectionSignal::safe_default())
        );
    }

    #[tokio::test]
    async fn inference_error_falls_back_to_present() {
        let adapter = DetectionAdapter::new(
            Arc::new(BrokenDetector { load_ok: true }),
            DetectionConfig::default(),
        );

        assert_eq!(
            adapter.analyze_frame(frame()).await,
            Some(DetectionSignal::safe_default())
        );
    }

    #[tokio::test]
    async fn timed_out_call_still_blocks_the_next_one() {
        let config = DetectionConfig {
            analyze_timeout: Duration::from_millis(50),
            ..DetectionConfig::default()
        };
        let adapter = DetectionAdapter::new(Arc::new(SlowDetector), config);

        assert_eq!(
            adapter.analyze_frame(frame()).await,
            Some(DetectionSignal::safe_default())
        );
        assert!(adapter.is_busy());
        assert_eq!(adapter.clone().analyze_frame(frame()).await, None);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(!adapter.is_busy());
    }

    #[tokio::test]
    async fn slow_inference_times_out() {
        let config = DetectionConfig {
            analyze_timeout: Duration::from_millis(50),
            ..DetectionConfig::default()
        };
        let adapter = DetectionAdapter::new(Arc::new(SlowDetector), config);

        assert_eq!(
            adapter.analyze_frame(frame()).await,
            Some(DetectionSignal::safe_default())
        );
    }
}
