//! Camera presence and phone detection.
//!
//! The vision model itself is an external collaborator behind
//! [`ObjectDetector`]; frames come from a [`FrameSource`]. The
//! [`DetectionAdapter`] turns raw predictions into a [`DetectionSignal`] and
//! absorbs every model failure, and the [`DetectionController`] owns the 1 Hz
//! polling task.

pub mod adapter;
pub mod controller;
pub mod loop_worker;
pub mod simulated;

pub use adapter::{DetectionAdapter, DetectionConfig};
pub use controller::DetectionController;
pub use loop_worker::DetectionReport;
pub use simulated::{BlankFrameSource, SimulatedDetector, SimulatedScene};

use anyhow::Result;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

pub const PERSON_CLASS: &str = "person";
pub const PHONE_CLASS: &str = "cell phone";

/// One classification from the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub score: f32,
}

impl Prediction {
    pub fn new(class: impl Into<String>, score: f32) -> Self {
        Self {
            class: class.into(),
            score,
        }
    }
}

/// Normalised per-poll outcome.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSignal {
    pub phone_detected: bool,
    pub user_present: bool,
    pub confidence: f32,
}

impl DetectionSignal {
    /// Reported whenever perception fails: never charges distraction time.
    pub fn safe_default() -> Self {
        Self {
            phone_detected: false,
            user_present: true,
            confidence: 0.0,
        }
    }

    /// True when the signal carries no distraction.
    pub fn is_clear(&self) -> bool {
        !self.phone_detected && self.user_present
    }
}

/// Blocking vision model. Called from a blocking worker, never from the
/// async runtime threads.
pub trait ObjectDetector: Send + Sync + 'static {
    /// Load weights. Called again after a failure.
    fn load(&self) -> Result<()>;

    fn detect(&self, frame: &DynamicImage) -> Result<Vec<Prediction>>;
}

/// Camera feed. Both calls may block.
pub trait FrameSource: Send + Sync + 'static {
    /// Acquire the device. An error means the camera is unavailable, for
    /// example because permission was denied.
    fn open(&self) -> Result<()> {
        Ok(())
    }

    /// Latest frame, `Ok(None)` while no frame has arrived yet, or an error
    /// once the camera is gone.
    fn latest_frame(&self) -> Result<Option<DynamicImage>>;
}
