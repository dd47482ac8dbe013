//! Stand-ins for the camera and vision model, used by the shell and tests.

use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use image::DynamicImage;

use super::{FrameSource, ObjectDetector, Prediction, PERSON_CLASS, PHONE_CLASS};

/// What the fake camera is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimulatedScene {
    #[default]
    Present,
    Phone,
    Away,
}

impl std::str::FromStr for SimulatedScene {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "present" | "desk" => Ok(Self::Present),
            "phone" => Ok(Self::Phone),
            "away" | "gone" => Ok(Self::Away),
            other => anyhow::bail!("unknown scene '{other}' (present, phone, away)"),
        }
    }
}

/// Detector that reports whatever scene it was last told about.
#[derive(Debug, Default)]
pub struct SimulatedDetector {
    scene: Mutex<SimulatedScene>,
    fail_load: bool,
}

impl SimulatedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A detector whose weights never load.
    pub fn unavailable() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn set(&self, scene: SimulatedScene) {
        *self.scene.lock().unwrap_or_else(PoisonError::into_inner) = scene;
    }

    pub fn scene(&self) -> SimulatedScene {
        *self.scene.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectDetector for SimulatedDetector {
    fn load(&self) -> Result<()> {
        if self.fail_load {
            anyhow::bail!("simulated model unavailable");
        }
        Ok(())
    }

    fn detect(&self, _frame: &DynamicImage) -> Result<Vec<Prediction>> {
        Ok(match self.scene() {
            SimulatedScene::Present => vec![Prediction::new(PERSON_CLASS, 0.92)],
            SimulatedScene::Phone => vec![
                Prediction::new(PERSON_CLASS, 0.90),
                Prediction::new(PHONE_CLASS, 0.81),
            ],
            SimulatedScene::Away => vec![Prediction::new("chair", 0.66)],
        })
    }
}

/// Always delivers a 1x1 black frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlankFrameSource;

impl FrameSource for BlankFrameSource {
    fn latest_frame(&self) -> Result<Option<DynamicImage>> {
        Ok(Some(DynamicImage::new_rgb8(1, 1)))
    }
}
