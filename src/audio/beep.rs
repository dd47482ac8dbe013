use rodio::Source;
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
const LENGTH_SECS: f32 = 0.5;
const SWEEP_SECS: f32 = 0.1;
const START_FREQ: f32 = 800.0;
const END_FREQ: f32 = 400.0;
const START_GAIN: f32 = 0.5;
const END_GAIN: f32 = 0.01;

/// Short square-wave blip: pitch sweeps down over the first 100 ms while the
/// gain decays exponentially over the whole half second.
pub struct Beep {
    num_sample: usize,
    total_samples: usize,
    phase: f32,
}

impl Beep {
    pub fn new() -> Self {
        Self {
            num_sample: 0,
            total_samples: (SAMPLE_RATE as f32 * LENGTH_SECS) as usize,
            phase: 0.0,
        }
    }

    fn frequency_at(t: f32) -> f32 {
        let progress = (t / SWEEP_SECS).min(1.0);
        START_FREQ * (END_FREQ / START_FREQ).powf(progress)
    }

    fn gain_at(t: f32) -> f32 {
        let progress = (t / LENGTH_SECS).min(1.0);
        START_GAIN * (END_GAIN / START_GAIN).powf(progress)
    }
}

impl Default for Beep {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for Beep {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }

        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        self.num_sample += 1;

        // Integrate phase so the sweep stays continuous.
        self.phase = (self.phase + Self::frequency_at(t) / SAMPLE_RATE as f32).fract();
        let square = if self.phase < 0.5 { 1.0 } else { -1.0 };

        Some(square * Self::gain_at(t))
    }
}

impl Source for Beep {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(LENGTH_SECS))
    }
}
