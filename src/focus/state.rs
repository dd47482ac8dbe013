use std::fmt;

use serde::{Deserialize, Serialize};

use super::accumulator::DistractionAccumulator;
use crate::audio::Cue;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppState {
    Idle,
    TimerSelection,
    Onboarding,
    Focus,
    Warning,
    PhoneJail,
    UserAway,
    Paused,
    Rest,
}

impl Default for AppState {
    fn default() -> Self {
        AppState::Idle
    }
}

impl AppState {
    /// States in which the camera is polled.
    pub fn is_detection_state(self) -> bool {
        matches!(
            self,
            AppState::Focus | AppState::Warning | AppState::PhoneJail | AppState::UserAway
        )
    }

    pub fn is_distracted(self) -> bool {
        matches!(self, AppState::PhoneJail | AppState::UserAway)
    }

    /// States that belong to a running session and therefore have a ticker.
    pub fn is_in_session(self) -> bool {
        matches!(
            self,
            AppState::Focus
                | AppState::Warning
                | AppState::PhoneJail
                | AppState::UserAway
                | AppState::Paused
                | AppState::Rest
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Idle => "IDLE",
            AppState::TimerSelection => "TIMER_SELECTION",
            AppState::Onboarding => "ONBOARDING",
            AppState::Focus => "FOCUS",
            AppState::Warning => "WARNING",
            AppState::PhoneJail => "PHONE_JAIL",
            AppState::UserAway => "USER_AWAY",
            AppState::Paused => "PAUSED",
            AppState::Rest => "REST",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WarningType {
    Phone,
    Away,
}

impl WarningType {
    /// Where an expired warning of this kind ends up.
    pub fn distraction_state(self) -> AppState {
        match self {
            WarningType::Phone => AppState::PhoneJail,
            WarningType::Away => AppState::UserAway,
        }
    }

    pub fn cue(self) -> Cue {
        match self {
            WarningType::Phone => Cue::PhoneJail,
            WarningType::Away => Cue::UserAway,
        }
    }
}

/// Transient state of the focus flow. Counters are whole seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FocusContext {
    pub state: AppState,
    pub selected_duration_minutes: u32,
    pub time_left: u64,
    pub rest_time_left: u64,
    pub warning_time: u32,
    pub warning_type: Option<WarningType>,
    pub distraction_time: DistractionAccumulator,
    pub camera_on: bool,
    pub model_loaded: bool,
    pub selected_category_id: Option<String>,
}

impl FocusContext {
    pub fn new(duration_minutes: u32, grace_period_secs: u32) -> Self {
        Self {
            state: AppState::Idle,
            selected_duration_minutes: duration_minutes,
            time_left: u64::from(duration_minutes) * 60,
            rest_time_left: 0,
            warning_time: grace_period_secs,
            warning_type: None,
            distraction_time: DistractionAccumulator::default(),
            camera_on: true,
            model_loaded: false,
            selected_category_id: None,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        u64::from(self.selected_duration_minutes) * 60
    }

    /// Focus seconds already counted down in the current session.
    pub fn elapsed_seconds(&self) -> u64 {
        self.total_seconds().saturating_sub(self.time_left)
    }

    /// Whether the camera should be polled right now.
    pub fn wants_detection(&self) -> bool {
        self.state.is_detection_state() && self.camera_on && self.model_loaded
    }
}
