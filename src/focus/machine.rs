//! Pure transition function of the focus flow.
//!
//! [`FocusMachine::handle`] applies one event to the context and returns the
//! side effects the caller must carry out. It never touches the clock, the
//! camera or storage itself; the controller feeds it ticks and detection
//! signals and executes the returned [`Effect`]s.

use chrono::{DateTime, Utc};

use super::state::{AppState, FocusContext, WarningType};
use crate::{
    audio::Cue,
    db::{Session, SessionType},
    detection::DetectionSignal,
    settings::FocusSettings,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerConfig {
    pub grace_period_secs: u32,
    pub break_minutes: u32,
    pub default_duration_minutes: u32,
    pub min_duration_minutes: u32,
    pub max_duration_minutes: u32,
    pub duration_step_minutes: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self::from(&FocusSettings::default())
    }
}

impl From<&FocusSettings> for TimerConfig {
    fn from(settings: &FocusSettings) -> Self {
        let min = settings.min_duration_minutes.max(1);
        Self {
            grace_period_secs: settings.grace_period_secs,
            break_minutes: settings.break_minutes,
            default_duration_minutes: settings.default_duration_minutes,
            min_duration_minutes: min,
            max_duration_minutes: settings.max_duration_minutes.max(min),
            duration_step_minutes: settings.duration_step_minutes.max(1),
        }
    }
}

impl TimerConfig {
    pub fn clamp_duration(&self, minutes: i64) -> u32 {
        let clamped = minutes.clamp(
            i64::from(self.min_duration_minutes),
            i64::from(self.max_duration_minutes),
        );
        u32::try_from(clamped).unwrap_or(self.min_duration_minutes)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FocusEvent {
    /// Open timer selection from IDLE.
    Start,
    CancelSelection,
    /// Move the selected duration by this many steps.
    AdjustDuration(i32),
    SetDuration(u32),
    Confirm,
    Pause,
    Resume,
    TakeBreak,
    SkipBreak,
    Stop,
    Tick,
    Detection(DetectionSignal),
    CameraChanged(bool),
    ModelReady(bool),
    BeginOnboarding { has_profile: bool },
    FinishOnboarding,
    CancelOnboarding,
    SelectCategory(Option<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Persist(Session),
    Cue(Cue),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: AppState,
    pub to: AppState,
    pub effects: Vec<Effect>,
}

impl Transition {
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }

    pub fn persisted(&self) -> impl Iterator<Item = &Session> {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Persist(session) => Some(session),
            Effect::Cue(_) => None,
        })
    }

    pub fn cues(&self) -> impl Iterator<Item = Cue> + '_ {
        self.effects.iter().filter_map(|effect| match effect {
            Effect::Cue(cue) => Some(*cue),
            Effect::Persist(_) => None,
        })
    }
}

enum Classification {
    Distracted(WarningType),
    Clear,
}

impl Classification {
    /// Phone wins over absence.
    fn of(signal: &DetectionSignal) -> Self {
        if signal.phone_detected {
            Classification::Distracted(WarningType::Phone)
        } else if !signal.user_present {
            Classification::Distracted(WarningType::Away)
        } else {
            Classification::Clear
        }
    }
}

#[derive(Debug, Clone)]
pub struct FocusMachine {
    ctx: FocusContext,
    config: TimerConfig,
}

impl FocusMachine {
    pub fn new(config: TimerConfig) -> Self {
        let duration = config.clamp_duration(i64::from(config.default_duration_minutes));
        Self {
            ctx: FocusContext::new(duration, config.grace_period_secs),
            config,
        }
    }

    pub fn context(&self) -> &FocusContext {
        &self.ctx
    }

    pub fn state(&self) -> AppState {
        self.ctx.state
    }

    pub fn config(&self) -> &TimerConfig {
        &self.config
    }

    pub fn handle(&mut self, event: FocusEvent, now: DateTime<Utc>) -> Transition {
        let from = self.ctx.state;
        let mut effects = Vec::new();

        match event {
            FocusEvent::Start => self.start(),
            FocusEvent::CancelSelection => {
                if from == AppState::TimerSelection {
                    self.ctx.state = AppState::Idle;
                }
            }
            FocusEvent::AdjustDuration(steps) => {
                let delta = i64::from(steps) * i64::from(self.config.duration_step_minutes);
                self.set_duration(i64::from(self.ctx.selected_duration_minutes) + delta);
            }
            FocusEvent::SetDuration(minutes) => self.set_duration(i64::from(minutes)),
            FocusEvent::Confirm => self.confirm(),
            FocusEvent::Pause => {
                if from == AppState::Focus {
                    self.ctx.state = AppState::Paused;
                }
            }
            FocusEvent::Resume => {
                if from == AppState::Paused {
                    self.resume_focus();
                }
            }
            FocusEvent::TakeBreak => {
                if from == AppState::Focus {
                    self.ctx.rest_time_left = u64::from(self.config.break_minutes) * 60;
                    self.ctx.state = AppState::Rest;
                }
            }
            FocusEvent::SkipBreak => {
                if from == AppState::Rest {
                    self.resume_focus();
                }
            }
            FocusEvent::Stop => self.stop(now, &mut effects),
            FocusEvent::Tick => self.tick(now, &mut effects),
            FocusEvent::Detection(signal) => self.detection(&signal, now, &mut effects),
            FocusEvent::CameraChanged(on) => {
                self.ctx.camera_on = on;
                if !on && matches!(from, AppState::Focus | AppState::Warning) {
                    self.reset_warning();
                    self.ctx.state = AppState::Paused;
                }
            }
            FocusEvent::ModelReady(ready) => self.ctx.model_loaded = ready,
            FocusEvent::BeginOnboarding { has_profile } => {
                if from == AppState::Idle && !has_profile {
                    self.ctx.state = AppState::Onboarding;
                }
            }
            FocusEvent::FinishOnboarding | FocusEvent::CancelOnboarding => {
                if from == AppState::Onboarding {
                    self.ctx.state = AppState::Idle;
                }
            }
            FocusEvent::SelectCategory(category_id) => {
                self.ctx.selected_category_id = category_id;
            }
        }

        Transition {
            from,
            to: self.ctx.state,
            effects,
        }
    }

    fn start(&mut self) {
        if self.ctx.state == AppState::Idle && self.ctx.model_loaded {
            self.ctx.state = AppState::TimerSelection;
        }
    }

    fn set_duration(&mut self, minutes: i64) {
        if !matches!(self.ctx.state, AppState::Idle | AppState::TimerSelection) {
            return;
        }
        self.ctx.selected_duration_minutes = self.config.clamp_duration(minutes);
        self.ctx.time_left = self.ctx.total_seconds();
    }

    fn confirm(&mut self) {
        if self.ctx.state != AppState::TimerSelection {
            return;
        }
        self.ctx.time_left = self.ctx.total_seconds();
        self.ctx.distraction_time.reset();
        self.reset_warning();
        self.ctx.state = if self.ctx.camera_on {
            AppState::Focus
        } else {
            AppState::Paused
        };
    }

    fn resume_focus(&mut self) {
        self.ctx.camera_on = true;
        self.ctx.state = AppState::Focus;
    }

    fn reset_warning(&mut self) {
        self.ctx.warning_time = self.config.grace_period_secs;
        self.ctx.warning_type = None;
    }

    fn session(&self, kind: SessionType, seconds: u64, now: DateTime<Utc>) -> Session {
        Session::ended_at(kind, seconds, now, self.ctx.selected_category_id.clone())
    }

    fn tick(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        match self.ctx.state {
            AppState::Focus => {
                self.ctx.time_left = self.ctx.time_left.saturating_sub(1);
                if self.ctx.time_left == 0 {
                    effects.push(Effect::Persist(self.session(
                        SessionType::Focus,
                        self.ctx.total_seconds(),
                        now,
                    )));
                    effects.push(Effect::Cue(Cue::SessionComplete));
                    self.reset_session();
                }
            }
            AppState::Rest => {
                self.ctx.rest_time_left = self.ctx.rest_time_left.saturating_sub(1);
                if self.ctx.rest_time_left == 0 {
                    effects.push(Effect::Cue(Cue::RestComplete));
                    self.resume_focus();
                }
            }
            AppState::Warning => {
                self.ctx.warning_time = self.ctx.warning_time.saturating_sub(1);
                if self.ctx.warning_time == 0 {
                    let kind = self.ctx.warning_type.unwrap_or(WarningType::Away);
                    self.ctx.distraction_time.reset();
                    self.ctx.state = kind.distraction_state();
                    effects.push(Effect::Cue(kind.cue()));
                }
            }
            AppState::PhoneJail | AppState::UserAway => self.ctx.distraction_time.tick(),
            AppState::Paused
            | AppState::Idle
            | AppState::TimerSelection
            | AppState::Onboarding => {}
        }
    }

    fn detection(
        &mut self,
        signal: &DetectionSignal,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        if !self.ctx.camera_on || !self.ctx.state.is_detection_state() {
            return;
        }

        match (self.ctx.state, Classification::of(signal)) {
            (AppState::Focus, Classification::Distracted(kind)) => {
                self.ctx.warning_type = Some(kind);
                self.ctx.warning_time = self.config.grace_period_secs;
                self.ctx.state = AppState::Warning;
                effects.push(Effect::Cue(Cue::Warning));
            }
            (AppState::Warning, Classification::Distracted(WarningType::Phone)) => {
                self.ctx.warning_type = Some(WarningType::Phone);
            }
            (AppState::Warning, Classification::Clear) => {
                self.reset_warning();
                self.ctx.state = AppState::Focus;
            }
            (AppState::PhoneJail | AppState::UserAway, Classification::Clear) => {
                let category = self.ctx.selected_category_id.clone();
                effects.push(Effect::Persist(
                    self.ctx.distraction_time.materialize(now, category),
                ));
                self.reset_warning();
                self.ctx.state = AppState::Focus;
            }
            _ => {}
        }
    }

    fn stop(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let state = self.ctx.state;
        if !state.is_in_session() {
            return;
        }

        if state.is_distracted() {
            let category = self.ctx.selected_category_id.clone();
            effects.push(Effect::Persist(
                self.ctx.distraction_time.materialize(now, category),
            ));
        }

        let elapsed = self.ctx.elapsed_seconds();
        if elapsed > 0 {
            effects.push(Effect::Persist(self.session(SessionType::Focus, elapsed, now)));
        }

        self.reset_session();
    }

    fn reset_session(&mut self) {
        self.ctx.state = AppState::Idle;
        self.ctx.time_left = self.ctx.total_seconds();
        self.ctx.rest_time_left = 0;
        self.ctx.distraction_time.reset();
        self.reset_warning();
        self.ctx.camera_on = true;
    }
}
