//! Owner of the focus flow.
//!
//! A single actor task holds the [`FocusMachine`], the cached stats and the
//! store. The tick driver and the detection poll never touch that state
//! directly: they post generation-tagged messages to the actor, which drops
//! anything armed for an earlier state. [`FocusController`] is the cloneable
//! handle callers use to reach the actor.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::Duration,
};

use super::{
    machine::{Effect, FocusEvent, FocusMachine, TimerConfig, Transition},
    state::{AppState, FocusContext},
    ticker::spawn_ticker,
};
use crate::{
    audio::Feedback,
    db::{Category, Friend, SessionStore, UserStats},
    detection::{DetectionAdapter, DetectionController, DetectionReport, FrameSource, ObjectDetector},
    settings::FocusSettings,
    social,
    utils::time::epoch_millis,
};

/// Collaborators the focus flow drives.
pub struct FocusServices {
    pub store: SessionStore,
    pub detector: Arc<dyn ObjectDetector>,
    pub frames: Arc<dyn FrameSource>,
    pub feedback: Arc<dyn Feedback>,
}

/// Point-in-time view of the flow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FocusSnapshot {
    #[serde(flatten)]
    pub context: FocusContext,
    /// A frame is being analysed right now.
    pub scanning: bool,
}

/// Published whenever the flow changes state, including changes caused by
/// ticks and detection rather than by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub from: AppState,
    pub to: AppState,
}

const EVENT_CAPACITY: usize = 64;

enum Command {
    Event {
        event: FocusEvent,
        respond_to: oneshot::Sender<FocusSnapshot>,
    },
    BeginOnboarding {
        respond_to: oneshot::Sender<FocusSnapshot>,
    },
    Snapshot {
        respond_to: oneshot::Sender<FocusSnapshot>,
    },
    Stats {
        respond_to: oneshot::Sender<UserStats>,
    },
    AddCategory {
        name: String,
        color: String,
        respond_to: oneshot::Sender<UserStats>,
    },
    RemoveCategory {
        category_id: String,
        respond_to: oneshot::Sender<UserStats>,
    },
    CreateProfile {
        username: String,
        email: String,
        respond_to: oneshot::Sender<Result<UserStats>>,
    },
    AddFriend {
        friend_id: String,
        respond_to: oneshot::Sender<UserStats>,
    },
    RemoveFriend {
        friend_id: String,
        respond_to: oneshot::Sender<UserStats>,
    },
    ClearStats {
        respond_to: oneshot::Sender<UserStats>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
pub struct FocusController {
    sender: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<StateChange>,
}

impl FocusController {
    /// Spawn the actor on the current runtime. The actor loads stats, selects
    /// the first stored category and starts loading the model in the
    /// background before serving commands.
    pub fn spawn(services: FocusServices, settings: &FocusSettings) -> (Self, JoinHandle<()>) {
        let (sender, commands) = mpsc::unbounded_channel();
        let (tick_tx, ticks) = mpsc::unbounded_channel();
        let (report_tx, reports) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let adapter = DetectionAdapter::new(services.detector, settings.detection_config());
        let detection =
            DetectionController::new(adapter, services.frames, settings.check_interval());

        let actor = FocusActor {
            machine: FocusMachine::new(TimerConfig::from(settings)),
            store: services.store,
            stats: UserStats::default(),
            feedback: services.feedback,
            events: events.clone(),
            detection,
            tick_interval: settings.tick_interval(),
            ticker: None,
            tick_generation: 0,
            poll_generation: 0,
            tick_tx,
            report_tx,
            model_loading: false,
        };

        let handle = tokio::spawn(actor.run(commands, ticks, reports));
        (Self { sender, events }, handle)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.events.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .map_err(|_| anyhow!("focus controller has stopped"))?;
        rx.await
            .map_err(|_| anyhow!("focus controller dropped the request"))
    }

    pub async fn send(&self, event: FocusEvent) -> Result<FocusSnapshot> {
        self.request(|respond_to| Command::Event { event, respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<FocusSnapshot> {
        self.request(|respond_to| Command::Snapshot { respond_to })
            .await
    }

    pub async fn start(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::Start).await
    }

    pub async fn cancel_selection(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::CancelSelection).await
    }

    pub async fn adjust_duration(&self, steps: i32) -> Result<FocusSnapshot> {
        self.send(FocusEvent::AdjustDuration(steps)).await
    }

    pub async fn set_duration(&self, minutes: u32) -> Result<FocusSnapshot> {
        self.send(FocusEvent::SetDuration(minutes)).await
    }

    pub async fn confirm(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::Confirm).await
    }

    pub async fn pause(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::Pause).await
    }

    pub async fn resume(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::Resume).await
    }

    pub async fn take_break(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::TakeBreak).await
    }

    pub async fn skip_break(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::SkipBreak).await
    }

    pub async fn stop(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::Stop).await
    }

    pub async fn set_camera(&self, on: bool) -> Result<FocusSnapshot> {
        self.send(FocusEvent::CameraChanged(on)).await
    }

    pub async fn select_category(&self, category_id: Option<String>) -> Result<FocusSnapshot> {
        self.send(FocusEvent::SelectCategory(category_id)).await
    }

    /// Enter onboarding, unless a profile already exists.
    pub async fn begin_onboarding(&self) -> Result<FocusSnapshot> {
        self.request(|respond_to| Command::BeginOnboarding { respond_to })
            .await
    }

    pub async fn cancel_onboarding(&self) -> Result<FocusSnapshot> {
        self.send(FocusEvent::CancelOnboarding).await
    }

    pub async fn stats(&self) -> Result<UserStats> {
        self.request(|respond_to| Command::Stats { respond_to })
            .await
    }

    /// Create and select a category. At the cap this is a no-op.
    pub async fn add_category(
        &self,
        name: impl Into<String>,
        color: impl Into<String>,
    ) -> Result<UserStats> {
        let (name, color) = (name.into(), color.into());
        self.request(|respond_to| Command::AddCategory {
            name,
            color,
            respond_to,
        })
        .await
    }

    pub async fn remove_category(&self, category_id: impl Into<String>) -> Result<UserStats> {
        let category_id = category_id.into();
        self.request(|respond_to| Command::RemoveCategory {
            category_id,
            respond_to,
        })
        .await
    }

    /// Create the local profile and leave onboarding.
    pub async fn create_profile(
        &self,
        username: impl Into<String>,
        email: impl Into<String>,
    ) -> Result<UserStats> {
        let (username, email) = (username.into(), email.into());
        self.request(|respond_to| Command::CreateProfile {
            username,
            email,
            respond_to,
        })
        .await?
    }

    pub fn search_directory(&self, query: &str) -> Vec<Friend> {
        social::search_directory(query)
    }

    pub async fn add_friend(&self, friend_id: impl Into<String>) -> Result<UserStats> {
        let friend_id = friend_id.into();
        self.request(|respond_to| Command::AddFriend {
            friend_id,
            respond_to,
        })
        .await
    }

    pub async fn remove_friend(&self, friend_id: impl Into<String>) -> Result<UserStats> {
        let friend_id = friend_id.into();
        self.request(|respond_to| Command::RemoveFriend {
            friend_id,
            respond_to,
        })
        .await
    }

    pub async fn clear_stats(&self) -> Result<UserStats> {
        self.request(|respond_to| Command::ClearStats { respond_to })
            .await
    }

    /// Stop timers and detection and end the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|respond_to| Command::Shutdown { respond_to })
            .await
    }
}

struct FocusActor {
    machine: FocusMachine,
    store: SessionStore,
    stats: UserStats,
    feedback: Arc<dyn Feedback>,
    events: broadcast::Sender<StateChange>,
    detection: DetectionController,
    tick_interval: Duration,
    ticker: Option<JoinHandle<()>>,
    tick_generation: u64,
    poll_generation: u64,
    tick_tx: mpsc::UnboundedSender<u64>,
    report_tx: mpsc::UnboundedSender<DetectionReport>,
    model_loading: bool,
}

impl FocusActor {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut ticks: mpsc::UnboundedReceiver<u64>,
        mut reports: mpsc::UnboundedReceiver<DetectionReport>,
    ) {
        info!("Focus controller starting");
        self.bootstrap().await;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Shutdown { respond_to }) => {
                        self.teardown().await;
                        let _ = respond_to.send(());
                        info!("Focus controller stopped");
                        return;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                Some(generation) = ticks.recv() => {
                    if generation == self.tick_generation {
                        self.apply(FocusEvent::Tick).await;
                    }
                }
                Some(report) = reports.recv() => self.handle_report(report).await,
            }
        }

        self.teardown().await;
        info!("Focus controller stopped");
    }

    async fn bootstrap(&mut self) {
        self.stats = self.store.load().await;
        if let Some(first) = self.stats.categories.first() {
            let id = first.id.clone();
            self.apply(FocusEvent::SelectCategory(Some(id))).await;
        }
        self.ensure_model_loading();
        if self.machine.context().camera_on {
            self.detection
                .open_camera_in_background(self.report_tx.clone());
        }
    }

    fn ensure_model_loading(&mut self) {
        if self.model_loading || self.machine.context().model_loaded {
            return;
        }
        self.model_loading = true;
        self.detection.load_in_background(self.report_tx.clone());
    }

    fn snapshot(&self) -> FocusSnapshot {
        FocusSnapshot {
            context: self.machine.context().clone(),
            scanning: self.detection.is_scanning(),
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Event { event, respond_to } => {
                if matches!(event, FocusEvent::Start) && !self.machine.context().model_loaded {
                    info!("Start ignored: detection model not ready yet");
                    self.ensure_model_loading();
                }
                self.apply(event).await;
                let _ = respond_to.send(self.snapshot());
            }
            Command::BeginOnboarding { respond_to } => {
                let has_profile = self.stats.user_profile.is_some();
                self.apply(FocusEvent::BeginOnboarding { has_profile })
                    .await;
                let _ = respond_to.send(self.snapshot());
            }
            Command::Snapshot { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
            Command::Stats { respond_to } => {
                let _ = respond_to.send(self.stats.clone());
            }
            Command::AddCategory {
                name,
                color,
                respond_to,
            } => {
                let stats = self.add_category(name, color).await;
                let _ = respond_to.send(stats);
            }
            Command::RemoveCategory {
                category_id,
                respond_to,
            } => {
                self.stats = self.store.remove_category(&category_id).await;
                if self.machine.context().selected_category_id.as_deref() == Some(category_id.as_str()) {
                    self.apply(FocusEvent::SelectCategory(None)).await;
                }
                let _ = respond_to.send(self.stats.clone());
            }
            Command::CreateProfile {
                username,
                email,
                respond_to,
            } => {
                let result = self.create_profile(&username, &email).await;
                let _ = respond_to.send(result);
            }
            Command::AddFriend {
                friend_id,
                respond_to,
            } => {
                self.stats = self.store.add_friend(&friend_id).await;
                let _ = respond_to.send(self.stats.clone());
            }
            Command::RemoveFriend {
                friend_id,
                respond_to,
            } => {
                self.stats = self.store.remove_friend(&friend_id).await;
                let _ = respond_to.send(self.stats.clone());
            }
            Command::ClearStats { respond_to } => {
                self.store.clear().await;
                self.stats = self.store.load().await;
                self.apply(FocusEvent::SelectCategory(None)).await;
                let _ = respond_to.send(self.stats.clone());
            }
            Command::Shutdown { respond_to } => {
                // Handled by the run loop.
                let _ = respond_to.send(());
            }
        }
    }

    async fn add_category(&mut self, name: String, color: String) -> UserStats {
        let name = name.trim();
        if name.is_empty() {
            return self.stats.clone();
        }

        let id = epoch_millis(Utc::now()).to_string();
        self.stats = self
            .store
            .add_category(Category::new(id.clone(), name, color))
            .await;
        if self.stats.category(&id).is_some() {
            self.apply(FocusEvent::SelectCategory(Some(id))).await;
        }
        self.stats.clone()
    }

    async fn create_profile(&mut self, username: &str, email: &str) -> Result<UserStats> {
        let username = username.trim();
        if username.is_empty() {
            bail!("username must not be empty");
        }

        self.stats = self.store.create_profile(username, email.trim()).await;
        if self.stats.user_profile.is_some() {
            self.apply(FocusEvent::FinishOnboarding).await;
        }
        Ok(self.stats.clone())
    }

    async fn handle_report(&mut self, report: DetectionReport) {
        match report {
            DetectionReport::Signal { generation, signal } => {
                if generation == self.poll_generation && self.detection.is_polling() {
                    self.apply(FocusEvent::Detection(signal)).await;
                } else {
                    debug!("Dropping stale detection result (generation {generation})");
                }
            }
            DetectionReport::ModelReady(ready) => {
                self.model_loading = false;
                if !ready {
                    warn!("Detection model unavailable; start stays blocked until it loads");
                }
                self.apply(FocusEvent::ModelReady(ready)).await;
            }
            DetectionReport::CameraUnavailable => {
                if self.machine.context().camera_on {
                    warn!("Camera unavailable; switching camera off");
                    self.apply(FocusEvent::CameraChanged(false)).await;
                }
            }
        }
    }

    /// Run one event through the machine and carry out what it asks for.
    async fn apply(&mut self, event: FocusEvent) -> Transition {
        let was_polling = self.machine.context().wants_detection();
        let camera_was_on = self.machine.context().camera_on;
        let transition = self.machine.handle(event, Utc::now());
        let now_polling = self.machine.context().wants_detection();

        if transition.changed_state() {
            debug!("Focus state {} -> {}", transition.from, transition.to);
            let _ = self.events.send(StateChange {
                from: transition.from,
                to: transition.to,
            });
        }
        if was_polling && !now_polling {
            self.feedback.silence();
        }

        self.run_effects(&transition).await;

        if !camera_was_on && self.machine.context().camera_on {
            self.detection
                .open_camera_in_background(self.report_tx.clone());
        }
        if transition.changed_state() {
            self.rearm_ticker();
        }
        if transition.changed_state() || was_polling != now_polling {
            self.restart_detection().await;
        }

        transition
    }

    async fn run_effects(&mut self, transition: &Transition) {
        for effect in &transition.effects {
            match effect {
                Effect::Persist(session) => {
                    info!(
                        "Saving {} session of {}s",
                        session.session_type.as_str(),
                        session.duration_seconds
                    );
                    self.stats = self.store.append_session(session.clone()).await;
                }
                Effect::Cue(cue) => self.feedback.cue(*cue),
            }
        }
    }

    fn rearm_ticker(&mut self) {
        self.tick_generation = self.tick_generation.wrapping_add(1);
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        if self.machine.state().is_in_session() {
            self.ticker = Some(spawn_ticker(
                self.tick_generation,
                self.tick_interval,
                self.tick_tx.clone(),
            ));
        }
    }

    async fn restart_detection(&mut self) {
        self.poll_generation = self.poll_generation.wrapping_add(1);
        if let Err(err) = self.detection.stop_polling().await {
            warn!("Failed to stop detection: {err:#}");
        }
        if self.machine.context().wants_detection() {
            if let Err(err) = self
                .detection
                .start_polling(self.poll_generation, self.report_tx.clone())
            {
                warn!("Failed to start detection: {err:#}");
            }
        }
    }

    async fn teardown(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
        if let Err(err) = self.detection.stop_polling().await {
            warn!("Failed to stop detection: {err:#}");
        }
        self.feedback.silence();
    }
}
