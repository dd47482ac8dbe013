use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use anyhow::{anyhow, Result};
use image::DynamicImage;

use boldfocus_lib::{
    audio::{Cue, Feedback},
    db::{Database, SessionStore, SessionType},
    detection::{BlankFrameSource, FrameSource, SimulatedDetector, SimulatedScene},
    focus::{AppState, FocusController, FocusServices, FocusSnapshot},
    settings::FocusSettings,
};
use tempfile::TempDir;
use tokio::task::JoinHandle;

#[derive(Default)]
struct RecordingFeedback {
    cues: Mutex<Vec<Cue>>,
}

impl RecordingFeedback {
    fn cues(&self) -> Vec<Cue> {
        self.cues.lock().unwrap().clone()
    }
}

impl Feedback for RecordingFeedback {
    fn cue(&self, cue: Cue) {
        self.cues.lock().unwrap().push(cue);
    }

    fn silence(&self) {}
}

/// Camera that can be unplugged mid-test.
#[derive(Default)]
struct Camera {
    denied: AtomicBool,
    lost: AtomicBool,
}

impl FrameSource for Camera {
    fn open(&self) -> Result<()> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(anyhow!("camera permission denied"));
        }
        Ok(())
    }

    fn latest_frame(&self) -> Result<Option<DynamicImage>> {
        if self.denied.load(Ordering::SeqCst) || self.lost.load(Ordering::SeqCst) {
            return Err(anyhow!("camera disconnected"));
        }
        Ok(Some(DynamicImage::new_rgb8(1, 1)))
    }
}

struct Harness {
    _dir: TempDir,
    controller: FocusController,
    actor: JoinHandle<()>,
    detector: Arc<SimulatedDetector>,
    feedback: Arc<RecordingFeedback>,
}

fn fast_settings() -> FocusSettings {
    FocusSettings {
        grace_period_secs: 2,
        break_minutes: 1,
        min_duration_minutes: 1,
        tick_interval_ms: 10,
        check_interval_ms: 10,
        ..FocusSettings::default()
    }
}

fn spawn_in(dir: TempDir, detector: SimulatedDetector) -> Harness {
    spawn_with(dir, detector, Arc::new(BlankFrameSource))
}

fn spawn_with(dir: TempDir, detector: SimulatedDetector, frames: Arc<dyn FrameSource>) -> Harness {
    let db = Database::new(dir.path().join("focus.sqlite3")).unwrap();
    let detector = Arc::new(detector);
    let feedback = Arc::new(RecordingFeedback::default());
    let services = FocusServices {
        store: SessionStore::new(db),
        detector: detector.clone(),
        frames,
        feedback: feedback.clone(),
    };
    let (controller, actor) = FocusController::spawn(services, &fast_settings());
    Harness {
        _dir: dir,
        controller,
        actor,
        detector,
        feedback,
    }
}

fn spawn() -> Harness {
    spawn_in(TempDir::new().unwrap(), SimulatedDetector::new())
}

async fn wait_until(
    controller: &FocusController,
    what: &str,
    pred: impl Fn(&FocusSnapshot) -> bool,
) -> FocusSnapshot {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let snapshot = controller.snapshot().await.unwrap();
        if pred(&snapshot) {
            return snapshot;
        }
        assert!(
            Instant::now() < deadline,
            "timed out waiting for {what}; state is {}",
            snapshot.context.state
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

async fn start_session(h: &Harness, minutes: u32) {
    wait_until(&h.controller, "model", |s| s.context.model_loaded).await;
    let snapshot = h.controller.start().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::TimerSelection);
    h.controller.set_duration(minutes).await.unwrap();
    let snapshot = h.controller.confirm().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::Focus);
}

#[tokio::test]
async fn phone_use_is_charged_as_distraction() {
    let h = spawn();
    start_session(&h, 5).await;

    h.detector.set(SimulatedScene::Phone);
    wait_until(&h.controller, "phone jail", |s| {
        s.context.state == AppState::PhoneJail
    })
    .await;
    wait_until(&h.controller, "distraction time", |s| {
        s.context.distraction_time.seconds() >= 3
    })
    .await;

    h.detector.set(SimulatedScene::Present);
    wait_until(&h.controller, "focus", |s| s.context.state == AppState::Focus).await;

    let stats = h.controller.stats().await.unwrap();
    let distractions: Vec<_> = stats
        .sessions
        .iter()
        .filter(|s| s.session_type == SessionType::Distraction)
        .collect();
    assert_eq!(distractions.len(), 1);
    assert!(distractions[0].duration_seconds >= 3);
    assert_eq!(stats.total_distraction_time, distractions[0].duration_seconds);

    let cues = h.feedback.cues();
    assert!(cues.contains(&Cue::Warning));
    assert!(cues.contains(&Cue::PhoneJail));

    h.controller.shutdown().await.unwrap();
    h.actor.await.unwrap();
}

#[tokio::test]
async fn absence_lands_in_user_away() {
    let h = spawn();
    start_session(&h, 5).await;

    h.detector.set(SimulatedScene::Away);
    wait_until(&h.controller, "user away", |s| s.context.state == AppState::UserAway).await;
    assert!(h.feedback.cues().contains(&Cue::UserAway));

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn completed_session_saves_full_duration() {
    let h = spawn();
    start_session(&h, 1).await;

    wait_until(&h.controller, "completion", |s| s.context.state == AppState::Idle).await;

    let stats = h.controller.stats().await.unwrap();
    assert_eq!(stats.sessions.len(), 1);
    assert_eq!(stats.sessions[0].session_type, SessionType::Focus);
    assert_eq!(stats.sessions[0].duration_seconds, 60);
    assert_eq!(stats.total_focus_time, 60);
    assert!(h.feedback.cues().contains(&Cue::SessionComplete));

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn stopping_early_saves_elapsed_focus() {
    let h = spawn();
    start_session(&h, 25).await;

    let running = wait_until(&h.controller, "some ticks", |s| {
        s.context.time_left <= 25 * 60 - 5
    })
    .await;
    assert_eq!(running.context.state, AppState::Focus);

    let stopped = h.controller.stop().await.unwrap();
    assert_eq!(stopped.context.state, AppState::Idle);
    assert_eq!(stopped.context.time_left, 25 * 60);

    let stats = h.controller.stats().await.unwrap();
    assert_eq!(stats.sessions.len(), 1);
    assert!(stats.sessions[0].duration_seconds >= 5);
    assert!(stats.sessions[0].duration_seconds < 25 * 60);

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn break_runs_out_and_focus_resumes() {
    let h = spawn();
    start_session(&h, 25).await;

    let resting = h.controller.take_break().await.unwrap();
    assert_eq!(resting.context.state, AppState::Rest);
    assert_eq!(resting.context.rest_time_left, 60);

    let resumed = wait_until(&h.controller, "focus", |s| s.context.state == AppState::Focus).await;
    assert_eq!(resumed.context.rest_time_left, 0);
    assert!(h.feedback.cues().contains(&Cue::RestComplete));

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn camera_off_pauses_and_suspends_detection() {
    let h = spawn();
    start_session(&h, 25).await;

    let paused = h.controller.set_camera(false).await.unwrap();
    assert_eq!(paused.context.state, AppState::Paused);

    h.detector.set(SimulatedScene::Phone);
    tokio::time::sleep(Duration::from_millis(150)).await;
    let still = h.controller.snapshot().await.unwrap();
    assert_eq!(still.context.state, AppState::Paused);
    assert_eq!(still.context.time_left, paused.context.time_left);

    let resumed = h.controller.resume().await.unwrap();
    assert_eq!(resumed.context.state, AppState::Focus);
    assert!(resumed.context.camera_on);

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn denied_camera_starts_sessions_paused() {
    let camera = Arc::new(Camera::default());
    camera.denied.store(true, Ordering::SeqCst);
    let h = spawn_with(TempDir::new().unwrap(), SimulatedDetector::new(), camera);

    wait_until(&h.controller, "camera off", |s| {
        s.context.model_loaded && !s.context.camera_on
    })
    .await;

    h.controller.start().await.unwrap();
    let snapshot = h.controller.confirm().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::Paused);

    // resuming retries the camera, which is still denied
    let resumed = h.controller.resume().await.unwrap();
    assert_eq!(resumed.context.state, AppState::Focus);
    wait_until(&h.controller, "paused again", |s| {
        s.context.state == AppState::Paused && !s.context.camera_on
    })
    .await;

    let stats = h.controller.stats().await.unwrap();
    assert!(stats.sessions.is_empty());

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn losing_the_camera_pauses_the_session() {
    let camera = Arc::new(Camera::default());
    let h = spawn_with(
        TempDir::new().unwrap(),
        SimulatedDetector::new(),
        camera.clone(),
    );
    start_session(&h, 25).await;

    camera.lost.store(true, Ordering::SeqCst);
    let paused = wait_until(&h.controller, "paused", |s| {
        s.context.state == AppState::Paused
    })
    .await;
    assert!(!paused.context.camera_on);
    assert!(!paused.scanning);

    camera.lost.store(false, Ordering::SeqCst);
    let resumed = h.controller.resume().await.unwrap();
    assert_eq!(resumed.context.state, AppState::Focus);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        h.controller.snapshot().await.unwrap().context.state,
        AppState::Focus
    );

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn start_is_ignored_until_the_model_loads() {
    let h = spawn_in(TempDir::new().unwrap(), SimulatedDetector::unavailable());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = h.controller.start().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::Idle);
    assert!(!snapshot.context.model_loaded);

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn categories_are_capped_and_selected() {
    let h = spawn();

    let stats = h.controller.add_category("Work", "#FF4500").await.unwrap();
    let work = stats.categories[0].id.clone();
    assert_eq!(
        h.controller.snapshot().await.unwrap().context.selected_category_id,
        Some(work.clone())
    );

    tokio::time::sleep(Duration::from_millis(2)).await;
    h.controller.add_category("Study", "#1E90FF").await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let stats = h.controller.add_category("Gym", "#32CD32").await.unwrap();
    assert_eq!(stats.categories.len(), 2);

    h.controller.select_category(Some(work.clone())).await.unwrap();
    h.controller.remove_category(work.clone()).await.unwrap();
    assert_eq!(
        h.controller.snapshot().await.unwrap().context.selected_category_id,
        None
    );

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn deleted_category_stays_on_old_sessions() {
    let h = spawn();
    let stats = h.controller.add_category("Work", "#FF4500").await.unwrap();
    let work = stats.categories[0].id.clone();

    start_session(&h, 25).await;
    wait_until(&h.controller, "a tick", |s| s.context.time_left < 25 * 60).await;
    h.controller.stop().await.unwrap();

    let stats = h.controller.remove_category(work.clone()).await.unwrap();
    assert!(stats.categories.is_empty());
    assert_eq!(stats.sessions[0].category_id.as_deref(), Some(work.as_str()));
    assert_eq!(stats.category_label(&stats.sessions[0]), "Uncategorized");

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn onboarding_creates_profile_and_friends() {
    let h = spawn();

    let snapshot = h.controller.begin_onboarding().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::Onboarding);

    assert!(h.controller.create_profile("   ", "a@b.c").await.is_err());

    let stats = h
        .controller
        .create_profile("  ada ", "ada@example.com")
        .await
        .unwrap();
    assert_eq!(stats.user_profile.as_ref().unwrap().username, "ada");
    assert_eq!(
        h.controller.snapshot().await.unwrap().context.state,
        AppState::Idle
    );

    let hits = h.controller.search_directory("GURU");
    assert_eq!(hits.len(), 1);
    let stats = h.controller.add_friend(hits[0].id.clone()).await.unwrap();
    assert!(stats.user_profile.as_ref().unwrap().has_friend("u1"));

    let stats = h.controller.remove_friend("u1").await.unwrap();
    assert!(stats.user_profile.unwrap().friends.is_empty());

    let snapshot = h.controller.begin_onboarding().await.unwrap();
    assert_eq!(snapshot.context.state, AppState::Idle);

    h.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn first_category_is_selected_after_restart() {
    let Harness {
        _dir: dir,
        controller,
        actor,
        ..
    } = spawn();
    let stats = controller.add_category("Work", "#FF4500").await.unwrap();
    let work = stats.categories[0].id.clone();
    controller.shutdown().await.unwrap();
    actor.await.unwrap();

    let second = spawn_in(dir, SimulatedDetector::new());
    let snapshot = wait_until(&second.controller, "category", |s| {
        s.context.selected_category_id.is_some()
    })
    .await;
    assert_eq!(snapshot.context.selected_category_id, Some(work));

    second.controller.shutdown().await.unwrap();
}

#[tokio::test]
async fn state_changes_are_published() {
    let h = spawn();
    let mut changes = h.controller.subscribe();
    start_session(&h, 5).await;

    let first = changes.recv().await.unwrap();
    assert_eq!((first.from, first.to), (AppState::Idle, AppState::TimerSelection));
    let second = changes.recv().await.unwrap();
    assert_eq!((second.from, second.to), (AppState::TimerSelection, AppState::Focus));

    h.controller.shutdown().await.unwrap();
}
