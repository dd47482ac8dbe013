//! Line commands for the interactive shell and their rendering.

use std::str::FromStr;

use anyhow::{anyhow, bail, Result};

use crate::{
    db::UserStats,
    detection::SimulatedScene,
    focus::{AppState, FocusSnapshot, WarningType},
    utils::time::{format_clock, format_duration},
    App,
};

const DEFAULT_CATEGORY_COLOR: &str = "#1E90FF";

pub const HELP: &str = "\
commands:
  start                      open timer selection
  duration <min>|+|-         pick the session length
  go                         begin the session
  cancel                     leave timer selection
  pause | resume             pause or resume focus
  break | skip               take a break or end it early
  stop                       end the session and save elapsed focus time
  camera on|off              toggle the camera
  sim present|phone|away     change what the simulated camera sees
  categories                 list categories
  category add <name> [#hex] add and select a category (max 2)
  category rm <id>           remove a category
  category use <id>|none     select a category
  login | login cancel       start or abandon profile creation
  profile <username> <email> create the local profile
  search <query>             search the user directory
  friend add|rm <id>         manage friends
  stats | status | clear     history, current state, wipe history
  quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationChange {
    Up,
    Down,
    Set(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Start,
    Duration(DurationChange),
    Go,
    Cancel,
    Pause,
    Resume,
    Break,
    Skip,
    Stop,
    Camera(bool),
    Sim(SimulatedScene),
    Categories,
    AddCategory { name: String, color: String },
    RemoveCategory(String),
    UseCategory(Option<String>),
    Login,
    CancelLogin,
    Profile { username: String, email: String },
    Search(String),
    AddFriend(String),
    RemoveFriend(String),
    Stats,
    Status,
    Clear,
    Help,
    Quit,
}

impl FromStr for ShellCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let head = words
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        let command = match (head.as_str(), rest.as_slice()) {
            ("start", []) => Self::Start,
            ("duration", [arg]) => Self::Duration(match *arg {
                "+" => DurationChange::Up,
                "-" => DurationChange::Down,
                value => DurationChange::Set(
                    value
                        .parse()
                        .map_err(|_| anyhow!("duration must be minutes, + or -"))?,
                ),
            }),
            ("go", []) => Self::Go,
            ("cancel", []) => Self::Cancel,
            ("pause", []) => Self::Pause,
            ("resume", []) => Self::Resume,
            ("break", []) => Self::Break,
            ("skip", []) => Self::Skip,
            ("stop", []) => Self::Stop,
            ("camera", ["on"]) => Self::Camera(true),
            ("camera", ["off"]) => Self::Camera(false),
            ("sim", [scene]) => Self::Sim(scene.parse()?),
            ("categories", []) => Self::Categories,
            ("category", ["add", name @ ..]) if !name.is_empty() => {
                let (name, color) = match name.split_last() {
                    Some((last, head)) if last.starts_with('#') && !head.is_empty() => {
                        (head.join(" "), (*last).to_string())
                    }
                    _ => (name.join(" "), DEFAULT_CATEGORY_COLOR.to_string()),
                };
                Self::AddCategory { name, color }
            }
            ("category", ["rm", id]) => Self::RemoveCategory((*id).to_string()),
            ("category", ["use", "none"]) => Self::UseCategory(None),
            ("category", ["use", id]) => Self::UseCategory(Some((*id).to_string())),
            ("login", []) => Self::Login,
            ("login", ["cancel"]) => Self::CancelLogin,
            ("profile", [username, email]) => Self::Profile {
                username: (*username).to_string(),
                email: (*email).to_string(),
            },
            ("search", query) => Self::Search(query.join(" ")),
            ("friend", ["add", id]) => Self::AddFriend((*id).to_string()),
            ("friend", ["rm", id]) => Self::RemoveFriend((*id).to_string()),
            ("stats", []) => Self::Stats,
            ("status", []) => Self::Status,
            ("clear", []) => Self::Clear,
            ("help" | "?", _) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => bail!("unrecognised command '{}', try 'help'", line.trim()),
        };
        Ok(command)
    }
}

/// Run one command and return what to print.
pub async fn execute(app: &App, command: ShellCommand) -> Result<String> {
    let focus = &app.controller;
    let output = match command {
        ShellCommand::Start => {
            let snapshot = focus.start().await?;
            if snapshot.context.state == AppState::Idle && !snapshot.context.model_loaded {
                "detection model is still loading, try again shortly".to_string()
            } else {
                render_status(&snapshot)
            }
        }
        ShellCommand::Duration(change) => {
            let snapshot = match change {
                DurationChange::Up => focus.adjust_duration(1).await?,
                DurationChange::Down => focus.adjust_duration(-1).await?,
                DurationChange::Set(minutes) => focus.set_duration(minutes).await?,
            };
            render_status(&snapshot)
        }
        ShellCommand::Go => render_status(&focus.confirm().await?),
        ShellCommand::Cancel => render_status(&focus.cancel_selection().await?),
        ShellCommand::Pause => render_status(&focus.pause().await?),
        ShellCommand::Resume => render_status(&focus.resume().await?),
        ShellCommand::Break => render_status(&focus.take_break().await?),
        ShellCommand::Skip => render_status(&focus.skip_break().await?),
        ShellCommand::Stop => render_status(&focus.stop().await?),
        ShellCommand::Camera(on) => render_status(&focus.set_camera(on).await?),
        ShellCommand::Sim(scene) => {
            app.detector.set(scene);
            format!("camera now sees: {scene:?}")
        }
        ShellCommand::Categories => render_categories(&focus.stats().await?),
        ShellCommand::AddCategory { name, color } => {
            render_categories(&focus.add_category(name, color).await?)
        }
        ShellCommand::RemoveCategory(id) => render_categories(&focus.remove_category(id).await?),
        ShellCommand::UseCategory(id) => render_status(&focus.select_category(id).await?),
        ShellCommand::Login => render_status(&focus.begin_onboarding().await?),
        ShellCommand::CancelLogin => render_status(&focus.cancel_onboarding().await?),
        ShellCommand::Profile { username, email } => {
            render_profile(&focus.create_profile(username, email).await?)
        }
        ShellCommand::Search(query) => {
            let hits = focus.search_directory(&query);
            if hits.is_empty() {
                "no users found".to_string()
            } else {
                hits.iter()
                    .map(|f| format!("{:<4} {:<16} {}", f.id, f.username, f.status.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        ShellCommand::AddFriend(id) => render_profile(&focus.add_friend(id).await?),
        ShellCommand::RemoveFriend(id) => render_profile(&focus.remove_friend(id).await?),
        ShellCommand::Stats => render_stats(&focus.stats().await?),
        ShellCommand::Status => render_status(&focus.snapshot().await?),
        ShellCommand::Clear => {
            focus.clear_stats().await?;
            "history cleared".to_string()
        }
        ShellCommand::Help => HELP.to_string(),
        ShellCommand::Quit => String::new(),
    };
    Ok(output)
}

pub fn render_status(snapshot: &FocusSnapshot) -> String {
    let ctx = &snapshot.context;
    let detail = match ctx.state {
        AppState::Idle | AppState::TimerSelection => {
            format!("{} min selected", ctx.selected_duration_minutes)
        }
        AppState::Focus | AppState::Paused => format_clock(ctx.time_left),
        AppState::Warning => format!(
            "{:?} in {}s",
            ctx.warning_type.unwrap_or(WarningType::Away),
            ctx.warning_time
        ),
        AppState::PhoneJail | AppState::UserAway => {
            format!("wasted {}", format_duration(ctx.distraction_time.seconds()))
        }
        AppState::Rest => format!("break {}", format_clock(ctx.rest_time_left)),
        AppState::Onboarding => "create a profile: profile <username> <email>".to_string(),
    };

    let mut line = format!(
        "{} | {} | camera {}",
        ctx.state,
        detail,
        if ctx.camera_on { "on" } else { "off" }
    );
    if let Some(category) = &ctx.selected_category_id {
        line.push_str(&format!(" | category {category}"));
    }
    if snapshot.scanning {
        line.push_str(" | scanning");
    }
    line
}

fn render_categories(stats: &UserStats) -> String {
    if stats.categories.is_empty() {
        return "no categories".to_string();
    }
    stats
        .categories
        .iter()
        .map(|c| format!("{}  {} ({})", c.id, c.name, c.color))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_profile(stats: &UserStats) -> String {
    match &stats.user_profile {
        None => "no profile yet, run 'login' first".to_string(),
        Some(profile) => {
            let mut out = format!("{} <{}>", profile.username, profile.email);
            for friend in &profile.friends {
                out.push_str(&format!("\n  {} ({})", friend.username, friend.status.as_str()));
            }
            out
        }
    }
}

fn render_stats(stats: &UserStats) -> String {
    let mut out = format!(
        "focus {} | distraction {} | {} focus sessions",
        format_duration(stats.total_focus_time),
        format_duration(stats.total_distraction_time),
        stats.focus_session_count()
    );
    for row in stats.breakdown_by_category() {
        out.push_str(&format!(
            "\n  {:<16} focus {:<8} distraction {}",
            row.label,
            format_duration(row.focus_seconds),
            format_duration(row.distraction_seconds)
        ));
    }
    out
}
