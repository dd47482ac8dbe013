//! The stored stats record and the views derived from it.
//!
//! Only `sessions` is trusted. `total_focus_time` and `total_distraction_time`
//! are written for readers of the raw record but are recomputed from the log
//! every time the record is loaded.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use log::warn;
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};

use super::{Category, Session, SessionType, UserProfile};

pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct UserStats {
    pub total_focus_time: u64,
    pub total_distraction_time: u64,
    #[serde(deserialize_with = "lenient_entries")]
    pub sessions: Vec<Session>,
    #[serde(deserialize_with = "lenient_entries")]
    pub categories: Vec<Category>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_profile: Option<UserProfile>,
}

/// Per-category totals for the history view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdown {
    pub label: String,
    pub focus_seconds: u64,
    pub distraction_seconds: u64,
}

impl UserStats {
    /// Parse a stored record, filling absent fields with defaults and
    /// rebuilding the totals from the session log.
    pub fn from_json(raw: &str) -> Result<Self> {
        let mut stats: UserStats =
            serde_json::from_str(raw).context("stored stats record is not valid JSON")?;
        stats.recompute_totals();
        Ok(stats)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("failed to serialize stats record")
    }

    pub fn recompute_totals(&mut self) {
        let (focus, distraction) =
            self.sessions
                .iter()
                .fold((0u64, 0u64), |(focus, distraction), session| {
                    match session.session_type {
                        SessionType::Focus => {
                            (focus.saturating_add(session.duration_seconds), distraction)
                        }
                        SessionType::Distraction => {
                            (focus, distraction.saturating_add(session.duration_seconds))
                        }
                    }
                });
        self.total_focus_time = focus;
        self.total_distraction_time = distraction;
    }

    pub fn focus_session_count(&self) -> usize {
        self.sessions.iter().filter(|s| s.is_focus()).count()
    }

    pub fn category(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Display label for a session's category. Sessions whose category was
    /// deleted keep the dangling id and fall back to the uncategorized label.
    pub fn category_label(&self, session: &Session) -> &str {
        session
            .category_id
            .as_deref()
            .and_then(|id| self.category(id))
            .map(|c| c.name.as_str())
            .unwrap_or(UNCATEGORIZED_LABEL)
    }

    pub fn breakdown_by_category(&self) -> Vec<CategoryBreakdown> {
        let mut buckets: BTreeMap<String, (u64, u64)> = BTreeMap::new();
        for session in &self.sessions {
            let entry = buckets
                .entry(self.category_label(session).to_string())
                .or_default();
            match session.session_type {
                SessionType::Focus => entry.0 = entry.0.saturating_add(session.duration_seconds),
                SessionType::Distraction => {
                    entry.1 = entry.1.saturating_add(session.duration_seconds)
                }
            }
        }

        buckets
            .into_iter()
            .map(|(label, (focus_seconds, distraction_seconds))| CategoryBreakdown {
                label,
                focus_seconds,
                distraction_seconds,
            })
            .collect()
    }
}

/// Deserialize a list, dropping entries that no longer match the current
/// shape instead of rejecting the whole record.
fn lenient_entries<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<serde_json::Value>> = Option::deserialize(deserializer)?;
    let raw = raw.unwrap_or_default();
    let total = raw.len();
    let kept: Vec<T> = raw
        .into_iter()
        .filter_map(|value| serde_json::from_value(value).ok())
        .collect();
    if kept.len() != total {
        warn!(
            "Dropped {} unreadable entries from stored stats record",
            total - kept.len()
        );
    }
    Ok(kept)
}
