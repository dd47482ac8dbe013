//! Persisted session records.
//!
//! Field names follow the stored JSON record (`startTime`, `durationSeconds`,
//! `type`, `date`, `categoryId`) so records written by earlier versions load as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::{NoContext, Timestamp, Uuid};

use crate::utils::time::epoch_millis;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    Focus,
    Distraction,
}

impl SessionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::Focus => "FOCUS",
            SessionType::Distraction => "DISTRACTION",
        }
    }
}

/// A completed interval. Built once when the interval ends and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Epoch milliseconds, back-computed from the save instant.
    pub start_time: i64,
    pub duration_seconds: u64,
    #[serde(rename = "type")]
    pub session_type: SessionType,
    /// Save instant, not start instant.
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl Session {
    /// Record an interval of `duration_seconds` that ends at `ended_at`.
    pub fn ended_at(
        session_type: SessionType,
        duration_seconds: u64,
        ended_at: DateTime<Utc>,
        category_id: Option<String>,
    ) -> Self {
        let duration_ms = i64::try_from(duration_seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
        Self {
            id: session_id_for(ended_at),
            start_time: epoch_millis(ended_at).saturating_sub(duration_ms),
            duration_seconds,
            session_type,
            date: ended_at,
            category_id,
        }
    }

    pub fn is_focus(&self) -> bool {
        self.session_type == SessionType::Focus
    }
}

/// Time-ordered id carrying the save instant in its leading bits.
fn session_id_for(instant: DateTime<Utc>) -> String {
    let seconds = u64::try_from(instant.timestamp()).unwrap_or(0);
    let ts = Timestamp::from_unix(NoContext, seconds, instant.timestamp_subsec_nanos());
    Uuid::new_v7(ts).to_string()
}
