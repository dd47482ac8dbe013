use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Session, SessionType};

/// Seconds spent in PHONE_JAIL or USER_AWAY since the last clear.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistractionAccumulator {
    seconds: u64,
}

impl DistractionAccumulator {
    pub fn tick(&mut self) {
        self.seconds = self.seconds.saturating_add(1);
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn reset(&mut self) {
        self.seconds = 0;
    }

    /// Turn the accumulated time into a DISTRACTION record ending at `now` and
    /// start counting from zero again.
    pub fn materialize(&mut self, now: DateTime<Utc>, category_id: Option<String>) -> Session {
        let seconds = std::mem::take(&mut self.seconds);
        Session::ended_at(SessionType::Distraction, seconds, now, category_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materialize_builds_record_and_resets() {
        let mut acc = DistractionAccumulator::default();
        for _ in 0..42 {
            acc.tick();
        }
        let now = Utc::now();

        let session = acc.materialize(now, Some("work".into()));

        assert_eq!(session.session_type, SessionType::Distraction);
        assert_eq!(session.duration_seconds, 42);
        assert_eq!(session.start_time, now.timestamp_millis() - 42_000);
        assert_eq!(session.category_id.as_deref(), Some("work"));
        assert_eq!(acc.seconds(), 0);
    }

    #[test]
    fn zero_seconds_still_materializes() {
        let mut acc = DistractionAccumulator::default();
        let session = acc.materialize(Utc::now(), None);
        assert_eq!(session.duration_seconds, 0);
    }
}
