use anyhow::{Context, Result};
use log::warn;
use rusqlite::Connection;

use crate::db::{
    connection::Database,
    helpers::{delete_value, read_value, write_value},
    models::{Session, UserStats},
};

/// Storage key of the single stats record.
pub const STATS_KEY: &str = "bold_focus_stats";

/// Read the stored record. A missing or unreadable record is a fresh start.
pub(crate) fn read_stats(conn: &Connection) -> Result<UserStats> {
    let Some(raw) = read_value(conn, STATS_KEY)? else {
        return Ok(UserStats::default());
    };

    match UserStats::from_json(&raw) {
        Ok(stats) => Ok(stats),
        Err(err) => {
            warn!("Discarding unreadable stats record: {err:#}");
            Ok(UserStats::default())
        }
    }
}

pub(crate) fn write_stats(conn: &Connection, stats: &UserStats) -> Result<()> {
    let raw = stats.to_json()?;
    write_value(conn, STATS_KEY, &raw)
}

impl Database {
    pub async fn load_stats(&self) -> Result<UserStats> {
        self.execute(|conn| read_stats(conn)).await
    }

    pub async fn save_stats(&self, stats: UserStats) -> Result<()> {
        self.execute(move |conn| write_stats(conn, &stats)).await
    }

    /// Read the latest record, apply `apply`, and write it back if it reported
    /// a change. Runs as one transaction on the DB thread.
    pub(crate) async fn modify_stats<F>(&self, apply: F) -> Result<UserStats>
    where
        F: FnOnce(&mut UserStats) -> bool + Send + 'static,
    {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open stats transaction")?;
            let mut stats = read_stats(&tx)?;
            if apply(&mut stats) {
                stats.recompute_totals();
                write_stats(&tx, &stats)?;
            }
            tx.commit().context("failed to commit stats update")?;
            Ok(stats)
        })
        .await
    }

    pub async fn append_session(&self, session: Session) -> Result<UserStats> {
        self.modify_stats(move |stats| {
            stats.sessions.push(session);
            true
        })
        .await
    }

    pub async fn clear_stats(&self) -> Result<()> {
        self.execute(|conn| delete_value(conn, STATS_KEY)).await
    }
}
