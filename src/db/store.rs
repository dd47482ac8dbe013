//! Infallible facade over [`Database`] used by the focus flow.
//!
//! Every storage error is logged and replaced by a safe value: reads fall back
//! to empty stats, failed writes return the latest readable record.

use std::future::Future;

use anyhow::Result;
use chrono::Utc;
use log::warn;

use super::{
    connection::Database,
    models::{Category, Friend, Session, UserStats},
};
use crate::social;

#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Latest record with totals rebuilt from the session log.
    pub async fn load(&self) -> UserStats {
        match self.db.load_stats().await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("Failed to load stats, starting fresh: {err:#}");
                UserStats::default()
            }
        }
    }

    pub async fn save(&self, stats: UserStats) {
        if let Err(err) = self.db.save_stats(stats).await {
            warn!("Failed to save stats: {err:#}");
        }
    }

    pub async fn append_session(&self, session: Session) -> UserStats {
        self.or_latest("append session", self.db.append_session(session))
            .await
    }

    pub async fn add_category(&self, category: Category) -> UserStats {
        self.or_latest("add category", self.db.add_category(category))
            .await
    }

    pub async fn remove_category(&self, category_id: &str) -> UserStats {
        self.or_latest("remove category", self.db.remove_category(category_id))
            .await
    }

    pub async fn create_profile(&self, username: &str, email: &str) -> UserStats {
        self.or_latest(
            "create profile",
            self.db
                .create_profile(username.to_string(), email.to_string(), Utc::now()),
        )
        .await
    }

    pub fn search_directory(&self, query: &str) -> Vec<Friend> {
        social::search_directory(query)
    }

    /// Add a directory user by id. Unknown ids leave the record unchanged.
    pub async fn add_friend(&self, friend_id: &str) -> UserStats {
        match social::find_user(friend_id) {
            Some(friend) => {
                self.or_latest("add friend", self.db.add_friend(friend))
                    .await
            }
            None => self.load().await,
        }
    }

    pub async fn remove_friend(&self, friend_id: &str) -> UserStats {
        self.or_latest("remove friend", self.db.remove_friend(friend_id))
            .await
    }

    pub async fn clear(&self) {
        if let Err(err) = self.db.clear_stats().await {
            warn!("Failed to clear stats: {err:#}");
        }
    }

    async fn or_latest(
        &self,
        operation: &str,
        fut: impl Future<Output = Result<UserStats>>,
    ) -> UserStats {
        match fut.await {
            Ok(stats) => stats,
            Err(err) => {
                warn!("Failed to {operation}: {err:#}");
                self.load().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SessionType;
    use tempfile::TempDir;

    fn open() -> (TempDir, SessionStore) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("store.sqlite3")).unwrap();
        (dir, SessionStore::new(db))
    }

    #[tokio::test]
    async fn friends_come_from_the_directory() {
        let (_dir, store) = open();
        store.create_profile("ada", "ada@example.com").await;

        let stats = store.add_friend("u2").await;
        let friends = &stats.user_profile.as_ref().unwrap().friends;
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "code_ninja");

        let stats = store.add_friend("nobody").await;
        assert_eq!(stats.user_profile.unwrap().friends.len(), 1);
    }

    #[tokio::test]
    async fn search_goes_through_the_directory() {
        let (_dir, store) = open();
        assert_eq!(store.search_directory("ninja").len(), 1);
        assert!(store.search_directory("").is_empty());
    }

    #[tokio::test]
    async fn refresh_after_append_is_stable() {
        let (_dir, store) = open();
        let session = Session::ended_at(SessionType::Distraction, 8, Utc::now(), None);
        let appended = store.append_session(session).await;

        let first = store.load().await;
        let second = store.load().await;
        assert_eq!(first, appended);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn saved_totals_are_rebuilt_on_load() {
        let (_dir, store) = open();
        let mut stats = UserStats::default();
        stats.sessions = vec![
            Session::ended_at(SessionType::Focus, 1500, Utc::now(), None),
            Session::ended_at(SessionType::Distraction, 45, Utc::now(), None),
        ];
        stats.total_focus_time = 9999;
        stats.total_distraction_time = 1;
        store.save(stats.clone()).await;

        let loaded = store.load().await;
        assert_eq!(loaded.sessions, stats.sessions);
        assert_eq!(loaded.total_focus_time, 1500);
        assert_eq!(loaded.total_distraction_time, 45);
    }
}
