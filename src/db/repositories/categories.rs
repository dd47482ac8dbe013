use anyhow::Result;
use log::info;

use crate::db::{
    connection::Database,
    models::{Category, UserStats, MAX_CATEGORIES},
};

impl Database {
    /// Add a category. At the cap, or when the id is already taken, the
    /// record is returned unchanged.
    pub async fn add_category(&self, category: Category) -> Result<UserStats> {
        // The cap check runs inside the same DB task as the write.
        self.modify_stats(move |stats| {
            if stats.categories.len() >= MAX_CATEGORIES {
                info!(
                    "Category limit of {} reached; ignoring {}",
                    MAX_CATEGORIES, category.name
                );
                return false;
            }
            if stats.category(&category.id).is_some() {
                return false;
            }
            stats.categories.push(category);
            true
        })
        .await
    }

    /// Remove a category. Sessions that reference it keep their id.
    pub async fn remove_category(&self, category_id: &str) -> Result<UserStats> {
        let category_id = category_id.to_string();
        self.modify_stats(move |stats| {
            let before = stats.categories.len();
            stats.categories.retain(|c| c.id != category_id);
            stats.categories.len() != before
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{Session, SessionType};
    use chrono::Utc;
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("categories.sqlite3")).unwrap();
        (dir, db)
    }

    #[tokio::test]
    async fn third_category_is_rejected() {
        let (_dir, db) = open();
        db.add_category(Category::new("1", "Work", "#FF4500"))
            .await
            .unwrap();
        let before = db
            .add_category(Category::new("2", "Study", "#1E90FF"))
            .await
            .unwrap();
        let after = db
            .add_category(Category::new("3", "Music", "#32CD32"))
            .await
            .unwrap();

        assert_eq!(after.categories.len(), MAX_CATEGORIES);
        assert_eq!(after, before);
        assert_eq!(db.load_stats().await.unwrap(), before);
    }

    #[tokio::test]
    async fn duplicate_id_is_a_noop() {
        let (_dir, db) = open();
        db.add_category(Category::new("1", "Work", "#FF4500"))
            .await
            .unwrap();
        let stats = db
            .add_category(Category::new("1", "Other", "#000000"))
            .await
            .unwrap();

        assert_eq!(stats.categories, vec![Category::new("1", "Work", "#FF4500")]);
    }

    #[tokio::test]
    async fn removing_unknown_category_changes_nothing() {
        let (_dir, db) = open();
        db.add_category(Category::new("1", "Work", "#FF4500"))
            .await
            .unwrap();
        let stats = db.remove_category("missing").await.unwrap();
        assert_eq!(stats.categories.len(), 1);
    }

    #[tokio::test]
    async fn removal_leaves_historical_references_dangling() {
        let (_dir, db) = open();
        db.add_category(Category::new("work", "Work", "#FF4500"))
            .await
            .unwrap();
        for secs in [60, 120, 180] {
            let session =
                Session::ended_at(SessionType::Focus, secs, Utc::now(), Some("work".into()));
            db.append_session(session).await.unwrap();
        }

        let stats = db.remove_category("work").await.unwrap();

        assert!(stats.categories.is_empty());
        assert_eq!(stats.sessions.len(), 3);
        assert!(stats
            .sessions
            .iter()
            .all(|s| s.category_id.as_deref() == Some("work")));
        assert_eq!(stats.total_focus_time, 360);
    }
}
