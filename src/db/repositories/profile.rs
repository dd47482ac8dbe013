use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::db::{
    connection::Database,
    models::{profile::avatar_url_for, Friend, UserProfile, UserStats},
};

impl Database {
    /// Create the profile once. An existing profile is left untouched.
    pub async fn create_profile(
        &self,
        username: String,
        email: String,
        created_at: DateTime<Utc>,
    ) -> Result<UserStats> {
        self.modify_stats(move |stats| {
            if stats.user_profile.is_some() {
                return false;
            }
            stats.user_profile = Some(UserProfile {
                id: format!("user_{}", created_at.timestamp_millis()),
                avatar_url: avatar_url_for(&username),
                username,
                email,
                friends: Vec::new(),
            });
            true
        })
        .await
    }

    /// Store a snapshot of `friend`. Requires a profile; duplicates are ignored.
    pub async fn add_friend(&self, friend: Friend) -> Result<UserStats> {
        self.modify_stats(move |stats| match stats.user_profile.as_mut() {
            Some(profile) if !profile.has_friend(&friend.id) => {
                profile.friends.push(friend);
                true
            }
            _ => false,
        })
        .await
    }

    pub async fn remove_friend(&self, friend_id: &str) -> Result<UserStats> {
        let friend_id = friend_id.to_string();
        self.modify_stats(move |stats| {
            let Some(profile) = stats.user_profile.as_mut() else {
                return false;
            };
            let before = profile.friends.len();
            profile.friends.retain(|f| f.id != friend_id);
            profile.friends.len() != before
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::FriendStatus;
    use tempfile::TempDir;

    fn open() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::new(dir.path().join("profile.sqlite3")).unwrap();
        (dir, db)
    }

    fn friend(id: &str) -> Friend {
        Friend {
            id: id.to_string(),
            username: format!("user_{id}"),
            avatar_url: avatar_url_for(id),
            status: FriendStatus::Online,
        }
    }

    #[tokio::test]
    async fn profile_is_created_once() {
        let (_dir, db) = open();
        let first = db
            .create_profile("ada".into(), "ada@example.com".into(), Utc::now())
            .await
            .unwrap();
        let second = db
            .create_profile("grace".into(), "grace@example.com".into(), Utc::now())
            .await
            .unwrap();

        let profile = second.user_profile.unwrap();
        assert_eq!(profile.username, "ada");
        assert_eq!(Some(profile), first.user_profile);
    }

    #[tokio::test]
    async fn friends_need_a_profile() {
        let (_dir, db) = open();
        let stats = db.add_friend(friend("u1")).await.unwrap();
        assert!(stats.user_profile.is_none());
    }

    #[tokio::test]
    async fn friends_are_keyed_by_id() {
        let (_dir, db) = open();
        db.create_profile("ada".into(), "ada@example.com".into(), Utc::now())
            .await
            .unwrap();
        db.add_friend(friend("u1")).await.unwrap();
        db.add_friend(friend("u1")).await.unwrap();
        let stats = db.add_friend(friend("u2")).await.unwrap();
        assert_eq!(stats.user_profile.as_ref().unwrap().friends.len(), 2);

        let stats = db.remove_friend("u1").await.unwrap();
        let friends = stats.user_profile.unwrap().friends;
        assert_eq!(friends, vec![friend("u2")]);
    }
}
