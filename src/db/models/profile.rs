use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FriendStatus {
    Online,
    Offline,
    Focusing,
}

impl FriendStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FriendStatus::Online => "ONLINE",
            FriendStatus::Offline => "OFFLINE",
            FriendStatus::Focusing => "FOCUSING",
        }
    }
}

/// Snapshot of a directory entry; status is not refreshed after adding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Friend {
    pub id: String,
    pub username: String,
    pub avatar_url: String,
    pub status: FriendStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub username: String,
    pub avatar_url: String,
    #[serde(default)]
    pub friends: Vec<Friend>,
}

impl UserProfile {
    pub fn has_friend(&self, friend_id: &str) -> bool {
        self.friends.iter().any(|f| f.id == friend_id)
    }
}

pub fn avatar_url_for(seed: &str) -> String {
    format!("https://api.dicebear.com/7.x/notionists/svg?seed={seed}")
}
