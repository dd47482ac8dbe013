//! Static people directory used by the friends search.

use crate::db::models::{profile::avatar_url_for, Friend, FriendStatus};

const DIRECTORY: &[(&str, &str, &str, FriendStatus)] = &[
    ("u1", "design_guru", "Felix", FriendStatus::Focusing),
    ("u2", "code_ninja", "Aneka", FriendStatus::Online),
    ("u3", "minimalist", "Jude", FriendStatus::Offline),
    ("u4", "swiss_style", "Milo", FriendStatus::Focusing),
    ("u5", "typography_fan", "Sara", FriendStatus::Online),
];

fn entries() -> impl Iterator<Item = Friend> {
    DIRECTORY
        .iter()
        .map(|(id, username, avatar_seed, status)| Friend {
            id: (*id).to_string(),
            username: (*username).to_string(),
            avatar_url: avatar_url_for(avatar_seed),
            status: *status,
        })
}

/// Case-insensitive substring match on username. An empty query matches nothing.
pub fn search_directory(query: &str) -> Vec<Friend> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    entries()
        .filter(|friend| friend.username.to_lowercase().contains(&query))
        .collect()
}

pub fn find_user(id: &str) -> Option<Friend> {
    entries().find(|friend| friend.id == id)
}
