mod connection;
mod helpers;
mod migrations;
pub mod models;
mod repositories;
mod store;

pub use connection::Database;
pub use models::{Category, Friend, Session, SessionType, UserProfile, UserStats};
pub use repositories::STATS_KEY;
pub use store::SessionStore;
