pub mod category;
pub mod profile;
pub mod session;
pub mod stats;

pub use category::{Category, MAX_CATEGORIES};
pub use profile::{Friend, FriendStatus, UserProfile};
pub use session::{Session, SessionType};
pub use stats::{CategoryBreakdown, UserStats, UNCATEGORIZED_LABEL};
