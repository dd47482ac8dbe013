pub mod directory;

pub use directory::{find_user, search_directory};
