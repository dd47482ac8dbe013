mod categories;
mod profile;
mod stats;

pub use stats::STATS_KEY;
