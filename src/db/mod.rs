pub mod sqlite;

pub use sqlite::{open_pool, write_snapshot, FeatureTable};
