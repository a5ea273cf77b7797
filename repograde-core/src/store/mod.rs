//! Persistence layer: the [`AnalysisStore`] trait and its SQLite
//! implementation.

pub mod schema;
pub mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::AnalysisStore;
