mod versioned_schema;

pub use versioned_schema::*;

/// Offset added to `PRAGMA user_version` so databases created by this crate
/// can be told apart from foreign SQLite files.
pub const BASE_DB_VERSION: usize = 41_000;
