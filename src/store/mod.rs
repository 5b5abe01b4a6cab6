//! SQLite-backed persistence for vector categories.
//!
//! Each category lives in its own table:
//!
//! ```text
//! id INTEGER PRIMARY KEY AUTOINCREMENT
//! vector TEXT             -- raw vector, JSON array
//! normalized_vector TEXT  -- unit vector, JSON array
//! magnitude REAL
//! binary_code BLOB        -- sign bits, ceil(D/8) bytes
//! model_tag TEXT          -- NULL when no tag was active
//! created INTEGER         -- unix seconds
//! ```
//!
//! with an index on `binary_code` and a `CHECK` on the code and vector
//! lengths. The `embedstore_categories` table records each category's
//! dimension. The `HAMMING_DISTANCE` and `COSIM` SQL functions are
//! registered on every connection.

mod database;
pub mod functions;
mod record;
mod schema;
mod table;

pub use database::Database;
pub use record::{SearchHit, VectorRecord};
pub use schema::{
    CATEGORY_TABLE, CategorySpec, DEFAULT_TABLE_PREFIX, TableEngine, validate_identifier,
};
pub use table::{ScoringSite, VectorTable};
