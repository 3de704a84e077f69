//! SQLite backend.

mod audit;
mod clients;
mod clinics;
mod criteria;
mod outreach;
mod schema;
mod settings;
mod templates;

pub use schema::*;

use rusqlite::{Connection, ErrorCode};
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::store::{Backend, StoreError, StoreResult};

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Initialize schema.
    fn initialize(&self) -> StoreResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Backend for Database {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

/// Parse a stored enum or JSON column.
pub(crate) fn parse_json<T: DeserializeOwned>(column: &str, text: &str) -> StoreResult<T> {
    serde_json::from_str(text)
        .map_err(|e| StoreError::Corrupt(format!("{}: {} ({})", column, text, e)))
}

/// Parse a stored snake_case enum value.
pub(crate) fn parse_enum<T: DeserializeOwned>(column: &str, text: &str) -> StoreResult<T> {
    serde_json::from_value(serde_json::Value::String(text.to_string()))
        .map_err(|_| StoreError::Corrupt(format!("{}: unknown value {:?}", column, text)))
}

/// Map a constraint violation to a validation error; pass everything else through.
pub(crate) fn constraint_as_validation(err: rusqlite::Error, message: impl Into<String>) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::Validation(message.into())
        }
        other => StoreError::Sqlite(other),
    }
}
