//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Planner, executor and listener call store methods; they never execute SQL directly.

use crate::error::ChasingResult;
use rusqlite::{types::Type, Connection, Row};
use rust_decimal::Decimal;
use std::str::FromStr;

mod cadence;
mod customer;
mod history;
mod lock;
mod receivables;
mod tenant;

pub struct ChasingStore {
    conn: Connection,
}

impl ChasingStore {
    pub fn open(path: &str) -> ChasingResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ChasingResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ChasingResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_receivables.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_chasing_history.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/004_locks.sql"))?;
        Ok(())
    }

    /// Run `f` inside one transaction. Commits on `Ok`, rolls back on `Err`.
    /// Not reentrant: `f` must not open another transaction.
    pub fn transaction<T, F>(&self, f: F) -> ChasingResult<T>
    where
        F: FnOnce(&Self) -> ChasingResult<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }
}

// ── Column helpers ──────────────────────────────────────────────

/// Read an exact decimal stored as TEXT.
pub(crate) fn decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_decimal_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    match row.get::<_, Option<String>>(idx)? {
        None => Ok(None),
        Some(raw) => Decimal::from_str(&raw).map(Some).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
        }),
    }
}

/// Read a TEXT column through `FromStr` (enums stored by name).
pub(crate) fn parsed_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Read a JSON document stored as TEXT.
pub(crate) fn json_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: serde::de::DeserializeOwned,
{
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
