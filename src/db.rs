use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::contributions::ContributionRepository;
use crate::error::{HoaError, Result};
use crate::expenses::ExpenseRepository;
use crate::hoas::HoaRepository;
use crate::migrations::{self, SCHEMA_VERSION};

pub const DB_FILE: &str = "hoa-ledger.db";

/// Handle to the local ledger database. Open once, pass it to whatever needs
/// it, and close it on shutdown.
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self> {
        let unavailable = |e: rusqlite::Error| {
            HoaError::StorageUnavailable(format!("{}: {e}", path.display()))
        };
        let conn = Connection::open(path).map_err(unavailable)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;").map_err(unavailable)?;
        let store = Self::upgrade(conn, SCHEMA_VERSION)?;
        info!(path = %path.display(), "opened ledger store");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HoaError::StorageUnavailable(e.to_string()))?;
        Self::upgrade(conn, SCHEMA_VERSION)
    }

    fn upgrade(mut conn: Connection, target: u32) -> Result<Self> {
        migrations::upgrade(&mut conn, target)?;
        Ok(Self { conn })
    }

    pub fn schema_version(&self) -> Result<u32> {
        migrations::user_version(&self.conn)
    }

    pub fn hoas(&self) -> HoaRepository<'_> {
        HoaRepository::new(&self.conn)
    }

    pub fn contributions(&self) -> ContributionRepository<'_> {
        ContributionRepository::new(&self.conn)
    }

    pub fn expenses(&self) -> ExpenseRepository<'_> {
        ExpenseRepository::new(&self.conn)
    }

    /// Run `f` inside one SQLite transaction. Any error rolls back every
    /// write `f` made.
    pub fn atomic<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    pub fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| HoaError::Db(e))
    }

    #[cfg(test)]
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join(DB_FILE)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_open_creates_stores() {
        let (_dir, store) = test_store();
        let tables: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &["hoas", "contributions", "expenses"] {
            assert!(tables.contains(&expected.to_string()), "missing store: {expected}");
        }
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_open_creates_indexes() {
        let (_dir, store) = test_store();
        let indexes: Vec<String> = store
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        for expected in &[
            "idx_hoas_name",
            "idx_hoas_created_at",
            "idx_contributions_hoa_id",
            "idx_contributions_unit_number",
            "idx_contributions_start_month",
            "idx_contributions_created_at",
            "idx_expenses_hoa_id",
            "idx_expenses_type",
            "idx_expenses_created_at",
        ] {
            assert!(indexes.contains(&expected.to_string()), "missing index: {expected}");
        }
    }

    #[test]
    fn test_in_memory_store_is_migrated() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
        assert_eq!(store.hoas().count().unwrap(), 0);
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        Store::open(&path).unwrap().close().unwrap();
        let store = Store::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_open_in_missing_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("nested").join(DB_FILE);
        let err = Store::open(&path).err().expect("open should fail");
        assert!(matches!(err, HoaError::StorageUnavailable(_)), "got: {err}");
    }

    #[test]
    fn test_atomic_rolls_back_on_error() {
        let (_dir, store) = test_store();
        let result: Result<()> = store.atomic(|conn| {
            conn.execute(
                "INSERT INTO expenses (hoa_id, type, amount, created_at) VALUES (1, 'water', 10.0, '2025-01-01T00:00:00Z')",
                [],
            )?;
            Err(HoaError::Validation("boom".to_string()))
        });
        assert!(result.is_err());
        let count: i64 = store
            .conn()
            .query_row("SELECT count(*) FROM expenses", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
