use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::error::{HoaError, Result};
use crate::models::{Month, PaymentStatus, RateChange, ReceiptStatus};

pub const SCHEMA_VERSION: u32 = 4;

pub const INITIAL_RATE_NOTE: &str = "Initial rate";

/// One schema upgrade, applied when the stored version is below `version`.
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: fn(&Connection) -> Result<()>,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create hoas store",
        up: create_hoas,
    },
    Migration {
        version: 2,
        description: "create contributions and expenses stores",
        up: create_transactions,
    },
    Migration {
        version: 3,
        description: "backfill contribution receipt status",
        up: add_receipt_status,
    },
    Migration {
        version: 4,
        description: "backfill hoa contribution rate history",
        up: add_rate_history,
    },
];

pub fn user_version(conn: &Connection) -> Result<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

/// Apply every migration above the stored version, up to `target`, in a
/// single transaction.
pub(crate) fn upgrade(conn: &mut Connection, target: u32) -> Result<u32> {
    let current = user_version(conn)?;
    if current > SCHEMA_VERSION {
        return Err(HoaError::SchemaTooNew {
            found: current,
            supported: SCHEMA_VERSION,
        });
    }
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| m.version > current && m.version <= target)
        .collect();
    let Some(last) = pending.last().map(|m| m.version) else {
        return Ok(current);
    };

    let tx = conn.transaction()?;
    for migration in pending {
        info!(version = migration.version, "applying migration: {}", migration.description);
        (migration.up)(&tx)?;
    }
    tx.pragma_update(None, "user_version", last)?;
    tx.commit()?;
    Ok(last)
}

fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns.iter().any(|c| c == column))
}

// ---------------------------------------------------------------------------
// v1, v2: stores and indexes
// ---------------------------------------------------------------------------

fn create_hoas(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS hoas (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            address TEXT,
            number_of_units INTEGER NOT NULL,
            monthly_contribution REAL NOT NULL,
            country TEXT,
            opening_balance REAL,
            is_demo INTEGER,
            created_at TEXT,
            updated_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_hoas_name ON hoas(name);
        CREATE INDEX IF NOT EXISTS idx_hoas_created_at ON hoas(created_at);
        ",
    )?;
    Ok(())
}

fn create_transactions(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS contributions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hoa_id INTEGER NOT NULL,
            unit_number INTEGER NOT NULL,
            start_month TEXT NOT NULL,
            end_month TEXT,
            amount REAL NOT NULL,
            payment_status TEXT,
            receipt_delivered INTEGER,
            contribution_type TEXT,
            purpose TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_contributions_hoa_id ON contributions(hoa_id);
        CREATE INDEX IF NOT EXISTS idx_contributions_unit_number ON contributions(unit_number);
        CREATE INDEX IF NOT EXISTS idx_contributions_start_month ON contributions(start_month);
        CREATE INDEX IF NOT EXISTS idx_contributions_created_at ON contributions(created_at);

        CREATE TABLE IF NOT EXISTS expenses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            hoa_id INTEGER NOT NULL,
            type TEXT NOT NULL,
            description TEXT,
            amount REAL NOT NULL,
            payment_status TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_expenses_hoa_id ON expenses(hoa_id);
        CREATE INDEX IF NOT EXISTS idx_expenses_type ON expenses(type);
        CREATE INDEX IF NOT EXISTS idx_expenses_created_at ON expenses(created_at);
        ",
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// v3: receipt status
// ---------------------------------------------------------------------------

/// The contribution fields the receipt-status backfill reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiptFields {
    pub payment_status: Option<String>,
    pub receipt_delivered: Option<bool>,
    pub receipt_status: Option<String>,
}

/// Derive a receipt status for records written before the workflow existed.
/// Records that already carry one are returned unchanged.
pub fn backfill_receipt_status(mut record: ReceiptFields) -> ReceiptFields {
    if record.receipt_status.is_some() {
        return record;
    }
    let status = if record.receipt_delivered == Some(true) {
        ReceiptStatus::Delivered
    } else if PaymentStatus::from_stored(record.payment_status.as_deref()) == PaymentStatus::Paid {
        ReceiptStatus::WithConcierge
    } else {
        ReceiptStatus::NotPrinted
    };
    record.receipt_status = Some(status.as_str().to_string());
    record
}

fn add_receipt_status(conn: &Connection) -> Result<()> {
    if !has_column(conn, "contributions", "receipt_status")? {
        conn.execute("ALTER TABLE contributions ADD COLUMN receipt_status TEXT", [])?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, payment_status, receipt_delivered, receipt_status FROM contributions \
         WHERE receipt_status IS NULL",
    )?;
    let rows: Vec<(i64, ReceiptFields)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                ReceiptFields {
                    payment_status: row.get(1)?,
                    receipt_delivered: row.get(2)?,
                    receipt_status: row.get(3)?,
                },
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut backfilled = 0usize;
    for (id, before) in rows {
        let after = backfill_receipt_status(before.clone());
        if after != before {
            conn.execute(
                "UPDATE contributions SET receipt_status = ?1 WHERE id = ?2",
                params![after.receipt_status, id],
            )?;
            backfilled += 1;
        }
    }
    info!(backfilled, "receipt status backfill complete");
    Ok(())
}

// ---------------------------------------------------------------------------
// v4: contribution rate history
// ---------------------------------------------------------------------------

/// The HOA fields the rate-history backfill reads and writes.
#[derive(Debug, Clone, PartialEq)]
pub struct RateHistoryFields {
    pub created_at: Option<DateTime<Utc>>,
    pub monthly_contribution: f64,
    pub contribution_rate_history: Option<Vec<RateChange>>,
}

/// Give an HOA without a rate history a single "Initial rate" entry dated to
/// its creation month (or `today` when the creation date is unknown).
pub fn backfill_rate_history(mut record: RateHistoryFields, today: Month) -> RateHistoryFields {
    if record
        .contribution_rate_history
        .as_ref()
        .is_some_and(|history| !history.is_empty())
    {
        return record;
    }
    let effective_date = record
        .created_at
        .map(|at| Month::from_date(&at))
        .unwrap_or(today);
    record.contribution_rate_history = Some(vec![RateChange {
        effective_date,
        amount: record.monthly_contribution,
        note: INITIAL_RATE_NOTE.to_string(),
    }]);
    record
}

fn add_rate_history(conn: &Connection) -> Result<()> {
    if !has_column(conn, "hoas", "contribution_rate_history")? {
        conn.execute("ALTER TABLE hoas ADD COLUMN contribution_rate_history TEXT", [])?;
    }

    let mut stmt = conn.prepare(
        "SELECT id, created_at, monthly_contribution, contribution_rate_history FROM hoas",
    )?;
    let rows: Vec<(i64, Option<DateTime<Utc>>, f64, Option<String>)> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let today = Month::current();
    let mut backfilled = 0usize;
    for (id, created_at, monthly_contribution, raw_history) in rows {
        let history = match raw_history.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match serde_json::from_str::<Vec<RateChange>>(raw) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(hoa_id = id, error = %e, "leaving unreadable rate history untouched");
                    continue;
                }
            },
        };
        let before = RateHistoryFields {
            created_at,
            monthly_contribution,
            contribution_rate_history: history,
        };
        let after = backfill_rate_history(before.clone(), today);
        if after != before {
            let json = serde_json::to_string(&after.contribution_rate_history)?;
            conn.execute(
                "UPDATE hoas SET contribution_rate_history = ?1 WHERE id = ?2",
                params![json, id],
            )?;
            backfilled += 1;
        }
    }
    info!(backfilled, "rate history backfill complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Store, DB_FILE};
    use crate::models::{ContributionType, PaymentStatus};

    fn legacy_db() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        let mut conn = Connection::open(&path).unwrap();
        upgrade(&mut conn, 2).unwrap();
        assert_eq!(user_version(&conn).unwrap(), 2);
        conn.execute(
            "INSERT INTO hoas (name, address, number_of_units, monthly_contribution, country, opening_balance, is_demo, created_at) \
             VALUES ('Les Palmiers', '12 Rue Atlas', 8, 250.0, 'MA', 0.0, 0, '2024-06-15 10:00:00+00:00')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO hoas (name, number_of_units, monthly_contribution) VALUES ('No Date', 4, 90.0)",
            [],
        )
        .unwrap();
        for (payment, delivered) in [("paid", Some(true)), ("paid", Some(false)), ("pending", None)] {
            conn.execute(
                "INSERT INTO contributions (hoa_id, unit_number, start_month, amount, payment_status, receipt_delivered, created_at) \
                 VALUES (1, 1, '2024-07', 250.0, ?1, ?2, '2024-07-01 09:00:00+00:00')",
                params![payment, delivered],
            )
            .unwrap();
        }
        (dir, path)
    }

    #[test]
    fn test_receipt_backfill_delivered_wins() {
        let out = backfill_receipt_status(ReceiptFields {
            payment_status: Some("pending".to_string()),
            receipt_delivered: Some(true),
            receipt_status: None,
        });
        assert_eq!(out.receipt_status.as_deref(), Some("delivered"));
    }

    #[test]
    fn test_receipt_backfill_paid_goes_to_concierge() {
        let out = backfill_receipt_status(ReceiptFields {
            payment_status: Some("paid".to_string()),
            receipt_delivered: None,
            receipt_status: None,
        });
        assert_eq!(out.receipt_status.as_deref(), Some("with_concierge"));
    }

    #[test]
    fn test_receipt_backfill_defaults_to_not_printed() {
        let out = backfill_receipt_status(ReceiptFields {
            payment_status: None,
            receipt_delivered: None,
            receipt_status: None,
        });
        assert_eq!(out.receipt_status.as_deref(), Some("not_printed"));
    }

    #[test]
    fn test_receipt_backfill_keeps_explicit_value() {
        let record = ReceiptFields {
            payment_status: Some("paid".to_string()),
            receipt_delivered: Some(true),
            receipt_status: Some("printed".to_string()),
        };
        assert_eq!(backfill_receipt_status(record.clone()), record);
    }

    #[test]
    fn test_rate_backfill_uses_creation_month() {
        let created: DateTime<Utc> = "2024-06-15T10:00:00Z".parse().unwrap();
        let out = backfill_rate_history(
            RateHistoryFields {
                created_at: Some(created),
                monthly_contribution: 250.0,
                contribution_rate_history: None,
            },
            "2025-10".parse().unwrap(),
        );
        let history = out.contribution_rate_history.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].effective_date.to_string(), "2024-06");
        assert_eq!(history[0].amount, 250.0);
        assert_eq!(history[0].note, INITIAL_RATE_NOTE);
    }

    #[test]
    fn test_rate_backfill_falls_back_to_today() {
        let out = backfill_rate_history(
            RateHistoryFields {
                created_at: None,
                monthly_contribution: 90.0,
                contribution_rate_history: Some(vec![]),
            },
            "2025-10".parse().unwrap(),
        );
        assert_eq!(out.contribution_rate_history.unwrap()[0].effective_date.to_string(), "2025-10");
    }

    #[test]
    fn test_rate_backfill_keeps_existing_history() {
        let record = RateHistoryFields {
            created_at: None,
            monthly_contribution: 150.0,
            contribution_rate_history: Some(vec![RateChange {
                effective_date: "2025-01".parse().unwrap(),
                amount: 100.0,
                note: "Initial rate".to_string(),
            }]),
        };
        assert_eq!(backfill_rate_history(record.clone(), Month::current()), record);
    }

    #[test]
    fn test_upgrade_from_v2_backfills_legacy_records() {
        let (_dir, path) = legacy_db();
        let store = Store::open(&path).unwrap();
        assert_eq!(store.schema_version().unwrap(), SCHEMA_VERSION);

        let contributions = store.contributions().get_all_by_owner(1).unwrap();
        let statuses: Vec<ReceiptStatus> = contributions.iter().map(|c| c.receipt_status).collect();
        assert_eq!(
            statuses,
            vec![ReceiptStatus::Delivered, ReceiptStatus::WithConcierge, ReceiptStatus::NotPrinted]
        );
        assert!(contributions[0].receipt_delivered);
        assert!(contributions.iter().all(|c| c.contribution_type == ContributionType::Regular));
        assert_eq!(contributions[2].payment_status, PaymentStatus::Pending);

        let dated = store.hoas().get_by_id(1).unwrap().unwrap();
        assert_eq!(dated.contribution_rate_history.len(), 1);
        assert_eq!(dated.contribution_rate_history[0].effective_date.to_string(), "2024-06");
        assert_eq!(dated.contribution_rate_history[0].amount, 250.0);

        let undated = store.hoas().get_by_id(2).unwrap().unwrap();
        assert_eq!(undated.contribution_rate_history[0].effective_date, Month::current());
        assert_eq!(undated.country, "MA");
    }

    #[test]
    fn test_upgrade_is_noop_at_current_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        assert_eq!(upgrade(&mut conn, SCHEMA_VERSION).unwrap(), SCHEMA_VERSION);
        assert_eq!(upgrade(&mut conn, SCHEMA_VERSION).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrations_are_ordered() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
        let mut sorted = versions.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(versions, sorted);
        assert_eq!(versions.last().copied(), Some(SCHEMA_VERSION));
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DB_FILE);
        let conn = Connection::open(&path).unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1).unwrap();
        drop(conn);
        let err = Store::open(&path).err().expect("open should fail");
        assert!(matches!(err, HoaError::SchemaTooNew { .. }), "got: {err}");
    }
}
