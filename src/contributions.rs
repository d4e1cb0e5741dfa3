use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::models::{
    Contribution, ContributionPatch, ContributionType, Hoa, Month, NewContribution, PaymentStatus,
    ReceiptStatus,
};
use crate::rates::rate_for_month;

const CONTRIBUTION_COLUMNS: &str = "id, hoa_id, unit_number, start_month, end_month, amount, \
     payment_status, receipt_delivered, receipt_status, contribution_type, purpose, notes, \
     created_at, updated_at";

struct ContributionRow {
    id: i64,
    hoa_id: i64,
    unit_number: u32,
    start_month: Month,
    end_month: Option<Month>,
    amount: f64,
    payment_status: Option<String>,
    receipt_delivered: Option<bool>,
    receipt_status: Option<String>,
    contribution_type: Option<String>,
    purpose: Option<String>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl ContributionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            hoa_id: row.get(1)?,
            unit_number: row.get(2)?,
            start_month: row.get(3)?,
            end_month: row.get(4)?,
            amount: row.get(5)?,
            payment_status: row.get(6)?,
            receipt_delivered: row.get(7)?,
            receipt_status: row.get(8)?,
            contribution_type: row.get(9)?,
            purpose: row.get(10)?,
            notes: row.get(11)?,
            created_at: row.get(12)?,
            updated_at: row.get(13)?,
        })
    }

    /// Fill in defaults for fields older records never had. The receipt
    /// status is authoritative; the delivered flag is derived from it.
    fn normalize(self) -> Contribution {
        let payment_status = PaymentStatus::from_stored(self.payment_status.as_deref());
        let receipt_status = self
            .receipt_status
            .as_deref()
            .and_then(ReceiptStatus::parse_stored)
            .unwrap_or(if self.receipt_delivered == Some(true) {
                ReceiptStatus::Delivered
            } else {
                ReceiptStatus::NotPrinted
            });
        Contribution {
            id: self.id,
            hoa_id: self.hoa_id,
            unit_number: self.unit_number,
            start_month: self.start_month,
            end_month: self.end_month,
            amount: self.amount,
            payment_status,
            receipt_delivered: receipt_status.is_delivered(),
            receipt_status,
            contribution_type: ContributionType::from_stored(self.contribution_type.as_deref()),
            purpose: self.purpose,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

fn check_range(start: Month, end: Option<Month>) -> Result<()> {
    match end {
        Some(end) if end < start => Err(HoaError::InvalidMonthRange { start, end }),
        _ => Ok(()),
    }
}

/// Dues owed for `[start, end]`, summing the rate in effect for each month.
pub fn regular_amount(hoa: &Hoa, start: Month, end: Option<Month>) -> f64 {
    start
        .iter_through(end.unwrap_or(start))
        .map(|month| rate_for_month(hoa, month))
        .sum()
}

impl NewContribution {
    /// A pending regular contribution for one unit, priced from the HOA's
    /// rate history.
    pub fn regular(hoa: &Hoa, unit_number: u32, start_month: Month, end_month: Option<Month>) -> Self {
        Self {
            end_month,
            ..Self::new(hoa.id, unit_number, start_month, regular_amount(hoa, start_month, end_month))
        }
    }
}

pub struct ContributionRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ContributionRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn add(&self, new: NewContribution) -> Result<i64> {
        self.add_at(new, Utc::now())
    }

    pub(crate) fn add_at(&self, new: NewContribution, created_at: DateTime<Utc>) -> Result<i64> {
        check_range(new.start_month, new.end_month)?;
        self.conn.execute(
            "INSERT INTO contributions (hoa_id, unit_number, start_month, end_month, amount, \
             payment_status, receipt_delivered, receipt_status, contribution_type, purpose, notes, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                new.hoa_id,
                new.unit_number,
                new.start_month,
                new.end_month,
                new.amount,
                new.payment_status.as_str(),
                new.receipt_status.is_delivered(),
                new.receipt_status.as_str(),
                new.contribution_type.as_str(),
                new.purpose,
                new.notes,
                created_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(contribution_id = id, hoa_id = new.hoa_id, "added contribution");
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Contribution>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {CONTRIBUTION_COLUMNS} FROM contributions WHERE id = ?1"),
                [id],
                ContributionRow::from_row,
            )
            .optional()?;
        Ok(row.map(ContributionRow::normalize))
    }

    pub fn require(&self, id: i64) -> Result<Contribution> {
        self.get_by_id(id)?
            .ok_or_else(|| HoaError::not_found("Contribution", id))
    }

    pub fn get_all_by_owner(&self, hoa_id: i64) -> Result<Vec<Contribution>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {CONTRIBUTION_COLUMNS} FROM contributions WHERE hoa_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([hoa_id], ContributionRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(ContributionRow::normalize).collect())
    }

    /// Merge `patch` onto the stored record. Setting the receipt status to
    /// `delivered` marks the receipt delivered, and vice versa.
    pub fn update(&self, id: i64, patch: ContributionPatch) -> Result<i64> {
        let mut c = self.require(id)?;
        if let Some(unit) = patch.unit_number {
            c.unit_number = unit;
        }
        if let Some(start) = patch.start_month {
            c.start_month = start;
        }
        if let Some(end) = patch.end_month {
            c.end_month = end;
        }
        if let Some(amount) = patch.amount {
            c.amount = amount;
        }
        if let Some(status) = patch.payment_status {
            c.payment_status = status;
        }
        if let Some(kind) = patch.contribution_type {
            c.contribution_type = kind;
        }
        if let Some(purpose) = patch.purpose {
            c.purpose = purpose;
        }
        if let Some(notes) = patch.notes {
            c.notes = notes;
        }
        match (patch.receipt_status, patch.receipt_delivered) {
            (Some(status), _) => c.receipt_status = status,
            (None, Some(true)) => c.receipt_status = ReceiptStatus::Delivered,
            (None, Some(false)) if c.receipt_status.is_delivered() => {
                c.receipt_status = ReceiptStatus::WithConcierge
            }
            _ => {}
        }
        c.receipt_delivered = c.receipt_status.is_delivered();
        check_range(c.start_month, c.end_month)?;

        self.conn.execute(
            "UPDATE contributions SET unit_number = ?1, start_month = ?2, end_month = ?3, amount = ?4, \
             payment_status = ?5, receipt_delivered = ?6, receipt_status = ?7, contribution_type = ?8, \
             purpose = ?9, notes = ?10, updated_at = ?11 WHERE id = ?12",
            params![
                c.unit_number,
                c.start_month,
                c.end_month,
                c.amount,
                c.payment_status.as_str(),
                c.receipt_delivered,
                c.receipt_status.as_str(),
                c.contribution_type.as_str(),
                c.purpose,
                c.notes,
                Utc::now(),
                id,
            ],
        )?;
        debug!(contribution_id = id, "updated contribution");
        Ok(id)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM contributions WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn clear_by_owner(&self, hoa_id: i64) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM contributions WHERE hoa_id = ?1", [hoa_id])?)
    }

    pub(crate) fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM contributions", [])?)
    }
}

/// Delete several contributions at once; either all go or none do.
pub fn delete_many(store: &Store, ids: &[i64]) -> Result<usize> {
    let deleted = store.atomic(|conn| {
        let mut deleted = 0usize;
        for id in ids {
            deleted += conn.execute("DELETE FROM contributions WHERE id = ?1", [id])?;
        }
        Ok(deleted)
    })?;
    debug!(requested = ids.len(), deleted, "bulk deleted contributions");
    Ok(deleted)
}
