use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::{HoaError, Result};
use crate::models::{Expense, ExpensePatch, NewExpense, PaymentStatus};

const EXPENSE_COLUMNS: &str =
    "id, hoa_id, type, description, amount, payment_status, created_at, updated_at";

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let payment_status: Option<String> = row.get(5)?;
    Ok(Expense {
        id: row.get(0)?,
        hoa_id: row.get(1)?,
        expense_type: row.get(2)?,
        description: row.get(3)?,
        amount: row.get(4)?,
        payment_status: PaymentStatus::from_stored(payment_status.as_deref()),
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

pub struct ExpenseRepository<'a> {
    conn: &'a Connection,
}

impl<'a> ExpenseRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn add(&self, new: NewExpense) -> Result<i64> {
        self.add_at(new, Utc::now())
    }

    pub(crate) fn add_at(&self, new: NewExpense, created_at: DateTime<Utc>) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO expenses (hoa_id, type, description, amount, payment_status, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.hoa_id,
                new.expense_type,
                new.description,
                new.amount,
                new.payment_status.as_str(),
                created_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(expense_id = id, hoa_id = new.hoa_id, "added expense");
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Expense>> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"),
                [id],
                expense_from_row,
            )
            .optional()?)
    }

    pub fn require(&self, id: i64) -> Result<Expense> {
        self.get_by_id(id)?.ok_or_else(|| HoaError::not_found("Expense", id))
    }

    pub fn get_all_by_owner(&self, hoa_id: i64) -> Result<Vec<Expense>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE hoa_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt
            .query_map([hoa_id], expense_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn update(&self, id: i64, patch: ExpensePatch) -> Result<i64> {
        let mut e = self.require(id)?;
        if let Some(kind) = patch.expense_type {
            e.expense_type = kind;
        }
        if let Some(description) = patch.description {
            e.description = description;
        }
        if let Some(amount) = patch.amount {
            e.amount = amount;
        }
        if let Some(status) = patch.payment_status {
            e.payment_status = status;
        }
        self.conn.execute(
            "UPDATE expenses SET type = ?1, description = ?2, amount = ?3, payment_status = ?4, \
             updated_at = ?5 WHERE id = ?6",
            params![
                e.expense_type,
                e.description,
                e.amount,
                e.payment_status.as_str(),
                Utc::now(),
                id,
            ],
        )?;
        debug!(expense_id = id, "updated expense");
        Ok(id)
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM expenses WHERE id = ?1", [id])?;
        Ok(())
    }

    pub fn clear_by_owner(&self, hoa_id: i64) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM expenses WHERE hoa_id = ?1", [hoa_id])?)
    }

    pub(crate) fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM expenses", [])?)
    }
}
