use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::contributions::ContributionRepository;
use crate::db::Store;
use crate::error::{HoaError, Result};
use crate::expenses::ExpenseRepository;
use crate::migrations::INITIAL_RATE_NOTE;
use crate::models::{Hoa, HoaPatch, Month, NewHoa, RateChange};

pub const DEFAULT_COUNTRY: &str = "MA";

const HOA_COLUMNS: &str = "id, name, address, number_of_units, monthly_contribution, country, \
     opening_balance, is_demo, contribution_rate_history, created_at, updated_at";

/// An HOA row as stored; older rows may lack any of the optional columns.
struct HoaRow {
    id: i64,
    name: String,
    address: Option<String>,
    number_of_units: u32,
    monthly_contribution: f64,
    country: Option<String>,
    opening_balance: Option<f64>,
    is_demo: Option<bool>,
    contribution_rate_history: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl HoaRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            address: row.get(2)?,
            number_of_units: row.get(3)?,
            monthly_contribution: row.get(4)?,
            country: row.get(5)?,
            opening_balance: row.get(6)?,
            is_demo: row.get(7)?,
            contribution_rate_history: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
        })
    }

    fn normalize(self) -> Result<Hoa> {
        let mut history: Vec<RateChange> = match self.contribution_rate_history.as_deref() {
            None | Some("") => Vec::new(),
            Some(raw) => serde_json::from_str(raw)?,
        };
        history.sort_by_key(|change| change.effective_date);

        // Rows from before creation stamps existed date from their initial rate.
        let created_at = self
            .created_at
            .or_else(|| history.first().map(|first| month_start(first.effective_date)))
            .unwrap_or_else(Utc::now);

        Ok(Hoa {
            id: self.id,
            name: self.name,
            address: self.address.unwrap_or_default(),
            number_of_units: self.number_of_units,
            monthly_contribution: self.monthly_contribution,
            country: self
                .country
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COUNTRY.to_string()),
            opening_balance: self.opening_balance.unwrap_or(0.0),
            is_demo: self.is_demo.unwrap_or(false),
            contribution_rate_history: history,
            created_at,
            updated_at: self.updated_at,
        })
    }
}

pub(crate) fn month_start(month: Month) -> DateTime<Utc> {
    chrono::NaiveDate::from_ymd_opt(month.year(), month.month(), 1)
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
        .unwrap_or_else(Utc::now)
}

/// Caller-side checks run before `create`; the repository itself stores
/// whatever it is given.
pub fn validate_new_hoa(new: &NewHoa) -> Result<()> {
    if new.name.trim().is_empty() {
        return Err(HoaError::Validation("name is required".to_string()));
    }
    if new.number_of_units == 0 {
        return Err(HoaError::Validation("number of units must be positive".to_string()));
    }
    if !(new.monthly_contribution.is_finite() && new.monthly_contribution > 0.0) {
        return Err(HoaError::Validation("monthly contribution must be positive".to_string()));
    }
    if !new.opening_balance.is_finite() {
        return Err(HoaError::Validation("opening balance must be a number".to_string()));
    }
    Ok(())
}

pub struct HoaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> HoaRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    pub fn add(&self, new: NewHoa) -> Result<i64> {
        self.add_at(new, Utc::now())
    }

    pub(crate) fn add_at(&self, new: NewHoa, created_at: DateTime<Utc>) -> Result<i64> {
        let mut history = new.contribution_rate_history;
        if history.is_empty() {
            history.push(RateChange {
                effective_date: Month::from_date(&created_at),
                amount: new.monthly_contribution,
                note: INITIAL_RATE_NOTE.to_string(),
            });
        }
        history.sort_by_key(|change| change.effective_date);
        history.dedup_by_key(|change| change.effective_date);
        let country = new
            .country
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_COUNTRY.to_string());

        self.conn.execute(
            "INSERT INTO hoas (name, address, number_of_units, monthly_contribution, country, \
             opening_balance, is_demo, contribution_rate_history, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                new.name,
                new.address,
                new.number_of_units,
                new.monthly_contribution,
                country,
                new.opening_balance,
                new.is_demo,
                serde_json::to_string(&history)?,
                created_at,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(hoa_id = id, "added hoa");
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<Hoa>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {HOA_COLUMNS} FROM hoas WHERE id = ?1"),
                [id],
                HoaRow::from_row,
            )
            .optional()?;
        row.map(HoaRow::normalize).transpose()
    }

    /// Like `get_by_id`, but a missing HOA is an error.
    pub fn require(&self, id: i64) -> Result<Hoa> {
        self.get_by_id(id)?.ok_or_else(|| HoaError::not_found("HOA", id))
    }

    pub fn get_all(&self) -> Result<Vec<Hoa>> {
        let mut stmt = self.conn.prepare(&format!("SELECT {HOA_COLUMNS} FROM hoas ORDER BY id"))?;
        let rows = stmt
            .query_map([], HoaRow::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows.into_iter().map(HoaRow::normalize).collect()
    }

    pub fn count(&self) -> Result<i64> {
        Ok(self.conn.query_row("SELECT count(*) FROM hoas", [], |r| r.get(0))?)
    }

    pub fn all_demo_ids(&self) -> Result<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM hoas WHERE is_demo = 1 ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    pub fn update(&self, id: i64, patch: HoaPatch) -> Result<i64> {
        let mut hoa = self.require(id)?;
        if let Some(name) = patch.name {
            hoa.name = name;
        }
        if let Some(address) = patch.address {
            hoa.address = address;
        }
        if let Some(units) = patch.number_of_units {
            hoa.number_of_units = units;
        }
        if let Some(country) = patch.country {
            hoa.country = country;
        }
        if let Some(balance) = patch.opening_balance {
            hoa.opening_balance = balance;
        }
        if let Some(is_demo) = patch.is_demo {
            hoa.is_demo = is_demo;
        }
        self.write(&hoa)?;
        debug!(hoa_id = id, "updated hoa");
        Ok(id)
    }

    /// Replace the rate history and the current rate in one write.
    pub(crate) fn set_rate_history(&self, id: i64, history: &[RateChange], current_rate: f64) -> Result<()> {
        let mut hoa = self.require(id)?;
        hoa.contribution_rate_history = history.to_vec();
        hoa.monthly_contribution = current_rate;
        self.write(&hoa)
    }

    fn write(&self, hoa: &Hoa) -> Result<()> {
        self.conn.execute(
            "UPDATE hoas SET name = ?1, address = ?2, number_of_units = ?3, monthly_contribution = ?4, \
             country = ?5, opening_balance = ?6, is_demo = ?7, contribution_rate_history = ?8, \
             created_at = ?9, updated_at = ?10 WHERE id = ?11",
            params![
                hoa.name,
                hoa.address,
                hoa.number_of_units,
                hoa.monthly_contribution,
                hoa.country,
                hoa.opening_balance,
                hoa.is_demo,
                serde_json::to_string(&hoa.contribution_rate_history)?,
                hoa.created_at,
                Utc::now(),
                hoa.id,
            ],
        )?;
        Ok(())
    }

    pub fn delete(&self, id: i64) -> Result<()> {
        self.conn.execute("DELETE FROM hoas WHERE id = ?1", [id])?;
        Ok(())
    }

    pub(crate) fn clear(&self) -> Result<usize> {
        Ok(self.conn.execute("DELETE FROM hoas", [])?)
    }
}

/// Remove an HOA together with every contribution and expense it owns.
pub fn delete_hoa(store: &Store, hoa_id: i64) -> Result<()> {
    store.atomic(|conn| {
        ContributionRepository::new(conn).clear_by_owner(hoa_id)?;
        ExpenseRepository::new(conn).clear_by_owner(hoa_id)?;
        HoaRepository::new(conn).delete(hoa_id)
    })?;
    info!(hoa_id, "deleted hoa and its transactions");
    Ok(())
}
