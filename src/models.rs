use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::HoaError;

// ---------------------------------------------------------------------------
// Month
// ---------------------------------------------------------------------------

/// A calendar month, written `YYYY-MM` everywhere it is stored or displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self, HoaError> {
        if !(1..=12).contains(&month) || !(0..=9999).contains(&year) {
            return Err(HoaError::InvalidMonth(format!("{year:04}-{month:02}")));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: &impl Datelike) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The current month in UTC, the same clock every stored timestamp uses.
    pub fn current() -> Self {
        Self::from_date(&Utc::now())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn succ(self) -> Self {
        if self.month == 12 {
            Self { year: self.year + 1, month: 1 }
        } else {
            Self { year: self.year, month: self.month + 1 }
        }
    }

    pub fn pred(self) -> Self {
        if self.month == 1 {
            Self { year: self.year - 1, month: 12 }
        } else {
            Self { year: self.year, month: self.month - 1 }
        }
    }

    /// Signed number of months from `self` to `other` (`2025-01` to `2025-03` is 2).
    pub fn months_until(self, other: Month) -> i32 {
        (other.year - self.year) * 12 + other.month as i32 - self.month as i32
    }

    /// Every month from `self` through `end`, inclusive. Empty when `end < self`.
    pub fn iter_through(self, end: Month) -> impl Iterator<Item = Month> {
        let mut next = Some(self);
        std::iter::from_fn(move || {
            let current = next?;
            if current > end {
                return None;
            }
            next = Some(current.succ());
            Some(current)
        })
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Month {
    type Err = HoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || HoaError::InvalidMonth(s.to_string());
        let (y, m) = s.split_once('-').ok_or_else(invalid)?;
        if y.len() != 4 || m.len() != 2 {
            return Err(invalid());
        }
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        Month::new(year, month).map_err(|_| invalid())
    }
}

impl Serialize for Month {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Month {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.to_string()))
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: HoaError| FromSqlError::Other(Box::new(e)))
    }
}

// ---------------------------------------------------------------------------
// Status enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    #[default]
    Pending,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "paid",
            PaymentStatus::Pending => "pending",
        }
    }

    /// Anything other than `paid` counts as pending.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("paid") => PaymentStatus::Paid,
            _ => PaymentStatus::Pending,
        }
    }

}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = HoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "pending" => Ok(PaymentStatus::Pending),
            other => Err(HoaError::Validation(format!("unknown payment status '{other}'"))),
        }
    }
}

/// Physical receipt handling, independent of payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    #[default]
    NotPrinted,
    Printed,
    WithConcierge,
    Delivered,
}

impl ReceiptStatus {
    pub const ALL: [ReceiptStatus; 4] = [
        ReceiptStatus::NotPrinted,
        ReceiptStatus::Printed,
        ReceiptStatus::WithConcierge,
        ReceiptStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::NotPrinted => "not_printed",
            ReceiptStatus::Printed => "printed",
            ReceiptStatus::WithConcierge => "with_concierge",
            ReceiptStatus::Delivered => "delivered",
        }
    }

    pub fn parse_stored(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }

    /// The next stage of the normal flow, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            ReceiptStatus::NotPrinted => Some(ReceiptStatus::Printed),
            ReceiptStatus::Printed => Some(ReceiptStatus::WithConcierge),
            ReceiptStatus::WithConcierge => Some(ReceiptStatus::Delivered),
            ReceiptStatus::Delivered => None,
        }
    }

    pub fn is_delivered(self) -> bool {
        self == ReceiptStatus::Delivered
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReceiptStatus {
    type Err = HoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_stored(s)
            .ok_or_else(|| HoaError::Validation(format!("unknown receipt status '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionType {
    #[default]
    Regular,
    Special,
    /// Legacy opening-balance rows. The opening balance now lives on the HOA.
    Opening,
}

impl ContributionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContributionType::Regular => "regular",
            ContributionType::Special => "special",
            ContributionType::Opening => "opening",
        }
    }

    /// Unset or unknown types are treated as regular dues.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            Some("special") => ContributionType::Special,
            Some("opening") => ContributionType::Opening,
            _ => ContributionType::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Contribution,
    Expense,
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateChange {
    pub effective_date: Month,
    pub amount: f64,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Hoa {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub number_of_units: u32,
    pub monthly_contribution: f64,
    pub country: String,
    pub opening_balance: f64,
    pub is_demo: bool,
    pub contribution_rate_history: Vec<RateChange>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Hoa {
    pub fn created_month(&self) -> Month {
        Month::from_date(&self.created_at)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: i64,
    pub hoa_id: i64,
    pub unit_number: u32,
    pub start_month: Month,
    pub end_month: Option<Month>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub receipt_delivered: bool,
    pub receipt_status: ReceiptStatus,
    pub contribution_type: ContributionType,
    pub purpose: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Contribution {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }

    pub fn is_special(&self) -> bool {
        self.contribution_type == ContributionType::Special
    }

    pub fn last_month(&self) -> Month {
        self.end_month.unwrap_or(self.start_month)
    }

    /// Number of months in `[start_month, end_month]`, at least one.
    pub fn months_spanned(&self) -> u32 {
        (self.start_month.months_until(self.last_month()) + 1).max(1) as u32
    }

    pub fn covers(&self, month: Month) -> bool {
        self.start_month <= month && month <= self.last_month()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    pub id: i64,
    pub hoa_id: i64,
    #[serde(rename = "type")]
    pub expense_type: String,
    pub description: Option<String>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Expense {
    pub fn is_paid(&self) -> bool {
        self.payment_status == PaymentStatus::Paid
    }
}

/// A contribution or an expense in the unified feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "transactionType", rename_all = "snake_case")]
pub enum Transaction {
    Contribution(Contribution),
    Expense(Expense),
}

impl Transaction {
    pub fn transaction_type(&self) -> TransactionType {
        match self {
            Transaction::Contribution(_) => TransactionType::Contribution,
            Transaction::Expense(_) => TransactionType::Expense,
        }
    }

    pub fn id(&self) -> i64 {
        match self {
            Transaction::Contribution(c) => c.id,
            Transaction::Expense(e) => e.id,
        }
    }

    pub fn amount(&self) -> f64 {
        match self {
            Transaction::Contribution(c) => c.amount,
            Transaction::Expense(e) => e.amount,
        }
    }

    pub fn payment_status(&self) -> PaymentStatus {
        match self {
            Transaction::Contribution(c) => c.payment_status,
            Transaction::Expense(e) => e.payment_status,
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            Transaction::Contribution(c) => c.created_at,
            Transaction::Expense(e) => e.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Inputs and partial updates
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct NewHoa {
    pub name: String,
    pub address: String,
    pub number_of_units: u32,
    pub monthly_contribution: f64,
    /// Defaults to `"MA"` when unset.
    pub country: Option<String>,
    pub opening_balance: f64,
    pub is_demo: bool,
    /// Seeded with a single "Initial rate" entry when empty.
    pub contribution_rate_history: Vec<RateChange>,
}

/// Partial HOA update. The monthly rate is not patchable here; it follows
/// the rate history and changes through `rates`.
#[derive(Debug, Clone, Default)]
pub struct HoaPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub number_of_units: Option<u32>,
    pub country: Option<String>,
    pub opening_balance: Option<f64>,
    pub is_demo: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct NewContribution {
    pub hoa_id: i64,
    pub unit_number: u32,
    pub start_month: Month,
    pub end_month: Option<Month>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
    pub receipt_status: ReceiptStatus,
    pub contribution_type: ContributionType,
    pub purpose: Option<String>,
    pub notes: Option<String>,
}

impl NewContribution {
    pub fn new(hoa_id: i64, unit_number: u32, start_month: Month, amount: f64) -> Self {
        Self {
            hoa_id,
            unit_number,
            start_month,
            end_month: None,
            amount,
            payment_status: PaymentStatus::Pending,
            receipt_status: ReceiptStatus::NotPrinted,
            contribution_type: ContributionType::Regular,
            purpose: None,
            notes: None,
        }
    }
}

/// `None` leaves a field unchanged; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct ContributionPatch {
    pub unit_number: Option<u32>,
    pub start_month: Option<Month>,
    pub end_month: Option<Option<Month>>,
    pub amount: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
    pub receipt_status: Option<ReceiptStatus>,
    pub receipt_delivered: Option<bool>,
    pub contribution_type: Option<ContributionType>,
    pub purpose: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct NewExpense {
    pub hoa_id: i64,
    pub expense_type: String,
    pub description: Option<String>,
    pub amount: f64,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub expense_type: Option<String>,
    pub description: Option<Option<String>>,
    pub amount: Option<f64>,
    pub payment_status: Option<PaymentStatus>,
}
