//! Local-first ledger for homeowners associations: dues, special
//! assessments, expenses, rate history and receipt tracking, kept in one
//! SQLite file.

pub mod assessments;
pub mod contributions;
pub mod db;
pub mod demo;
pub mod error;
pub mod expenses;
pub mod fmt;
pub mod hoas;
pub mod migrations;
pub mod models;
pub mod rates;
pub mod receipts;
pub mod reports;
pub mod settings;
pub mod transactions;

pub use db::Store;
pub use error::{HoaError, Result};
pub use models::{
    Contribution, ContributionPatch, ContributionType, Expense, ExpensePatch, Hoa, HoaPatch, Month,
    NewContribution, NewExpense, NewHoa, PaymentStatus, RateChange, ReceiptStatus, Transaction,
    TransactionType,
};
