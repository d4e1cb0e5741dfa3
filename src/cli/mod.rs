pub mod demo;
pub mod hoa;
pub mod init;
pub mod ledger;
pub mod report;
pub mod status;

use clap::{Parser, Subcommand};
use colored::{ColoredString, Colorize};

use hoa_ledger::error::{HoaError, Result};
use hoa_ledger::models::{Month, PaymentStatus, ReceiptStatus};
use hoa_ledger::reports::CollectionMode;
use hoa_ledger::settings::load_settings;
use hoa_ledger::Store;

/// Open the configured ledger. Does not create one; that is `init`'s job.
pub(crate) fn open_store() -> Result<Store> {
    let path = load_settings().db_path();
    if !path.exists() {
        return Err(HoaError::StorageUnavailable(format!(
            "no database at {} (run `hoa-ledger init` first)",
            path.display()
        )));
    }
    Store::open(&path)
}

pub(crate) fn payment_label(status: PaymentStatus) -> ColoredString {
    match status {
        PaymentStatus::Paid => "paid".green(),
        PaymentStatus::Pending => "pending".yellow(),
    }
}

pub(crate) fn receipt_label(status: ReceiptStatus) -> ColoredString {
    match status {
        ReceiptStatus::NotPrinted => "not printed".dimmed(),
        ReceiptStatus::Printed => "printed".normal(),
        ReceiptStatus::WithConcierge => "with concierge".cyan(),
        ReceiptStatus::Delivered => "delivered".green(),
    }
}

pub(crate) fn status_from_flag(pending: bool) -> PaymentStatus {
    if pending {
        PaymentStatus::Pending
    } else {
        PaymentStatus::Paid
    }
}

#[derive(Parser)]
#[command(name = "hoa-ledger", version, about = "Dues, assessments and expenses for homeowners associations.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and create the database.
    Init {
        /// Path for ledger data (default: ~/Documents/hoa-ledger)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Country code for new HOAs (default: MA)
        #[arg(long)]
        country: Option<String>,
    },
    /// Show the database location, schema version and record counts.
    Status,
    /// Manage HOAs.
    Hoa {
        #[command(subcommand)]
        command: HoaCommands,
    },
    /// Record and update unit contributions.
    Contribution {
        #[command(subcommand)]
        command: ContributionCommands,
    },
    /// Record and update expenses.
    Expense {
        #[command(subcommand)]
        command: ExpenseCommands,
    },
    /// Special assessments levied across units.
    Assessment {
        #[command(subcommand)]
        command: AssessmentCommands,
    },
    /// Receipt workflow.
    Receipts {
        #[command(subcommand)]
        command: ReceiptCommands,
    },
    /// Monthly contribution rate history.
    Rate {
        #[command(subcommand)]
        command: RateCommands,
    },
    /// List every contribution and expense of an HOA, newest first.
    Transactions {
        /// HOA ID
        hoa: i64,
    },
    /// Balances, collection rates and monthly totals.
    Summary {
        /// HOA ID
        hoa: i64,
        /// Collection rate window: monthly, yearly, overall (default: all three)
        #[arg(long)]
        mode: Option<CollectionMode>,
    },
    /// Contributions and balance for one unit.
    Statement {
        /// HOA ID
        hoa: i64,
        /// Unit number
        unit: u32,
    },
    /// Delete every contribution and expense of an HOA, keeping the HOA.
    Clear {
        /// HOA ID
        hoa: i64,
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
    /// Sample data to explore the ledger.
    Demo {
        #[command(subcommand)]
        command: DemoCommands,
    },
    /// Delete every HOA, contribution and expense.
    Reset {
        /// Skip the confirmation check
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
pub enum HoaCommands {
    /// Create an HOA.
    Create {
        /// HOA name
        name: String,
        /// Street address
        #[arg(long, default_value = "")]
        address: String,
        /// Number of units
        #[arg(long)]
        units: u32,
        /// Monthly contribution per unit
        #[arg(long)]
        rate: f64,
        /// Cash on hand before the first recorded transaction
        #[arg(long = "opening-balance", default_value = "0")]
        opening_balance: f64,
        /// Country code (default from settings)
        #[arg(long)]
        country: Option<String>,
    },
    /// List all HOAs.
    List,
    /// Show one HOA with its rate history.
    Show {
        /// HOA ID
        id: i64,
    },
    /// Update HOA details. Use `rate add` to change the monthly rate.
    Update {
        /// HOA ID
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        units: Option<u32>,
        #[arg(long = "opening-balance")]
        opening_balance: Option<f64>,
        #[arg(long)]
        country: Option<String>,
    },
    /// Delete an HOA and all of its transactions.
    Delete {
        /// HOA ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum ContributionCommands {
    /// Record dues for a unit.
    Add {
        /// HOA ID
        hoa: i64,
        /// Unit number
        #[arg(long)]
        unit: u32,
        /// First month covered: YYYY-MM
        #[arg(long)]
        start: Month,
        /// Last month covered: YYYY-MM (default: same as start)
        #[arg(long)]
        end: Option<Month>,
        /// Amount (default: the rate in effect for each month covered)
        #[arg(long)]
        amount: Option<f64>,
        /// Record as already paid
        #[arg(long)]
        paid: bool,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Mark contributions paid (or pending with --pending).
    Pay {
        /// Contribution IDs
        #[arg(required = true)]
        ids: Vec<i64>,
        #[arg(long)]
        pending: bool,
    },
    /// Set the receipt status of one contribution.
    Receipt {
        /// Contribution ID
        id: i64,
        /// not_printed, printed, with_concierge, delivered
        #[arg(long)]
        status: ReceiptStatus,
    },
    /// Move a receipt to its next stage.
    Advance {
        /// Contribution ID
        id: i64,
    },
    /// Delete contributions.
    Delete {
        /// Contribution IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Record an expense.
    Add {
        /// HOA ID
        hoa: i64,
        /// Expense type, e.g. maintenance, cleaning, water
        #[arg(long = "type")]
        expense_type: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        description: Option<String>,
        /// Record as already paid
        #[arg(long)]
        paid: bool,
    },
    /// Mark an expense paid (or pending with --pending).
    Pay {
        /// Expense ID
        id: i64,
        #[arg(long)]
        pending: bool,
    },
    /// Delete an expense.
    Delete {
        /// Expense ID
        id: i64,
    },
}

#[derive(Subcommand)]
pub enum AssessmentCommands {
    /// Levy a special assessment on several units.
    Add {
        /// HOA ID
        hoa: i64,
        /// What the assessment pays for
        #[arg(long)]
        purpose: String,
        /// Amount charged to each unit
        #[arg(long)]
        amount: f64,
        /// Due month: YYYY-MM
        #[arg(long)]
        due: Month,
        /// Comma-separated unit numbers (default: every unit)
        #[arg(long, value_delimiter = ',')]
        units: Vec<u32>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Totals per assessment purpose.
    List {
        /// HOA ID
        hoa: i64,
    },
}

#[derive(Subcommand)]
pub enum ReceiptCommands {
    /// Contributions grouped by receipt workflow stage.
    Board {
        /// HOA ID
        hoa: i64,
    },
    /// Set the receipt status of several contributions at once.
    Set {
        /// not_printed, printed, with_concierge, delivered
        #[arg(long)]
        status: ReceiptStatus,
        /// Contribution IDs
        #[arg(required = true)]
        ids: Vec<i64>,
    },
}

#[derive(Subcommand)]
pub enum RateCommands {
    /// Show the rate history.
    List {
        /// HOA ID
        hoa: i64,
    },
    /// Add a rate taking effect from a month.
    Add {
        /// HOA ID
        hoa: i64,
        /// Effective month: YYYY-MM
        #[arg(long)]
        from: Month,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "")]
        note: String,
    },
    /// Correct the amount or note of an existing rate.
    Amend {
        /// HOA ID
        hoa: i64,
        /// Effective month: YYYY-MM
        #[arg(long)]
        from: Month,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Delete a rate change (the initial rate cannot be deleted).
    Delete {
        /// HOA ID
        hoa: i64,
        /// Effective month: YYYY-MM
        #[arg(long)]
        from: Month,
    },
}

#[derive(Subcommand)]
pub enum DemoCommands {
    /// Create a populated demo HOA.
    Load,
    /// Remove every demo HOA.
    Clear,
}
