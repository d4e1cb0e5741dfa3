use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::assessments::{insert_assessment, SpecialAssessment};
use crate::contributions::{regular_amount, ContributionRepository};
use crate::db::Store;
use crate::error::Result;
use crate::expenses::ExpenseRepository;
use crate::hoas::{month_start, HoaRepository};
use crate::migrations::INITIAL_RATE_NOTE;
use crate::models::{
    ContributionPatch, Month, NewContribution, NewExpense, NewHoa, PaymentStatus, RateChange,
    ReceiptStatus,
};

pub const DEMO_NAME: &str = "Residence Al Yasmine (demo)";
pub const DEMO_UNITS: u32 = 12;
const DEMO_OPENING_BALANCE: f64 = 15_000.0;
const INITIAL_DEMO_RATE: f64 = 280.0;
const CURRENT_DEMO_RATE: f64 = 300.0;

/// Months of dues seeded, oldest first.
const DEMO_MONTHS: u32 = 3;

struct DemoExpense {
    months_ago: u32,
    day: i64,
    expense_type: &'static str,
    description: &'static str,
    amount: f64,
    paid: bool,
}

const EXPENSES: &[DemoExpense] = &[
    DemoExpense { months_ago: 2, day: 4, expense_type: "cleaning", description: "Stairwell cleaning", amount: 900.0, paid: true },
    DemoExpense { months_ago: 2, day: 10, expense_type: "electricity", description: "Common areas lighting", amount: 640.0, paid: true },
    DemoExpense { months_ago: 2, day: 18, expense_type: "security", description: "Night concierge", amount: 2_500.0, paid: true },
    DemoExpense { months_ago: 1, day: 5, expense_type: "water", description: "Garden irrigation", amount: 310.0, paid: true },
    DemoExpense { months_ago: 1, day: 12, expense_type: "elevator", description: "Quarterly elevator service", amount: 1_200.0, paid: true },
    DemoExpense { months_ago: 1, day: 21, expense_type: "gardening", description: "Hedge trimming", amount: 450.0, paid: false },
    DemoExpense { months_ago: 0, day: 3, expense_type: "insurance", description: "Building insurance installment", amount: 1_850.0, paid: false },
    DemoExpense { months_ago: 0, day: 8, expense_type: "repairs", description: "Entrance door lock", amount: 275.0, paid: false },
];

struct DemoAssessment {
    purpose: &'static str,
    amount_per_unit: f64,
    notes: &'static str,
    /// How many units (lowest numbers first) have already paid.
    paid_units: usize,
}

const ASSESSMENTS: &[DemoAssessment] = &[
    DemoAssessment { purpose: "Roof waterproofing", amount_per_unit: 1_500.0, notes: "Approved at the annual meeting", paid_units: 7 },
    DemoAssessment { purpose: "Facade painting", amount_per_unit: 800.0, notes: "Two installments allowed", paid_units: 3 },
];

/// Payment and receipt progress for a unit's dues `months_ago` months back.
/// Older months are further along the workflow.
fn demo_status(months_ago: u32, unit: u32) -> (PaymentStatus, ReceiptStatus) {
    use PaymentStatus::{Paid, Pending};
    use ReceiptStatus::{Delivered, NotPrinted, Printed, WithConcierge};
    match months_ago {
        0 if unit % 2 == 0 => (Paid, Printed),
        0 => (Pending, NotPrinted),
        1 if unit % 4 == 0 => (Pending, WithConcierge),
        1 if unit % 3 == 0 => (Paid, WithConcierge),
        1 => (Paid, Delivered),
        _ if unit == 7 => (Pending, WithConcierge),
        _ => (Paid, Delivered),
    }
}

fn months_back(today: Month, n: u32) -> Month {
    (0..n).fold(today, |m, _| m.pred())
}

fn day_in(month: Month, day: i64) -> DateTime<Utc> {
    month_start(month) + Duration::days(day - 1) + Duration::hours(10)
}

fn insert_demo_data(conn: &Connection, today: Month) -> Result<i64> {
    let first = months_back(today, DEMO_MONTHS - 1);
    let hoas = HoaRepository::new(conn);
    let hoa_id = hoas.add_at(
        NewHoa {
            name: DEMO_NAME.to_string(),
            address: "27 Boulevard Zerktouni, Casablanca".to_string(),
            number_of_units: DEMO_UNITS,
            monthly_contribution: CURRENT_DEMO_RATE,
            country: None,
            opening_balance: DEMO_OPENING_BALANCE,
            is_demo: true,
            contribution_rate_history: vec![
                RateChange {
                    effective_date: first,
                    amount: INITIAL_DEMO_RATE,
                    note: INITIAL_RATE_NOTE.to_string(),
                },
                RateChange {
                    effective_date: today,
                    amount: CURRENT_DEMO_RATE,
                    note: "Voted increase".to_string(),
                },
            ],
        },
        day_in(first, 1),
    )?;
    let hoa = hoas.require(hoa_id)?;

    let contributions = ContributionRepository::new(conn);
    for (i, month) in first.iter_through(today).enumerate() {
        let months_ago = DEMO_MONTHS - 1 - i as u32;
        for unit in 1..=DEMO_UNITS {
            let (payment_status, receipt_status) = demo_status(months_ago, unit);
            contributions.add_at(
                NewContribution {
                    payment_status,
                    receipt_status,
                    ..NewContribution::new(hoa_id, unit, month, regular_amount(&hoa, month, None))
                },
                day_in(month, i64::from(unit) + 2),
            )?;
        }
    }

    let expenses = ExpenseRepository::new(conn);
    for e in EXPENSES {
        expenses.add_at(
            NewExpense {
                hoa_id,
                expense_type: e.expense_type.to_string(),
                description: Some(e.description.to_string()),
                amount: e.amount,
                payment_status: if e.paid { PaymentStatus::Paid } else { PaymentStatus::Pending },
            },
            day_in(months_back(today, e.months_ago), e.day),
        )?;
    }

    for a in ASSESSMENTS {
        let ids = insert_assessment(
            conn,
            &SpecialAssessment {
                hoa_id,
                unit_numbers: (1..=DEMO_UNITS).collect(),
                purpose: a.purpose.to_string(),
                amount_per_unit: a.amount_per_unit,
                due_date: today.succ(),
                notes: Some(a.notes.to_string()),
            },
        )?;
        for &id in ids.iter().take(a.paid_units) {
            contributions.update(
                id,
                ContributionPatch { payment_status: Some(PaymentStatus::Paid), ..Default::default() },
            )?;
        }
    }

    Ok(hoa_id)
}

/// Seed a fully populated demo HOA and return its id. If a demo HOA already
/// exists its id is returned and nothing is written.
pub fn load_demo_data(store: &Store) -> Result<i64> {
    load_demo_data_at(store, Month::current())
}

pub fn load_demo_data_at(store: &Store, today: Month) -> Result<i64> {
    store.atomic(|conn| {
        if let Some(&existing) = HoaRepository::new(conn).all_demo_ids()?.first() {
            info!(hoa_id = existing, "demo data already loaded");
            return Ok(existing);
        }
        let hoa_id = insert_demo_data(conn, today)?;
        info!(hoa_id, "loaded demo data");
        Ok(hoa_id)
    })
}

/// Remove every demo HOA with its transactions. Returns how many HOAs went.
pub fn clear_demo_data(store: &Store) -> Result<usize> {
    let removed = store.atomic(|conn| {
        let ids = HoaRepository::new(conn).all_demo_ids()?;
        for &id in &ids {
            ContributionRepository::new(conn).clear_by_owner(id)?;
            ExpenseRepository::new(conn).clear_by_owner(id)?;
            HoaRepository::new(conn).delete(id)?;
        }
        Ok(ids.len())
    })?;
    info!(removed, "cleared demo data");
    Ok(removed)
}
