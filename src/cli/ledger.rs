use colored::Colorize;

use hoa_ledger::assessments::{add_bulk_special_assessment, SpecialAssessment};
use hoa_ledger::contributions::delete_many;
use hoa_ledger::error::{HoaError, Result};
use hoa_ledger::fmt::money;
use hoa_ledger::models::{
    ContributionPatch, ExpensePatch, Month, NewContribution, NewExpense, PaymentStatus, ReceiptStatus,
};
use hoa_ledger::receipts::{
    advance_receipt, bulk_set_payment_status, bulk_update_receipt_workflow_status, BulkOutcome,
};
use hoa_ledger::transactions::clear_all_transactions;

use super::{open_store, status_from_flag};

fn report_outcome(verb: &str, outcome: &BulkOutcome) {
    println!("{verb} {} contribution(s)", outcome.updated.len());
    if !outcome.skipped.is_empty() {
        let ids: Vec<String> = outcome.skipped.iter().map(|id| id.to_string()).collect();
        println!("{} {}", "Skipped unknown IDs:".yellow(), ids.join(", "));
    }
}

pub fn add_contribution(
    hoa_id: i64,
    unit: u32,
    start: Month,
    end: Option<Month>,
    amount: Option<f64>,
    paid: bool,
    notes: Option<String>,
) -> Result<()> {
    let store = open_store()?;
    let hoa = store.hoas().require(hoa_id)?;
    if unit == 0 || unit > hoa.number_of_units {
        return Err(HoaError::Validation(format!(
            "unit {unit} is outside 1..={} for {}",
            hoa.number_of_units, hoa.name
        )));
    }
    let base = NewContribution::regular(&hoa, unit, start, end);
    let new = NewContribution {
        amount: amount.unwrap_or(base.amount),
        payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Pending },
        notes,
        ..base
    };
    let amount = new.amount;
    let id = store.contributions().add(new)?;
    let span = match end {
        Some(end) if end != start => format!("{start} to {end}"),
        _ => start.to_string(),
    };
    println!("Recorded contribution {id}: unit {unit}, {span}, {}", money(amount));
    store.close()
}

pub fn pay_contributions(ids: &[i64], pending: bool) -> Result<()> {
    let store = open_store()?;
    let status = status_from_flag(pending);
    let outcome = bulk_set_payment_status(&store, ids, status)?;
    report_outcome(&format!("Marked {status}:"), &outcome);
    store.close()
}

pub fn set_receipt(id: i64, status: ReceiptStatus) -> Result<()> {
    let store = open_store()?;
    store
        .contributions()
        .update(id, ContributionPatch { receipt_status: Some(status), ..Default::default() })?;
    println!("Contribution {id} receipt: {}", super::receipt_label(status));
    store.close()
}

pub fn set_receipts(ids: &[i64], status: ReceiptStatus) -> Result<()> {
    let store = open_store()?;
    let outcome = bulk_update_receipt_workflow_status(&store, ids, status)?;
    report_outcome(&format!("Receipt set to {status}:"), &outcome);
    store.close()
}

pub fn advance(id: i64) -> Result<()> {
    let store = open_store()?;
    let next = advance_receipt(&store, id)?;
    println!("Contribution {id} receipt: {}", super::receipt_label(next));
    store.close()
}

pub fn delete_contributions(ids: &[i64]) -> Result<()> {
    let store = open_store()?;
    let deleted = delete_many(&store, ids)?;
    println!("Deleted {deleted} contribution(s)");
    store.close()
}

pub fn add_expense(
    hoa_id: i64,
    expense_type: String,
    amount: f64,
    description: Option<String>,
    paid: bool,
) -> Result<()> {
    let store = open_store()?;
    store.hoas().require(hoa_id)?;
    let id = store.expenses().add(NewExpense {
        hoa_id,
        expense_type,
        description,
        amount,
        payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Pending },
    })?;
    println!("Recorded expense {id}: {}", money(amount));
    store.close()
}

pub fn pay_expense(id: i64, pending: bool) -> Result<()> {
    let store = open_store()?;
    let status = status_from_flag(pending);
    store
        .expenses()
        .update(id, ExpensePatch { payment_status: Some(status), ..Default::default() })?;
    println!("Expense {id}: {}", super::payment_label(status));
    store.close()
}

pub fn delete_expense(id: i64) -> Result<()> {
    let store = open_store()?;
    store.expenses().delete(id)?;
    println!("Deleted expense {id}");
    store.close()
}

pub fn add_assessment(
    hoa_id: i64,
    purpose: String,
    amount: f64,
    due: Month,
    units: Vec<u32>,
    notes: Option<String>,
) -> Result<()> {
    let store = open_store()?;
    let unit_numbers = if units.is_empty() {
        (1..=store.hoas().require(hoa_id)?.number_of_units).collect()
    } else {
        units
    };
    let ids = add_bulk_special_assessment(
        &store,
        SpecialAssessment {
            hoa_id,
            unit_numbers,
            purpose: purpose.clone(),
            amount_per_unit: amount,
            due_date: due,
            notes,
        },
    )?;
    println!(
        "Levied '{purpose}' on {} unit(s): {} each, due {due}",
        ids.len(),
        money(amount)
    );
    store.close()
}

pub fn clear(hoa_id: i64, yes: bool) -> Result<()> {
    if !yes {
        return Err(HoaError::Validation(
            "clear deletes every transaction of the HOA; pass --yes to confirm".to_string(),
        ));
    }
    let store = open_store()?;
    let hoa = store.hoas().require(hoa_id)?;
    let removed = clear_all_transactions(&store, hoa_id)?;
    println!("Removed {removed} transaction(s) from {}", hoa.name);
    store.close()
}
