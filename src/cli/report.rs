use colored::Colorize;
use comfy_table::{Cell, Table};

use hoa_ledger::error::Result;
use hoa_ledger::fmt::{money, percent};
use hoa_ledger::models::{Contribution, Transaction};
use hoa_ledger::receipts::{workflow_board, WorkflowBucket};
use hoa_ledger::reports::{
    collection_rate, get_financial_summary, monthly_breakdown, special_assessments_by_purpose,
    unit_statement, CollectionMode,
};
use hoa_ledger::transactions::get_all_transactions;

use super::{open_store, payment_label, receipt_label};

fn signed(val: f64) -> String {
    if val >= 0.0 {
        money(val).green().to_string()
    } else {
        money(val).red().to_string()
    }
}

fn contribution_label(c: &Contribution) -> String {
    let period = match c.end_month {
        Some(end) if end != c.start_month => format!("{} to {end}", c.start_month),
        _ => c.start_month.to_string(),
    };
    match c.purpose.as_deref() {
        Some(purpose) if c.is_special() => format!("Unit {}: {purpose} ({period})", c.unit_number),
        _ => format!("Unit {}: dues {period}", c.unit_number),
    }
}

pub fn transactions(hoa_id: i64) -> Result<()> {
    let store = open_store()?;
    let feed = get_all_transactions(&store, hoa_id)?;
    if feed.is_empty() {
        println!("No transactions found.");
        return store.close();
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Recorded", "Kind", "Detail", "Amount", "Status", "Receipt"]);
    for t in &feed {
        let (kind, detail, receipt) = match t {
            Transaction::Contribution(c) => (
                if c.is_special() { "special" } else { "dues" },
                contribution_label(c),
                receipt_label(c.receipt_status).to_string(),
            ),
            Transaction::Expense(e) => (
                "expense",
                match &e.description {
                    Some(d) => format!("{}: {d}", e.expense_type),
                    None => e.expense_type.clone(),
                },
                String::new(),
            ),
        };
        let amount = match t {
            Transaction::Contribution(c) => money(c.amount).green().to_string(),
            Transaction::Expense(e) => money(e.amount).red().to_string(),
        };
        table.add_row(vec![
            Cell::new(t.id()),
            Cell::new(t.created_at().format("%Y-%m-%d")),
            Cell::new(kind),
            Cell::new(detail),
            Cell::new(amount),
            Cell::new(payment_label(t.payment_status())),
            Cell::new(receipt),
        ]);
    }
    println!("Transactions\n{table}");
    store.close()
}

pub fn summary(hoa_id: i64, mode: Option<CollectionMode>) -> Result<()> {
    let store = open_store()?;
    let hoa = store.hoas().require(hoa_id)?;
    let s = get_financial_summary(&store, hoa_id)?;

    let mut table = Table::new();
    table.set_header(vec!["", "Paid", "Pending", "Total"]);
    table.add_row(vec![
        Cell::new("Opening balance"),
        Cell::new(money(s.opening_balance)),
        Cell::new(""),
        Cell::new(money(s.opening_balance)),
    ]);
    table.add_row(vec![
        Cell::new("CONTRIBUTIONS".green().bold()),
        Cell::new(money(s.paid_contributions)),
        Cell::new(money(s.pending_contributions)),
        Cell::new(money(s.regular_total + s.special_total)),
    ]);
    table.add_row(vec![
        Cell::new("  Regular dues"),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(s.regular_total)),
    ]);
    table.add_row(vec![
        Cell::new("  Special assessments"),
        Cell::new(""),
        Cell::new(""),
        Cell::new(money(s.special_total)),
    ]);
    table.add_row(vec![
        Cell::new("EXPENSES".red().bold()),
        Cell::new(money(s.paid_expenses)),
        Cell::new(money(s.pending_expenses)),
        Cell::new(money(s.total_expenses)),
    ]);
    table.add_row(vec![Cell::new(""), Cell::new(""), Cell::new(""), Cell::new("")]);
    table.add_row(vec![
        Cell::new("Net balance".bold()),
        Cell::new(signed(s.net_balance)),
        Cell::new(""),
        Cell::new(""),
    ]);
    table.add_row(vec![
        Cell::new("Projected balance".bold()),
        Cell::new(""),
        Cell::new(""),
        Cell::new(signed(s.projected_balance)),
    ]);
    println!("{}\n{table}", hoa.name.bold());

    let modes = match mode {
        Some(mode) => vec![mode],
        None => vec![CollectionMode::Monthly, CollectionMode::Yearly, CollectionMode::Overall],
    };
    let mut rates = Table::new();
    rates.set_header(vec!["Window", "Expected", "Collected", "Rate"]);
    for mode in modes {
        let r = collection_rate(&hoa, &s, mode);
        rates.add_row(vec![
            Cell::new(r.mode),
            Cell::new(money(r.expected)),
            Cell::new(money(r.actual)),
            Cell::new(percent(r.rate)),
        ]);
    }
    println!("\nCollection rate\n{rates}");

    let feed: Vec<Transaction> = s
        .contributions
        .iter()
        .cloned()
        .map(Transaction::Contribution)
        .chain(s.expenses.iter().cloned().map(Transaction::Expense))
        .collect();
    let months = monthly_breakdown(&feed);
    if !months.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Month", "Contributions", "Expenses", "Net"]);
        for m in &months {
            table.add_row(vec![
                Cell::new(m.month),
                Cell::new(format!("{} ({})", money(m.contributions_total), m.contribution_count)),
                Cell::new(format!("{} ({})", money(m.expenses_total), m.expense_count)),
                Cell::new(signed(m.net())),
            ]);
        }
        println!("\nBy month recorded\n{table}");
    }
    store.close()
}

pub fn assessments(hoa_id: i64) -> Result<()> {
    let store = open_store()?;
    let groups = special_assessments_by_purpose(&store, hoa_id)?;
    if groups.is_empty() {
        println!("No special assessments.");
        return store.close();
    }
    let mut table = Table::new();
    table.set_header(vec!["Purpose", "Total", "Paid", "Pending", "Units paid"]);
    for g in &groups {
        table.add_row(vec![
            Cell::new(&g.purpose),
            Cell::new(money(g.total_amount)),
            Cell::new(money(g.paid_amount)),
            Cell::new(money(g.pending_amount)),
            Cell::new(format!("{}/{}", g.paid_count, g.total_count)),
        ]);
    }
    println!("Special assessments\n{table}");
    store.close()
}

pub fn board(hoa_id: i64) -> Result<()> {
    let store = open_store()?;
    let board = workflow_board(&store, hoa_id)?;
    for bucket in WorkflowBucket::ALL {
        let items = board.bucket(bucket);
        println!("{} ({})", bucket.label().bold(), items.len());
        if items.is_empty() {
            continue;
        }
        let mut table = Table::new();
        table.set_header(vec!["ID", "Detail", "Amount", "Status", "Receipt"]);
        for c in items {
            table.add_row(vec![
                Cell::new(c.id),
                Cell::new(contribution_label(c)),
                Cell::new(money(c.amount)),
                Cell::new(payment_label(c.payment_status)),
                Cell::new(receipt_label(c.receipt_status)),
            ]);
        }
        println!("{table}\n");
    }
    store.close()
}

pub fn statement(hoa_id: i64, unit: u32) -> Result<()> {
    let store = open_store()?;
    let st = unit_statement(&store, hoa_id, unit)?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Detail", "Amount", "Status", "Receipt"]);
    for c in &st.contributions {
        table.add_row(vec![
            Cell::new(c.id),
            Cell::new(contribution_label(c)),
            Cell::new(money(c.amount)),
            Cell::new(payment_label(c.payment_status)),
            Cell::new(receipt_label(c.receipt_status)),
        ]);
    }
    println!("Unit {unit}\n{table}");
    println!("Paid:    {} ({} month(s) of dues)", money(st.paid_total), st.paid_months);
    println!("Pending: {}", money(st.pending_total).yellow());
    store.close()
}
