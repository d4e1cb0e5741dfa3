use colored::Colorize;
use comfy_table::{Cell, Table};

use hoa_ledger::error::Result;
use hoa_ledger::fmt::money;
use hoa_ledger::hoas::{delete_hoa, validate_new_hoa};
use hoa_ledger::models::{HoaPatch, Month, NewHoa, RateChange};
use hoa_ledger::rates::{add_rate_change, delete_rate_change, get_current_rate, update_rate_change};
use hoa_ledger::settings::load_settings;

use super::open_store;

pub fn create(
    name: String,
    address: String,
    units: u32,
    rate: f64,
    opening_balance: f64,
    country: Option<String>,
) -> Result<()> {
    let new = NewHoa {
        name,
        address,
        number_of_units: units,
        monthly_contribution: rate,
        country: country.or_else(|| Some(load_settings().default_country)),
        opening_balance,
        ..Default::default()
    };
    validate_new_hoa(&new)?;
    let store = open_store()?;
    let id = store.hoas().add(new)?;
    let hoa = store.hoas().require(id)?;
    println!("Created HOA {}: {} ({} units at {})", id, hoa.name, hoa.number_of_units, money(rate));
    store.close()
}

pub fn list() -> Result<()> {
    let store = open_store()?;
    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Units", "Rate", "Opening", "Country", "Since"]);
    for hoa in store.hoas().get_all()? {
        let name = if hoa.is_demo {
            format!("{} {}", hoa.name, "[demo]".dimmed())
        } else {
            hoa.name.clone()
        };
        table.add_row(vec![
            Cell::new(hoa.id),
            Cell::new(name),
            Cell::new(hoa.number_of_units),
            Cell::new(money(get_current_rate(&hoa))),
            Cell::new(money(hoa.opening_balance)),
            Cell::new(&hoa.country),
            Cell::new(hoa.created_month()),
        ]);
    }
    println!("HOAs\n{table}");
    store.close()
}

pub fn show(id: i64) -> Result<()> {
    let store = open_store()?;
    let hoa = store.hoas().require(id)?;
    println!("{}", hoa.name.bold());
    if !hoa.address.is_empty() {
        println!("  Address:         {}", hoa.address);
    }
    println!("  Country:         {}", hoa.country);
    println!("  Units:           {}", hoa.number_of_units);
    println!("  Monthly rate:    {}", money(get_current_rate(&hoa)));
    println!("  Opening balance: {}", money(hoa.opening_balance));
    println!("  Created:         {}", hoa.created_at.format("%Y-%m-%d"));
    if let Some(updated) = hoa.updated_at {
        println!("  Updated:         {}", updated.format("%Y-%m-%d %H:%M"));
    }
    println!();
    print_rates(&hoa.contribution_rate_history);
    store.close()
}

pub fn update(
    id: i64,
    name: Option<String>,
    address: Option<String>,
    units: Option<u32>,
    opening_balance: Option<f64>,
    country: Option<String>,
) -> Result<()> {
    let store = open_store()?;
    store.hoas().update(
        id,
        HoaPatch {
            name,
            address,
            number_of_units: units,
            opening_balance,
            country,
            ..Default::default()
        },
    )?;
    println!("Updated HOA {id}");
    store.close()
}

pub fn delete(id: i64) -> Result<()> {
    let store = open_store()?;
    let hoa = store.hoas().require(id)?;
    delete_hoa(&store, id)?;
    println!("Deleted HOA {id} ({}) and its transactions", hoa.name);
    store.close()
}

fn print_rates(history: &[RateChange]) {
    let mut table = Table::new();
    table.set_header(vec!["From", "Amount", "Note"]);
    for change in history {
        table.add_row(vec![
            Cell::new(change.effective_date),
            Cell::new(money(change.amount)),
            Cell::new(&change.note),
        ]);
    }
    println!("Rate history\n{table}");
}

pub fn rates(hoa_id: i64) -> Result<()> {
    let store = open_store()?;
    let hoa = store.hoas().require(hoa_id)?;
    print_rates(&hoa.contribution_rate_history);
    println!("Current rate: {}", money(get_current_rate(&hoa)).bold());
    store.close()
}

pub fn add_rate(hoa_id: i64, from: Month, amount: f64, note: String) -> Result<()> {
    let store = open_store()?;
    add_rate_change(&store, hoa_id, RateChange { effective_date: from, amount, note })?;
    println!("Rate {} effective from {from}", money(amount));
    store.close()
}

pub fn amend_rate(hoa_id: i64, from: Month, amount: f64, note: Option<String>) -> Result<()> {
    let store = open_store()?;
    update_rate_change(&store, hoa_id, from, amount, note)?;
    println!("Rate from {from} is now {}", money(amount));
    store.close()
}

pub fn delete_rate(hoa_id: i64, from: Month) -> Result<()> {
    let store = open_store()?;
    delete_rate_change(&store, hoa_id, from)?;
    println!("Removed rate change from {from}");
    store.close()
}
