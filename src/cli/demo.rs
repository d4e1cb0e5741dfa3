use hoa_ledger::demo::{clear_demo_data, load_demo_data};
use hoa_ledger::error::Result;
use hoa_ledger::fmt::money;
use hoa_ledger::reports::get_financial_summary;

use super::open_store;

pub fn load() -> Result<()> {
    let store = open_store()?;
    let hoa_id = load_demo_data(&store)?;
    let hoa = store.hoas().require(hoa_id)?;
    let summary = get_financial_summary(&store, hoa_id)?;

    println!("Demo data ready!");
    println!("  HOA:           {} (id {})", hoa.name, hoa.id);
    println!("  Units:         {}", hoa.number_of_units);
    println!("  Contributions: {}", summary.contributions.len());
    println!("  Expenses:      {}", summary.expenses.len());
    println!("  Net balance:   {}", money(summary.net_balance));
    println!();
    println!("Try these next:");
    println!("  hoa-ledger summary {hoa_id}");
    println!("  hoa-ledger receipts board {hoa_id}");
    println!("  hoa-ledger assessment list {hoa_id}");
    println!("  hoa-ledger rate list {hoa_id}");
    store.close()
}

pub fn clear() -> Result<()> {
    let store = open_store()?;
    let removed = clear_demo_data(&store)?;
    store.close()?;
    if removed == 0 {
        println!("No demo data to remove.");
    } else {
        println!("Removed {removed} demo HOA(s) and their transactions.");
    }
    Ok(())
}
