use std::path::PathBuf;

use hoa_ledger::error::{HoaError, Result};
use hoa_ledger::settings::{load_settings, save_settings, shellexpand_path};
use hoa_ledger::transactions::clear_all_data;
use hoa_ledger::Store;

use super::open_store;

pub fn run(data_dir: Option<String>, country: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(country) = country {
        settings.default_country = country;
    }
    std::fs::create_dir_all(PathBuf::from(&settings.data_dir))?;
    save_settings(&settings)?;

    let db_path = settings.db_path();
    let store = Store::open(&db_path)?;
    let version = store.schema_version()?;
    store.close()?;

    println!("Ledger ready at {}", db_path.display());
    println!("  Schema version: {version}");
    println!("  Default country: {}", settings.default_country);
    println!();
    println!("Next: hoa-ledger hoa create \"My Residence\" --units 12 --rate 300");
    Ok(())
}

pub fn reset(yes: bool) -> Result<()> {
    if !yes {
        return Err(HoaError::Validation(
            "reset deletes every HOA and transaction; pass --yes to confirm".to_string(),
        ));
    }
    let store = open_store()?;
    clear_all_data(&store)?;
    store.close()?;
    println!("All data deleted.");
    Ok(())
}
