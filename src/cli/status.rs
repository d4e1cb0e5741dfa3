use hoa_ledger::error::Result;
use hoa_ledger::migrations::SCHEMA_VERSION;
use hoa_ledger::settings::load_settings;
use hoa_ledger::Store;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_dir);
    println!("Database:   {}", db_path.display());
    println!("Country:    {}", settings.default_country);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `hoa-ledger init` to set up.");
        return Ok(());
    }

    let store = Store::open(&db_path)?;
    println!("Schema:     v{} (supported v{SCHEMA_VERSION})", store.schema_version()?);

    let hoas = store.hoas().get_all()?;
    let mut contributions = 0usize;
    let mut expenses = 0usize;
    for hoa in &hoas {
        contributions += store.contributions().get_all_by_owner(hoa.id)?.len();
        expenses += store.expenses().get_all_by_owner(hoa.id)?.len();
    }
    let demo = hoas.iter().filter(|h| h.is_demo).count();

    println!();
    println!("HOAs:          {} ({demo} demo)", hoas.len());
    println!("Contributions: {contributions}");
    println!("Expenses:      {expenses}");
    store.close()
}
