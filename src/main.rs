mod cli;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{
    AssessmentCommands, Cli, Commands, ContributionCommands, DemoCommands, ExpenseCommands,
    HoaCommands, RateCommands, ReceiptCommands,
};

fn init_logging() {
    let filter = EnvFilter::try_from_env("HOA_LEDGER_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir, country } => cli::init::run(data_dir, country),
        Commands::Status => cli::status::run(),
        Commands::Hoa { command } => match command {
            HoaCommands::Create {
                name,
                address,
                units,
                rate,
                opening_balance,
                country,
            } => cli::hoa::create(name, address, units, rate, opening_balance, country),
            HoaCommands::List => cli::hoa::list(),
            HoaCommands::Show { id } => cli::hoa::show(id),
            HoaCommands::Update {
                id,
                name,
                address,
                units,
                opening_balance,
                country,
            } => cli::hoa::update(id, name, address, units, opening_balance, country),
            HoaCommands::Delete { id } => cli::hoa::delete(id),
        },
        Commands::Contribution { command } => match command {
            ContributionCommands::Add {
                hoa,
                unit,
                start,
                end,
                amount,
                paid,
                notes,
            } => cli::ledger::add_contribution(hoa, unit, start, end, amount, paid, notes),
            ContributionCommands::Pay { ids, pending } => cli::ledger::pay_contributions(&ids, pending),
            ContributionCommands::Receipt { id, status } => cli::ledger::set_receipt(id, status),
            ContributionCommands::Advance { id } => cli::ledger::advance(id),
            ContributionCommands::Delete { ids } => cli::ledger::delete_contributions(&ids),
        },
        Commands::Expense { command } => match command {
            ExpenseCommands::Add {
                hoa,
                expense_type,
                amount,
                description,
                paid,
            } => cli::ledger::add_expense(hoa, expense_type, amount, description, paid),
            ExpenseCommands::Pay { id, pending } => cli::ledger::pay_expense(id, pending),
            ExpenseCommands::Delete { id } => cli::ledger::delete_expense(id),
        },
        Commands::Assessment { command } => match command {
            AssessmentCommands::Add {
                hoa,
                purpose,
                amount,
                due,
                units,
                notes,
            } => cli::ledger::add_assessment(hoa, purpose, amount, due, units, notes),
            AssessmentCommands::List { hoa } => cli::report::assessments(hoa),
        },
        Commands::Receipts { command } => match command {
            ReceiptCommands::Board { hoa } => cli::report::board(hoa),
            ReceiptCommands::Set { status, ids } => cli::ledger::set_receipts(&ids, status),
        },
        Commands::Rate { command } => match command {
            RateCommands::List { hoa } => cli::hoa::rates(hoa),
            RateCommands::Add { hoa, from, amount, note } => cli::hoa::add_rate(hoa, from, amount, note),
            RateCommands::Amend { hoa, from, amount, note } => cli::hoa::amend_rate(hoa, from, amount, note),
            RateCommands::Delete { hoa, from } => cli::hoa::delete_rate(hoa, from),
        },
        Commands::Transactions { hoa } => cli::report::transactions(hoa),
        Commands::Summary { hoa, mode } => cli::report::summary(hoa, mode),
        Commands::Statement { hoa, unit } => cli::report::statement(hoa, unit),
        Commands::Clear { hoa, yes } => cli::ledger::clear(hoa, yes),
        Commands::Demo { command } => match command {
            DemoCommands::Load => cli::demo::load(),
            DemoCommands::Clear => cli::demo::clear(),
        },
        Commands::Reset { yes } => cli::init::reset(yes),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
