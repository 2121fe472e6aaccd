#[cfg(feature = "ai")]
mod advisor;
mod categorizer;
mod cli;
mod db;
mod error;
mod fmt;
mod importer;
mod logging;
mod models;
mod rules;
mod settings;

use clap::Parser;

use cli::{Cli, Commands, RulesCommands, TransactionsCommands};

fn main() {
    logging::init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { data_dir } => cli::init::run(data_dir),
        Commands::Categorize { file, json } => cli::categorize::run(file.as_deref(), json),
        Commands::Rules { command } => match command {
            RulesCommands::List => cli::rules::list(),
            RulesCommands::Add { category, patterns } => cli::rules::add(&category, &patterns),
            RulesCommands::Remove { category, patterns } => cli::rules::remove(&category, &patterns),
            RulesCommands::Reset => cli::rules::reset(),
        },
        Commands::Transactions { command } => match command {
            TransactionsCommands::Add {
                amount,
                description,
                category,
                kind,
                date,
            } => cli::transactions::add(
                amount,
                description.as_deref(),
                category.as_deref(),
                kind.as_deref(),
                date.as_deref(),
            ),
            TransactionsCommands::List { month, json } => cli::transactions::list(month.as_deref(), json),
            TransactionsCommands::Show { id } => cli::transactions::show(id),
            TransactionsCommands::Update {
                id,
                amount,
                description,
                category,
                kind,
                date,
            } => cli::transactions::update(
                id,
                amount,
                description.as_deref(),
                category.as_deref(),
                kind.as_deref(),
                date.as_deref(),
            ),
            TransactionsCommands::Delete { id } => cli::transactions::delete(id),
        },
        #[cfg(feature = "ai")]
        Commands::Advise { file, month, dry_run } => {
            cli::advise::run(file.as_deref(), month.as_deref(), dry_run)
        }
        Commands::Status => cli::status::run(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
