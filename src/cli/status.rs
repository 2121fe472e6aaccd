use crate::db::{count_transactions, open_ledger};
use crate::error::Result;
use crate::rules::RuleBook;
use crate::settings::{load_settings, settings_path, API_KEY_ENV};

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = settings.data_path();
    let db_path = settings.db_path();
    let rules_path = RuleBook::path_in(&data_dir);

    println!("Settings:   {}", settings_path().display());
    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Rules:      {}", rules_path.display());
    println!("AI model:   {} @ {}", settings.ai_model, settings.ai_endpoint);
    let key_state = if std::env::var(API_KEY_ENV).map(|k| !k.is_empty()).unwrap_or(false) {
        "set"
    } else {
        "not set"
    };
    println!("API key:    {API_KEY_ENV} {key_state}");

    println!();
    if db_path.exists() {
        let conn = open_ledger(&db_path)?;
        println!("Transactions:  {}", count_transactions(&conn)?);
    } else {
        println!("Database not found. Run `spendwise init` to set up.");
    }

    let book = RuleBook::load(&rules_path)?;
    let categorizer = book.categorizer();
    println!("Categories:    {}", categorizer.categories().len());
    println!("Custom edits:  {}", book.edits.len());
    Ok(())
}
