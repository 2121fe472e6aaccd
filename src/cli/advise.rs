use std::path::Path;

use crate::advisor::{build_prompt, Advisor, AdvisorConfig, SpendingItem};
use crate::cli::parse_month_opt;
use crate::db::{list_transactions, open_ledger};
use crate::error::{Result, SpendwiseError};
use crate::importer::read_records;
use crate::rules::load_categorizer;
use crate::settings::{load_settings, API_KEY_ENV};

pub fn run(file: Option<&str>, month: Option<&str>, dry_run: bool) -> Result<()> {
    let settings = load_settings();

    // File data is categorized on the fly; ledger rows keep their stored category.
    let items: Vec<SpendingItem> = match file {
        Some(f) => {
            let categorizer = load_categorizer(&settings.data_path())?;
            let records = read_records(Path::new(f))?;
            categorizer
                .categorize_transactions(&records)
                .iter()
                .map(SpendingItem::from)
                .collect()
        }
        None => {
            let month = parse_month_opt(month)?;
            let conn = open_ledger(&settings.db_path())?;
            list_transactions(&conn, month.as_deref())?
                .iter()
                .map(SpendingItem::from)
                .collect()
        }
    };

    if items.is_empty() {
        return Err(SpendwiseError::Advisor("no transactions to analyze".to_string()));
    }

    if dry_run {
        println!("{}", build_prompt(&items));
        return Ok(());
    }

    let config = AdvisorConfig::from_settings(&settings, std::env::var(API_KEY_ENV).ok())?;
    let result = Advisor::new(config)?.suggest(items)?;
    println!("{}", result.suggestions.trim());
    Ok(())
}
