use std::path::Path;

use comfy_table::{Cell, Table};
use rusqlite::Connection;

use crate::categorizer::{Categorizer, OTHER_LABEL};
use crate::db::{list_by_category, open_ledger, set_category};
use crate::error::Result;
use crate::fmt::{label, money, truncate};
use crate::importer::read_records;
use crate::models::CategorizedTransaction;
use crate::rules::load_categorizer;
use crate::settings::load_settings;

pub struct CategorizeResult {
    pub categorized: usize,
    pub still_other: usize,
}

/// Re-runs the rules over ledger transactions still labelled `Other`.
pub fn recategorize_other(conn: &Connection, categorizer: &Categorizer) -> Result<CategorizeResult> {
    let mut categorized = 0usize;
    let mut still_other = 0usize;
    for txn in list_by_category(conn, OTHER_LABEL)? {
        let category =
            categorizer.categorize_transaction(txn.description.as_deref().unwrap_or(""), txn.amount);
        if category == OTHER_LABEL {
            still_other += 1;
        } else {
            set_category(conn, txn.id, &category)?;
            categorized += 1;
        }
    }
    Ok(CategorizeResult {
        categorized,
        still_other,
    })
}

pub fn run(file: Option<&str>, json: bool) -> Result<()> {
    let settings = load_settings();
    let categorizer = load_categorizer(&settings.data_path())?;

    let Some(file) = file else {
        let conn = open_ledger(&settings.db_path())?;
        let result = recategorize_other(&conn, &categorizer)?;
        println!(
            "{} categorized, {} still {OTHER_LABEL}",
            result.categorized, result.still_other
        );
        return Ok(());
    };

    let records = read_records(Path::new(file))?;
    let categorized = categorizer.categorize_transactions(&records);
    if json {
        println!("{}", serde_json::to_string_pretty(&categorized)?);
    } else {
        print_table(&categorized);
    }
    Ok(())
}

fn print_table(rows: &[CategorizedTransaction]) {
    let mut table = Table::new();
    table.set_header(vec!["Date", "Description", "Amount", "Category"]);
    for row in rows {
        let date = row
            .record
            .extra_text("date")
            .or_else(|| row.record.extra_text("Date"))
            .unwrap_or_default();
        table.add_row(vec![
            Cell::new(date),
            Cell::new(truncate(row.record.description_or_empty(), 48)),
            Cell::new(money(row.record.amount_value())),
            Cell::new(label(&row.category)),
        ]);
    }
    let other = rows.iter().filter(|r| r.category == OTHER_LABEL).count();
    println!("{table}");
    println!("{} transactions, {} categorized, {other} {OTHER_LABEL}", rows.len(), rows.len() - other);
}
