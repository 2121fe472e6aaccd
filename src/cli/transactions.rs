use comfy_table::{Cell, Table};

use crate::cli::parse_month_opt;
use crate::db::{delete_transaction, get_transaction, insert_transaction, list_transactions, open_ledger, update_transaction};
use crate::error::{Result, SpendwiseError};
use crate::fmt::{label, money, truncate};
use crate::importer::normalize_date;
use crate::models::{NewTransaction, Transaction, TransactionType, TransactionUpdate};
use crate::rules::load_categorizer;
use crate::settings::load_settings;

fn check_amount(amount: f64) -> Result<f64> {
    if amount.is_finite() {
        Ok(amount)
    } else {
        Err(SpendwiseError::InvalidAmount(amount.to_string()))
    }
}

fn check_date(raw: &str) -> Result<String> {
    normalize_date(raw).ok_or_else(|| SpendwiseError::InvalidDate(raw.to_string()))
}

fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

pub fn add(
    amount: f64,
    description: Option<&str>,
    category: Option<&str>,
    kind: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let settings = load_settings();
    let amount = check_amount(amount)?;
    let kind = match kind {
        Some(k) => k.parse()?,
        None => TransactionType::for_amount(amount),
    };
    let date = match date {
        Some(d) => check_date(d)?,
        None => today(),
    };
    let category = match category {
        Some(c) => c.to_string(),
        None => load_categorizer(&settings.data_path())?
            .categorize_transaction(description.unwrap_or(""), amount),
    };

    let conn = open_ledger(&settings.db_path())?;
    let txn = insert_transaction(
        &conn,
        &NewTransaction {
            amount,
            kind,
            category,
            description: description.map(str::to_string),
            date,
        },
    )?;
    println!(
        "Added transaction {}: {} \u{2192} {}",
        txn.id,
        money(txn.amount),
        txn.category
    );
    Ok(())
}

pub fn list(month: Option<&str>, json: bool) -> Result<()> {
    let month = parse_month_opt(month)?;
    let conn = open_ledger(&load_settings().db_path())?;
    let rows = list_transactions(&conn, month.as_deref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Description", "Type", "Amount", "Category"]);
    for t in &rows {
        table.add_row(vec![
            Cell::new(t.id),
            Cell::new(&t.date),
            Cell::new(truncate(t.description.as_deref().unwrap_or(""), 40)),
            Cell::new(t.kind),
            Cell::new(money(t.amount)),
            Cell::new(label(&t.category)),
        ]);
    }
    println!("Transactions\n{table}");
    Ok(())
}

fn print_transaction(t: &Transaction) {
    println!("ID:           {}", t.id);
    println!("Date:         {}", t.date);
    println!("Description:  {}", t.description.as_deref().unwrap_or("(none)"));
    println!("Amount:       {}", money(t.amount));
    println!("Type:         {}", t.kind);
    println!("Category:     {}", label(&t.category));
    println!("Created:      {}", t.created_at);
    println!("Updated:      {}", t.updated_at);
}

pub fn show(id: i64) -> Result<()> {
    let conn = open_ledger(&load_settings().db_path())?;
    print_transaction(&get_transaction(&conn, id)?);
    Ok(())
}

pub fn update(
    id: i64,
    amount: Option<f64>,
    description: Option<&str>,
    category: Option<&str>,
    kind: Option<&str>,
    date: Option<&str>,
) -> Result<()> {
    let update = TransactionUpdate {
        amount: amount.map(check_amount).transpose()?,
        kind: kind.map(str::parse).transpose()?,
        category: category.map(str::to_string),
        description: description.map(str::to_string),
        date: date.map(check_date).transpose()?,
    };
    let conn = open_ledger(&load_settings().db_path())?;
    let txn = update_transaction(&conn, id, &update)?;
    if update.is_empty() {
        println!("Nothing to update for transaction {id}");
    } else {
        println!("Updated transaction {id}");
    }
    print_transaction(&txn);
    Ok(())
}

pub fn delete(id: i64) -> Result<()> {
    let conn = open_ledger(&load_settings().db_path())?;
    let txn = delete_transaction(&conn, id)?;
    println!(
        "Deleted transaction {}: {} {}",
        txn.id,
        money(txn.amount),
        txn.description.as_deref().unwrap_or("")
    );
    Ok(())
}
