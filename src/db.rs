use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use crate::error::{Result, SpendwiseError};
use crate::models::{NewTransaction, Transaction, TransactionType, TransactionUpdate};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS transactions (
    id INTEGER PRIMARY KEY,
    amount REAL NOT NULL,
    type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
    category TEXT NOT NULL,
    description TEXT,
    date TEXT NOT NULL DEFAULT (date('now')),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_transactions_date ON transactions(date);
CREATE INDEX IF NOT EXISTS idx_transactions_category ON transactions(category);
";

const SELECT_COLUMNS: &str =
    "SELECT id, amount, type, category, description, date, created_at, updated_at FROM transactions";

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    if let Some(dir) = db_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Opens the ledger and makes sure the schema exists.
pub fn open_ledger(db_path: &Path) -> Result<Connection> {
    let conn = get_connection(db_path)?;
    init_db(&conn)?;
    Ok(conn)
}

fn row_to_transaction(row: &Row<'_>) -> rusqlite::Result<Transaction> {
    let kind: String = row.get(2)?;
    let kind = kind.parse::<TransactionType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Transaction {
        id: row.get(0)?,
        amount: row.get(1)?,
        kind,
        category: row.get(3)?,
        description: row.get(4)?,
        date: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn round_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

pub fn insert_transaction(conn: &Connection, txn: &NewTransaction) -> Result<Transaction> {
    conn.execute(
        "INSERT INTO transactions (amount, type, category, description, date) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            round_cents(txn.amount),
            txn.kind.as_str(),
            txn.category,
            txn.description,
            txn.date
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, category = %txn.category, "inserted transaction");
    get_transaction(conn, id)
}

pub fn find_transaction(conn: &Connection, id: i64) -> Result<Option<Transaction>> {
    let txn = conn
        .query_row(&format!("{SELECT_COLUMNS} WHERE id = ?1"), [id], row_to_transaction)
        .optional()?;
    Ok(txn)
}

pub fn get_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    find_transaction(conn, id)?.ok_or(SpendwiseError::TransactionNotFound(id))
}

/// All transactions, newest first. `month` filters on `YYYY-MM`.
pub fn list_transactions(conn: &Connection, month: Option<&str>) -> Result<Vec<Transaction>> {
    let order = "ORDER BY date DESC, id DESC";
    let rows = match month {
        Some(m) => {
            let mut stmt =
                conn.prepare(&format!("{SELECT_COLUMNS} WHERE substr(date, 1, 7) = ?1 {order}"))?;
            let rows = stmt
                .query_map([m], row_to_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
        None => {
            let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} {order}"))?;
            let rows = stmt
                .query_map([], row_to_transaction)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        }
    };
    Ok(rows)
}

pub fn list_by_category(conn: &Connection, category: &str) -> Result<Vec<Transaction>> {
    let mut stmt =
        conn.prepare(&format!("{SELECT_COLUMNS} WHERE category = ?1 ORDER BY date DESC, id DESC"))?;
    let rows = stmt
        .query_map([category], row_to_transaction)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_transaction(conn: &Connection, id: i64, update: &TransactionUpdate) -> Result<Transaction> {
    let current = get_transaction(conn, id)?;
    if update.is_empty() {
        return Ok(current);
    }
    conn.execute(
        "UPDATE transactions SET amount = ?1, type = ?2, category = ?3, description = ?4, date = ?5, \
         updated_at = datetime('now') WHERE id = ?6",
        params![
            round_cents(update.amount.unwrap_or(current.amount)),
            update.kind.unwrap_or(current.kind).as_str(),
            update.category.as_ref().unwrap_or(&current.category),
            update.description.as_ref().or(current.description.as_ref()),
            update.date.as_ref().unwrap_or(&current.date),
            id
        ],
    )?;
    info!(id, "updated transaction");
    get_transaction(conn, id)
}

pub fn set_category(conn: &Connection, id: i64, category: &str) -> Result<()> {
    conn.execute(
        "UPDATE transactions SET category = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![category, id],
    )?;
    Ok(())
}

pub fn delete_transaction(conn: &Connection, id: i64) -> Result<Transaction> {
    let txn = get_transaction(conn, id)?;
    conn.execute("DELETE FROM transactions WHERE id = ?1", [id])?;
    info!(id, "deleted transaction");
    Ok(txn)
}

pub fn count_transactions(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT count(*) FROM transactions", [], |r| r.get(0))?)
}
