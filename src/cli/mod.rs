#[cfg(feature = "ai")]
pub mod advise;
pub mod categorize;
pub mod init;
pub mod rules;
pub mod status;
pub mod transactions;

use clap::{Parser, Subcommand};

use crate::error::{Result, SpendwiseError};
use crate::importer::parse_amount;

/// Accepts ledger amounts as written on statements: `-12.50`, `$1,200`, `(18.00)`.
fn amount_arg(raw: &str) -> std::result::Result<f64, String> {
    parse_amount(raw)
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("invalid amount: {raw}"))
}

/// Validates a `YYYY-MM` month filter.
pub(crate) fn parse_month_opt(month: Option<&str>) -> Result<Option<String>> {
    let Some(m) = month else {
        return Ok(None);
    };
    let m = m.trim();
    chrono::NaiveDate::parse_from_str(&format!("{m}-01"), "%Y-%m-%d")
        .map(|d| Some(d.format("%Y-%m").to_string()))
        .map_err(|_| SpendwiseError::Other(format!("Invalid month: {m} (expected YYYY-MM)")))
}

#[derive(Parser)]
#[command(name = "spendwise", version, about = "Personal finance: ledger, auto-categorization and spending advice.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Choose a data directory and initialize the ledger.
    Init {
        /// Path for spendwise data (default: ~/Documents/spendwise)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
    },
    /// Categorize a CSV/JSON file, or re-run rules on stored "Other" transactions.
    Categorize {
        /// CSV or JSON file of transactions (omit to re-categorize the ledger)
        file: Option<String>,
        /// Print categorized records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage categorization rules.
    Rules {
        #[command(subcommand)]
        command: RulesCommands,
    },
    /// Manage ledger transactions.
    #[command(alias = "txn")]
    Transactions {
        #[command(subcommand)]
        command: TransactionsCommands,
    },
    /// Ask the configured model for spending advice.
    #[cfg(feature = "ai")]
    Advise {
        /// CSV or JSON file of transactions (default: the ledger)
        file: Option<String>,
        /// Month filter for ledger data: YYYY-MM
        #[arg(long, conflicts_with = "file")]
        month: Option<String>,
        /// Print the prompt instead of sending it
        #[arg(long = "dry-run")]
        dry_run: bool,
    },
    /// Show settings, ledger and rule book summary.
    Status,
}

#[derive(Subcommand)]
pub enum RulesCommands {
    /// List every category and its patterns, in priority order.
    List,
    /// Add patterns to a category (created if new, with lowest priority).
    Add {
        /// Category name (case-insensitive)
        category: String,
        /// Patterns: case-insensitive regular expressions matched anywhere
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Remove patterns from a category by their exact source text.
    Remove {
        /// Category name (case-insensitive)
        category: String,
        #[arg(required = true)]
        patterns: Vec<String>,
    },
    /// Discard all custom rule edits and return to the built-in rules.
    Reset,
}

#[derive(Subcommand)]
pub enum TransactionsCommands {
    /// Record a transaction. Category and type are inferred when omitted.
    Add {
        /// Signed amount: negative for spending, positive for income
        #[arg(allow_negative_numbers = true, value_parser = amount_arg)]
        amount: f64,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// income or expense
        #[arg(long = "type")]
        kind: Option<String>,
        /// YYYY-MM-DD or MM/DD/YYYY (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List transactions, newest first.
    List {
        /// Month filter: YYYY-MM
        #[arg(long)]
        month: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show one transaction.
    Show { id: i64 },
    /// Change fields of a transaction.
    Update {
        id: i64,
        #[arg(long, allow_negative_numbers = true, value_parser = amount_arg)]
        amount: Option<f64>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long = "type")]
        kind: Option<String>,
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete a transaction.
    Delete { id: i64 },
}
