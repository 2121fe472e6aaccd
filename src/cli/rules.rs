use comfy_table::{Cell, Table};

use crate::error::{Result, SpendwiseError};
use crate::rules::{RuleBook, RuleEdit};
use crate::settings::get_data_dir;

fn load_book() -> Result<(std::path::PathBuf, RuleBook)> {
    let path = RuleBook::path_in(&get_data_dir());
    let book = RuleBook::load(&path)?;
    Ok((path, book))
}

pub fn list() -> Result<()> {
    let (_, book) = load_book()?;
    let categorizer = book.categorizer();

    let mut table = Table::new();
    table.set_header(vec!["#", "Category", "Patterns"]);
    for (i, (category, patterns)) in categorizer.rules().into_iter().enumerate() {
        let shown = if patterns.is_empty() {
            "(none)".to_string()
        } else {
            patterns.join(", ")
        };
        table.add_row(vec![Cell::new(i + 1), Cell::new(category), Cell::new(shown)]);
    }
    println!("Rules\n{table}");
    println!("{} custom edit(s)", book.edits.len());
    Ok(())
}

pub fn add(category: &str, patterns: &[String]) -> Result<()> {
    if category.trim().is_empty() {
        return Err(SpendwiseError::Other("Category name cannot be empty".to_string()));
    }
    let (path, mut book) = load_book()?;
    let existed = book.categorizer().has_category(category);
    book.push(RuleEdit::Add {
        category: category.to_string(),
        patterns: patterns.to_vec(),
    });
    book.save(&path)?;

    let key = category.to_lowercase();
    if existed {
        println!("Added {} pattern(s) to {key}", patterns.len());
    } else {
        println!("Created category {key} with {} pattern(s)", patterns.len());
    }
    Ok(())
}

pub fn remove(category: &str, patterns: &[String]) -> Result<()> {
    let (path, mut book) = load_book()?;
    let key = category.to_lowercase();

    // Dry run against the current rules so no-op edits are never recorded.
    let removed = book.categorizer().remove_patterns(category, patterns);
    if removed == 0 {
        println!("No matching patterns in {key}; nothing removed");
        return Ok(());
    }

    book.push(RuleEdit::Remove {
        category: category.to_string(),
        patterns: patterns.to_vec(),
    });
    book.save(&path)?;
    println!("Removed {removed} pattern(s) from {key}");
    Ok(())
}

pub fn reset() -> Result<()> {
    let (path, book) = load_book()?;
    let count = book.edits.len();
    RuleBook::default().save(&path)?;
    println!("Discarded {count} custom edit(s); built-in rules restored");
    Ok(())
}
