use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::categorizer::Categorizer;
use crate::error::{Result, SpendwiseError};

pub const RULES_FILE: &str = "rules.json";

/// One persisted change to the built-in rule set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum RuleEdit {
    Add { category: String, patterns: Vec<String> },
    Remove { category: String, patterns: Vec<String> },
}

/// Ordered log of rule edits, replayed on top of the built-ins at startup.
/// Order matters: a remove only affects patterns added before it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleBook {
    #[serde(default)]
    pub edits: Vec<RuleEdit>,
}

impl RuleBook {
    pub fn path_in(data_dir: &Path) -> PathBuf {
        data_dir.join(RULES_FILE)
    }

    /// Missing file means no edits. A file that exists but does not parse is
    /// an error, so a typo never silently drops the user's rules.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SpendwiseError::Settings(format!("could not parse {}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }

    pub fn push(&mut self, edit: RuleEdit) {
        self.edits.push(edit);
    }

    pub fn apply(&self, categorizer: &Categorizer) {
        for edit in &self.edits {
            match edit {
                RuleEdit::Add { category, patterns } => {
                    categorizer.add_custom_patterns(category, patterns);
                }
                RuleEdit::Remove { category, patterns } => {
                    if categorizer.remove_patterns(category, patterns) == 0 {
                        warn!(category = %category, "rule book removal matched nothing");
                    }
                }
            }
        }
        debug!(edits = self.edits.len(), "applied rule book");
    }

    /// Built-in categorizer with this rule book replayed onto it.
    pub fn categorizer(&self) -> Categorizer {
        let categorizer = Categorizer::new();
        self.apply(&categorizer);
        categorizer
    }
}

/// Loads the rule book from the data dir and builds the effective categorizer.
pub fn load_categorizer(data_dir: &Path) -> Result<Categorizer> {
    Ok(RuleBook::load(&RuleBook::path_in(data_dir))?.categorizer())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(category: &str, patterns: &[&str]) -> RuleEdit {
        RuleEdit::Add {
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn remove(category: &str, patterns: &[&str]) -> RuleEdit {
        RuleEdit::Remove {
            category: category.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let book = RuleBook::load(&RuleBook::path_in(dir.path())).unwrap();
        assert!(book.edits.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = RuleBook::path_in(&dir.path().join("nested"));
        let mut book = RuleBook::default();
        book.push(add("Pets", &["vet"]));
        book.push(remove("groceries", &["market"]));
        book.save(&path).unwrap();
        let loaded = RuleBook::load(&path).unwrap();
        assert_eq!(loaded, book);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"action\": \"add\""));
    }

    #[test]
    fn test_malformed_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = RuleBook::path_in(dir.path());
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(RuleBook::load(&path), Err(SpendwiseError::Settings(_))));
    }

    #[test]
    fn test_edits_replay_in_order() {
        let mut book = RuleBook::default();
        book.push(add("Pets", &["vet", "petstore"]));
        book.push(remove("pets", &["vet"]));
        book.push(add("pets", &["kennel"]));
        let c = book.categorizer();
        assert_eq!(c.categorize_transaction("Visit to the vet", -80.0), "Other");
        assert_eq!(c.categorize_transaction("kennel fees", -30.0), "Bills");
        assert_eq!(c.categorize_transaction("kennel", -30.0), "Pets");
        assert_eq!(
            c.rules().last().unwrap().1,
            vec!["petstore".to_string(), "kennel".to_string()]
        );
    }

    #[test]
    fn test_remove_before_add_has_no_effect() {
        let mut book = RuleBook::default();
        book.push(remove("pets", &["vet"]));
        book.push(add("pets", &["vet"]));
        let c = book.categorizer();
        assert_eq!(c.categorize_transaction("vet", -1.0), "Pets");
    }
}
