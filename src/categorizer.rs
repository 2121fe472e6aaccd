use std::sync::{Mutex, MutexGuard, PoisonError};

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::models::{CategorizedTransaction, TransactionRecord};

pub const INCOME_LABEL: &str = "Income";
pub const OTHER_LABEL: &str = "Other";

// Declaration order is category priority: "food" resolves to groceries
// because groceries comes before restaurants.
const BUILTIN_RULES: &[(&str, &[&str])] = &[
    (
        "groceries",
        &[
            "grocery", "groceries", "supermarket", "market", "food", "fresh", "produce", "dairy",
            "meat", "vegetable",
        ],
    ),
    (
        "restaurants",
        &["restaurant", "cafe", "dining", "meal", "lunch", "dinner", "breakfast", "eat", "dine", "food"],
    ),
    (
        "transportation",
        &["taxi", "uber", "lyft", "bus", "train", "subway", "metro", "fuel", "gas", "petrol", "toll", "parking"],
    ),
    (
        "utilities",
        &["electric", "water", "gas", "utility", "bill", "internet", "phone", "mobile", "cable", "tv"],
    ),
    (
        "entertainment",
        &[
            "movie", "cinema", "theater", "concert", "music", "sport", "game", "ticket", "stream",
            "netflix", "hbo", "disney",
        ],
    ),
    (
        "shopping",
        &[
            "clothing", "clothes", "shoes", "apparel", "mall", "shopping", "store", "retail",
            "electronics", "furniture",
        ],
    ),
    (
        "health",
        &[
            "doctor", "hospital", "pharmacy", "medication", "prescription", "health", "medical",
            "dentist", "optical",
        ],
    ),
    (
        "education",
        &["tuition", "school", "college", "university", "book", "textbook", "education", "course", "class"],
    ),
    (
        "bills",
        &["rent", "mortgage", "loan", "credit", "card", "payment", "bill", "fee", "charge"],
    ),
    (
        "income",
        &["salary", "wage", "income", "pay", "deposit", "refund", "bonus", "commission"],
    ),
];

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A pattern as supplied by a caller: raw text to compile, or a regex the
/// caller already built (used verbatim, flags included).
#[derive(Debug, Clone)]
pub enum PatternInput {
    Literal(String),
    Compiled(Regex),
}

impl From<&str> for PatternInput {
    fn from(s: &str) -> Self {
        Self::Literal(s.to_string())
    }
}

impl From<String> for PatternInput {
    fn from(s: String) -> Self {
        Self::Literal(s)
    }
}

impl From<&String> for PatternInput {
    fn from(s: &String) -> Self {
        Self::Literal(s.clone())
    }
}

impl From<Regex> for PatternInput {
    fn from(re: Regex) -> Self {
        Self::Compiled(re)
    }
}

#[derive(Debug, Clone)]
enum Matcher {
    Regex(Regex),
    /// Lowercased needle, used when literal text is not a valid regex.
    Substring(String),
}

/// A compiled matcher together with the source text it was built from.
/// Removal compares against `source`, never against the compiled form.
#[derive(Debug, Clone)]
pub struct Pattern {
    source: String,
    matcher: Matcher,
}

impl Pattern {
    /// Case-insensitive, unanchored matcher for `source`. Text that does not
    /// parse as a regex falls back to a plain substring match.
    pub fn literal(source: &str) -> Self {
        let matcher = match RegexBuilder::new(source).case_insensitive(true).build() {
            Ok(re) => Matcher::Regex(re),
            Err(err) => {
                warn!(pattern = source, error = %err, "invalid regex, matching as plain text");
                Matcher::Substring(source.to_lowercase())
            }
        };
        Self {
            source: source.to_string(),
            matcher,
        }
    }

    pub fn compiled(re: Regex) -> Self {
        Self {
            source: re.as_str().to_string(),
            matcher: Matcher::Regex(re),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, text: &str) -> bool {
        match &self.matcher {
            Matcher::Regex(re) => re.is_match(text),
            Matcher::Substring(needle) => text.to_lowercase().contains(needle.as_str()),
        }
    }
}

impl From<PatternInput> for Pattern {
    fn from(input: PatternInput) -> Self {
        match input {
            PatternInput::Literal(s) => Self::literal(&s),
            PatternInput::Compiled(re) => Self::compiled(re),
        }
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CategoryRules {
    name: String,
    patterns: Vec<Pattern>,
}

/// Ordered category -> patterns table. Category keys are lowercase; the
/// position of a category in the table is its priority.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    categories: Vec<CategoryRules>,
}

impl RuleSet {
    pub fn builtin() -> Self {
        let categories = BUILTIN_RULES
            .iter()
            .map(|(name, patterns)| CategoryRules {
                name: name.to_string(),
                patterns: patterns.iter().map(|p| Pattern::literal(p)).collect(),
            })
            .collect();
        Self { categories }
    }

    /// Label for a transaction: `Income` for any positive amount, otherwise
    /// the first category with a matching pattern, otherwise `Other`.
    /// A NaN amount is not positive.
    pub fn categorize(&self, description: &str, amount: f64) -> String {
        if amount > 0.0 {
            return INCOME_LABEL.to_string();
        }
        self.categories
            .iter()
            .find(|cat| cat.patterns.iter().any(|p| p.is_match(description)))
            .map(|cat| capitalize(&cat.name))
            .unwrap_or_else(|| OTHER_LABEL.to_string())
    }

    pub fn add_patterns<I, P>(&mut self, category: &str, patterns: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PatternInput>,
    {
        if category.is_empty() {
            warn!("ignoring patterns for empty category name");
            return;
        }
        let key = category.to_lowercase();
        let idx = match self.categories.iter().position(|c| c.name == key) {
            Some(idx) => idx,
            None => {
                debug!(category = %key, "creating category");
                self.categories.push(CategoryRules {
                    name: key.clone(),
                    patterns: Vec::new(),
                });
                self.categories.len() - 1
            }
        };
        let entry = &mut self.categories[idx];
        let before = entry.patterns.len();
        entry
            .patterns
            .extend(patterns.into_iter().map(|p| Pattern::from(p.into())));
        debug!(category = %key, added = entry.patterns.len() - before, "added patterns");
    }

    /// Removes every pattern of `category` whose source text is listed in
    /// `sources`, wherever it sits in the list. The category itself stays,
    /// even if emptied. Returns how many patterns were removed.
    pub fn remove_patterns<I, S>(&mut self, category: &str, sources: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = category.to_lowercase();
        let Some(entry) = self.categories.iter_mut().find(|c| c.name == key) else {
            debug!(category = %key, "no such category, nothing to remove");
            return 0;
        };
        let sources: Vec<S> = sources.into_iter().collect();
        let before = entry.patterns.len();
        entry
            .patterns
            .retain(|p| !sources.iter().any(|s| s.as_ref() == p.source()));
        let removed = before - entry.patterns.len();
        debug!(category = %key, removed, "removed patterns");
        removed
    }

    pub fn has_category(&self, category: &str) -> bool {
        let key = category.to_lowercase();
        self.categories.iter().any(|c| c.name == key)
    }

    /// Category keys in priority order.
    pub fn categories(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.name.clone()).collect()
    }

    /// Snapshot of every category with its pattern sources, in priority order.
    pub fn rules(&self) -> Vec<(String, Vec<String>)> {
        self.categories
            .iter()
            .map(|c| {
                (
                    c.name.clone(),
                    c.patterns.iter().map(|p| p.source().to_string()).collect(),
                )
            })
            .collect()
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ---------------------------------------------------------------------------
// Categorizer
// ---------------------------------------------------------------------------

/// Shareable categorizer. Every call takes the same lock, so categorization
/// never observes a pattern list mid-mutation.
#[derive(Debug)]
pub struct Categorizer {
    rules: Mutex<RuleSet>,
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Categorizer {
    /// Categorizer seeded with the built-in categories.
    pub fn new() -> Self {
        Self::with_rules(RuleSet::builtin())
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    // Every mutation leaves the rule set valid, so a poisoned lock is safe to reuse.
    fn lock(&self) -> MutexGuard<'_, RuleSet> {
        self.rules.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn categorize_transaction(&self, description: &str, amount: f64) -> String {
        self.lock().categorize(description, amount)
    }

    /// Categorizes each record independently, returning copies in input
    /// order with `category` set (any existing value is replaced).
    pub fn categorize_transactions(&self, records: &[TransactionRecord]) -> Vec<CategorizedTransaction> {
        let rules = self.lock();
        let out: Vec<CategorizedTransaction> = records
            .iter()
            .map(|record| {
                let category = rules.categorize(record.description_or_empty(), record.amount_value());
                CategorizedTransaction::new(record.clone(), category)
            })
            .collect();
        debug!(count = out.len(), "categorized batch");
        out
    }

    pub fn add_custom_patterns<I, P>(&self, category: &str, patterns: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<PatternInput>,
    {
        self.lock().add_patterns(category, patterns);
    }

    pub fn remove_patterns<I, S>(&self, category: &str, sources: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lock().remove_patterns(category, sources)
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.lock().has_category(category)
    }

    pub fn categories(&self) -> Vec<String> {
        self.lock().categories()
    }

    pub fn rules(&self) -> Vec<(String, Vec<String>)> {
        self.lock().rules()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Amount;
    use serde_json::json;
    use std::sync::Arc;

    fn record(description: Option<&str>, amount: Option<Amount>) -> TransactionRecord {
        TransactionRecord {
            description: description.map(str::to_string),
            amount,
            ..Default::default()
        }
    }

    #[test]
    fn test_positive_amount_is_income() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("grocery refund", 12.0), "Income");
        assert_eq!(c.categorize_transaction("Netflix", 0.01), "Income");
        assert_eq!(c.categorize_transaction("", 1.0), "Income");
        assert_eq!(c.categorize_transaction("Salary deposit", 3000.0), "Income");
    }

    #[test]
    fn test_builtin_categories() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("I bought groceries today", -42.50), "Groceries");
        assert_eq!(c.categorize_transaction("Monthly Netflix subscription", -15.99), "Entertainment");
        assert_eq!(c.categorize_transaction("UBER TRIP", -23.10), "Transportation");
        assert_eq!(c.categorize_transaction("City water bill", -60.0), "Utilities");
        assert_eq!(c.categorize_transaction("CVS Pharmacy", -9.0), "Health");
        assert_eq!(c.categorize_transaction("Monthly rent", -1500.0), "Bills");
    }

    #[test]
    fn test_unmatched_is_other() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("xyzzy", -5.0), "Other");
        assert_eq!(c.categorize_transaction("", 0.0), "Other");
        assert_eq!(c.categorize_transaction("", f64::NAN), "Other");
    }

    #[test]
    fn test_nan_amount_falls_through_to_patterns() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("supermarket", f64::NAN), "Groceries");
    }

    #[test]
    fn test_income_keyword_reachable_for_non_positive() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("salary", -1.0), "Income");
        assert_eq!(c.categorize_transaction("bonus", 0.0), "Income");
    }

    #[test]
    fn test_food_resolves_to_groceries() {
        let c = Categorizer::new();
        assert_eq!(c.categorize_transaction("food at the restaurant", -30.0), "Groceries");
        assert_eq!(c.categorize_transaction("restaurant", -30.0), "Restaurants");
    }

    #[test]
    fn test_batch_matches_elementwise() {
        let c = Categorizer::new();
        let records = vec![
            record(Some("Whole Foods Market"), Some(Amount::Text("-82.10".into()))),
            record(None, Some(Amount::Number(-3.0))),
            record(Some("Paycheck deposit"), Some(Amount::Text("2500".into()))),
            record(Some("movie night"), None),
            record(Some("train ticket"), Some(Amount::Text("not a number".into()))),
        ];
        let out = c.categorize_transactions(&records);
        assert_eq!(out.len(), records.len());
        for (rec, cat) in records.iter().zip(&out) {
            assert_eq!(&cat.record, rec);
            assert_eq!(
                cat.category,
                c.categorize_transaction(rec.description_or_empty(), rec.amount_value())
            );
        }
        let labels: Vec<&str> = out.iter().map(|t| t.category.as_str()).collect();
        assert_eq!(labels, vec!["Groceries", "Other", "Income", "Entertainment", "Transportation"]);
    }

    #[test]
    fn test_batch_overwrites_existing_category() {
        let c = Categorizer::new();
        let mut rec = record(Some("coffee at the cafe"), Some(Amount::Number(-4.5)));
        rec.extra.insert("category".into(), json!("Misc"));
        rec.extra.insert("date".into(), json!("2025-03-01"));
        let out = c.categorize_transactions(std::slice::from_ref(&rec));
        let value = serde_json::to_value(&out[0]).unwrap();
        assert_eq!(value["category"], json!("Restaurants"));
        assert_eq!(value["date"], json!("2025-03-01"));
        // Input untouched.
        assert_eq!(rec.extra["category"], json!("Misc"));
    }

    #[test]
    fn test_add_custom_patterns_new_category() {
        let c = Categorizer::new();
        c.add_custom_patterns("Pets", ["vet", "petstore"]);
        assert_eq!(c.categorize_transaction("Visit to the vet", -80.0), "Pets");
        assert_eq!(c.categorize_transaction("vet clinic", -18.0), "Pets");
        // "store" is a shopping pattern, and shopping outranks a new category.
        assert_eq!(c.categorize_transaction("PETSTORE #12", -18.0), "Shopping");
        assert_eq!(c.categories().last().map(String::as_str), Some("pets"));
    }

    #[test]
    fn test_new_category_has_lowest_priority() {
        let c = Categorizer::new();
        c.add_custom_patterns("coffee", ["cafe"]);
        assert_eq!(c.categorize_transaction("corner cafe", -4.0), "Restaurants");
    }

    #[test]
    fn test_add_to_existing_category_case_insensitive() {
        let c = Categorizer::new();
        c.add_custom_patterns("GROCERIES", ["aldi"]);
        assert_eq!(c.categorize_transaction("ALDI 4411", -33.0), "Groceries");
        assert_eq!(c.categories().len(), BUILTIN_RULES.len());
        let rules = c.rules();
        let groceries = &rules[0].1;
        assert_eq!(groceries.last().map(String::as_str), Some("aldi"));
    }

    #[test]
    fn test_add_compiled_pattern_verbatim() {
        let c = Categorizer::new();
        // Case-sensitive on purpose: compiled matchers keep their own flags.
        let re = Regex::new(r"^ZZ\d+$").unwrap();
        c.add_custom_patterns("codes", [PatternInput::from(re)]);
        assert_eq!(c.categorize_transaction("ZZ123", -1.0), "Codes");
        assert_eq!(c.categorize_transaction("zz123", -1.0), "Other");
        assert_eq!(c.rules().last().unwrap().1, vec![r"^ZZ\d+$".to_string()]);
    }

    #[test]
    fn test_literal_regex_syntax_is_honoured() {
        let c = Categorizer::new();
        c.add_custom_patterns("pets", [r"pet\s?co"]);
        assert_eq!(c.categorize_transaction("PET CO order", -20.0), "Pets");
    }

    #[test]
    fn test_invalid_regex_literal_matches_as_text() {
        let c = Categorizer::new();
        c.add_custom_patterns("odd", ["(unclosed"]);
        assert_eq!(c.categorize_transaction("zz (UNCLOSED zz", -1.0), "Odd");
        assert_eq!(c.rules().last().unwrap().1, vec!["(unclosed".to_string()]);
    }

    #[test]
    fn test_duplicate_patterns_allowed() {
        let mut rules = RuleSet::default();
        rules.add_patterns("pets", ["vet", "vet"]);
        assert_eq!(rules.rules()[0].1.len(), 2);
        assert_eq!(rules.remove_patterns("pets", ["vet"]), 2);
    }

    #[test]
    fn test_remove_keeps_category() {
        let c = Categorizer::new();
        c.add_custom_patterns("Pets", ["vet"]);
        c.remove_patterns("pets", ["vet"]);
        assert_eq!(c.categorize_transaction("Visit to the vet", -80.0), "Other");
        assert!(c.has_category("Pets"));
        assert!(c.rules().last().unwrap().1.is_empty());
    }

    #[test]
    fn test_remove_adjacent_patterns_in_one_call() {
        let c = Categorizer::new();
        c.add_custom_patterns("pets", ["vet", "petstore", "kennel", "grooming"]);
        let removed = c.remove_patterns("Pets", ["vet", "petstore", "kennel"]);
        assert_eq!(removed, 3);
        assert_eq!(c.rules().last().unwrap().1, vec!["grooming".to_string()]);
    }

    #[test]
    fn test_remove_builtin_patterns() {
        let c = Categorizer::new();
        let removed = c.remove_patterns("groceries", ["market", "food", "fresh"]);
        assert_eq!(removed, 3);
        assert_eq!(c.categorize_transaction("fresh food market", -10.0), "Restaurants");
    }

    #[test]
    fn test_remove_unknown_category_is_noop() {
        let c = Categorizer::new();
        let before = c.rules();
        assert_eq!(c.remove_patterns("nope", ["vet"]), 0);
        assert_eq!(c.rules(), before);
    }

    #[test]
    fn test_remove_matches_source_not_input() {
        let c = Categorizer::new();
        assert_eq!(c.remove_patterns("groceries", ["Grocery", "GROCERY", "grocer"]), 0);
        assert_eq!(c.categorize_transaction("grocery", -1.0), "Groceries");
    }

    #[test]
    fn test_empty_category_name_ignored() {
        let c = Categorizer::new();
        c.add_custom_patterns("", ["vet"]);
        assert_eq!(c.categories().len(), BUILTIN_RULES.len());
    }

    #[test]
    fn test_capitalize_only_first_char() {
        assert_eq!(capitalize("groceries"), "Groceries");
        assert_eq!(capitalize("eating out"), "Eating out");
        assert_eq!(capitalize("élan"), "Élan");
        assert_eq!(capitalize(""), "");
    }

    #[test]
    fn test_shared_across_threads() {
        let c = Arc::new(Categorizer::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let c = Arc::clone(&c);
                std::thread::spawn(move || {
                    for j in 0..50 {
                        let pat = format!("thing{i}x{j}");
                        c.add_custom_patterns("things", [pat.as_str()]);
                        assert_eq!(c.categorize_transaction(&pat, -1.0), "Things");
                        c.remove_patterns("things", [pat.as_str()]);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(c.rules().last().unwrap().1.is_empty());
    }
}
