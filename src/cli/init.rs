use crate::db::open_ledger;
use crate::error::Result;
use crate::rules::RuleBook;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        let expanded = shellexpand_path(&dir);
        std::fs::create_dir_all(&expanded)?;
        // Canonicalize now that the directory exists.
        settings.data_dir = shellexpand_path(&expanded);
    }
    save_settings(&settings)?;

    let resolved = settings.data_path();
    std::fs::create_dir_all(&resolved)?;
    open_ledger(&settings.db_path())?;

    let rules_path = RuleBook::path_in(&resolved);
    if !rules_path.exists() {
        RuleBook::default().save(&rules_path)?;
    }

    println!("Initialized spendwise at {}", resolved.display());
    Ok(())
}
