use std::path::PathBuf;

use crate::db::{get_connection, init_db};
use crate::error::Result;
use crate::models::parse_currency;
use crate::settings::{load_settings, save_settings};

pub fn run(data_dir: Option<String>, base_currency: Option<String>) -> Result<()> {
    let mut settings = load_settings();

    let resolved = match data_dir {
        Some(dir) => resolve_data_dir(&dir)?,
        None => {
            let dir = PathBuf::from(&settings.data_dir);
            std::fs::create_dir_all(&dir)?;
            dir
        }
    };
    settings.data_dir = resolved.to_string_lossy().to_string();
    if let Some(code) = base_currency {
        settings.base_currency = parse_currency(&code)?;
    }

    std::fs::create_dir_all(settings.receipts_dir())?;
    save_settings(&settings)?;

    let conn = get_connection(&settings.db_path())?;
    init_db(&conn)?;

    println!(
        "Initialized clerk at {} (base currency {})",
        resolved.display(),
        settings.base_currency
    );
    Ok(())
}

/// Expand `~`, anchor relative paths at the working directory and create the
/// directory, so the stored path is absolute and canonical.
fn resolve_data_dir(path: &str) -> Result<PathBuf> {
    let expanded = match path.strip_prefix('~') {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest.trim_start_matches('/')),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    };
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()?.join(expanded)
    };
    std::fs::create_dir_all(&absolute)?;
    Ok(std::fs::canonicalize(&absolute)?)
}
