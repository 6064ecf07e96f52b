use std::path::PathBuf;

use chrono::Local;
use colored::Colorize;

use crate::cli::expenses::print_expense;
use crate::cli::open;
use crate::error::{ClerkError, Result};
use crate::extractor::extract;
use crate::fx::Converter;
use crate::models::ExtractionInput;
use crate::pipeline::run_extraction;
use crate::rates::SqliteRates;

pub fn run(
    id: Option<i64>,
    text: Option<String>,
    text_file: Option<PathBuf>,
    dry_run: bool,
    filename: Option<String>,
) -> Result<()> {
    let text = match text_file {
        Some(path) => Some(std::fs::read_to_string(path)?),
        None => text,
    };

    if dry_run {
        let filename = filename
            .ok_or_else(|| ClerkError::Other("--dry-run needs --filename".to_string()))?;
        let result = extract(&ExtractionInput::new(filename, text));
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    let id = id.ok_or_else(|| ClerkError::Other("Missing expense ID".to_string()))?;
    let (settings, conn) = open()?;
    let store = SqliteRates::new(&conn);
    let converter = Converter::new(&store, &settings.base_currency());

    let outcome = run_extraction(&conn, &converter, id, text.as_deref(), Local::now().date_naive())?;
    print_expense(&outcome.expense);
    if outcome.extraction.needs_review {
        println!("{}", "Flagged for review".yellow());
    }
    if outcome.expense.amount_original.is_some() && outcome.expense.amount_base.is_none() {
        println!(
            "{}",
            format!("No {} rate available yet; run `clerk rates sync`", converter.base_currency()).red()
        );
    }
    Ok(())
}
