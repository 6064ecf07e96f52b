use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::expenses::{first_attachment, get_expense, save_expense};
use crate::extractor::extract;
use crate::fx::{Converter, RateStore};
use crate::models::{Expense, ExpenseStatus, ExtractionInput, ExtractionResult};

pub const UNKNOWN_FILENAME: &str = "unknown";

#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub expense: Expense,
    pub extraction: ExtractionResult,
}

/// Merge an extraction (and its conversion) into a stored expense. Extracted
/// values win; fields the extractor could not find keep their stored value.
fn merge(
    mut expense: Expense,
    extracted: &ExtractionResult,
    converter: &Converter<'_, impl RateStore + ?Sized>,
    today: NaiveDate,
) -> Result<Expense> {
    expense.txn_date = extracted.txn_date.or(expense.txn_date);
    expense.merchant_raw = extracted.merchant_raw.clone().or(expense.merchant_raw);
    expense.merchant_normalized = extracted
        .merchant_normalized
        .clone()
        .or(expense.merchant_normalized);
    expense.amount_original = extracted.amount_original.or(expense.amount_original);
    expense.currency_original = extracted
        .currency_original
        .clone()
        .or(expense.currency_original);
    expense.category = extracted.category.or(expense.category);
    expense.confidence = Some(extracted.confidence);
    expense.status = if extracted.needs_review {
        ExpenseStatus::NeedsReview
    } else {
        ExpenseStatus::Extracted
    };
    expense.currency_base = converter.base_currency().to_string();

    if let (Some(amount), Some(currency)) =
        (expense.amount_original, expense.currency_original.as_deref())
    {
        let as_of = expense.txn_date.unwrap_or(today);
        match converter.convert_to_base(amount, currency, as_of)? {
            Some(c) => {
                debug!(id = expense.id, rate = c.fx_rate, source = %c.fx_source, "converted");
                expense.amount_base = Some(c.amount_base);
                expense.fx_rate_used = Some(c.fx_rate);
                expense.fx_source = Some(c.fx_source);
            }
            None => warn!(id = expense.id, currency, %as_of, "no FX rate available"),
        }
    }
    Ok(expense)
}

/// Run the extractor against an expense's receipt filename plus optional
/// text and store the merged result. The conversion date falls back to
/// `today` when no transaction date is known.
pub fn run_extraction<S: RateStore + ?Sized>(
    conn: &Connection,
    converter: &Converter<'_, S>,
    expense_id: i64,
    text: Option<&str>,
    today: NaiveDate,
) -> Result<PipelineOutcome> {
    let tx = conn.unchecked_transaction()?;
    let existing = get_expense(&tx, expense_id)?;
    let filename = first_attachment(&tx, expense_id)?
        .map(|a| a.file_name)
        .unwrap_or_else(|| UNKNOWN_FILENAME.to_string());

    let extraction = extract(&ExtractionInput::new(filename, text));
    let expense = merge(existing, &extraction, converter, today)?;
    save_expense(&tx, &expense)?;
    tx.commit()?;

    info!(
        expense_id,
        confidence = extraction.confidence,
        needs_review = extraction.needs_review,
        "extraction applied"
    );
    Ok(PipelineOutcome { expense, extraction })
}
