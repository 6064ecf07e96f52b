use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::{ClerkError, Result};
use crate::fx::{Converter, RateStore};
use crate::merchant::normalize_merchant;
use crate::models::{Attachment, Category, Expense, ExpenseStatus};

pub const MAX_PAGE: u32 = 500;

const EXPENSE_COLUMNS: &str = "id, txn_date, merchant_raw, merchant_normalized, amount_original, \
     currency_original, amount_base, currency_base, fx_rate_used, fx_source, category, \
     confidence, status, notes, created_at";

fn text_conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn expense_from_row(row: &Row<'_>) -> rusqlite::Result<Expense> {
    let category: Option<String> = row.get(10)?;
    let category = category
        .map(|c| c.parse::<Category>())
        .transpose()
        .map_err(|e| text_conversion_error(10, e.to_string()))?;
    let status: String = row.get(12)?;
    let status = status
        .parse::<ExpenseStatus>()
        .map_err(|e| text_conversion_error(12, e.to_string()))?;
    Ok(Expense {
        id: row.get(0)?,
        txn_date: row.get(1)?,
        merchant_raw: row.get(2)?,
        merchant_normalized: row.get(3)?,
        amount_original: row.get(4)?,
        currency_original: row.get(5)?,
        amount_base: row.get(6)?,
        currency_base: row.get(7)?,
        fx_rate_used: row.get(8)?,
        fx_source: row.get(9)?,
        category,
        confidence: row.get(11)?,
        status,
        notes: row.get(13)?,
        created_at: row.get(14)?,
    })
}

/// Fields supplied when recording an expense by hand or at upload time.
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub txn_date: Option<NaiveDate>,
    pub merchant_raw: Option<String>,
    pub amount_original: Option<f64>,
    pub currency_original: Option<String>,
    pub category: Option<Category>,
    pub notes: Option<String>,
}

pub fn create_expense<S: RateStore + ?Sized>(
    conn: &Connection,
    converter: &Converter<'_, S>,
    new: &NewExpense,
) -> Result<i64> {
    let currency = new.currency_original.as_deref().map(str::to_uppercase);
    let conversion = match (new.amount_original, currency.as_deref(), new.txn_date) {
        (Some(amount), Some(curr), Some(date)) => converter.convert_to_base(amount, curr, date)?,
        _ => None,
    };

    let merchant_normalized = new.merchant_raw.as_deref().and_then(normalize_merchant);

    conn.execute(
        "INSERT INTO expenses (txn_date, merchant_raw, merchant_normalized, amount_original, \
         currency_original, amount_base, currency_base, fx_rate_used, fx_source, category, notes, \
         status) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 'extracted')",
        rusqlite::params![
            new.txn_date,
            new.merchant_raw,
            merchant_normalized,
            new.amount_original,
            currency,
            conversion.as_ref().map(|c| c.amount_base),
            converter.base_currency(),
            conversion.as_ref().map(|c| c.fx_rate),
            conversion.as_ref().map(|c| c.fx_source.as_str()),
            new.category.map(|c| c.as_str()),
            new.notes,
        ],
    )?;
    let id = conn.last_insert_rowid();
    info!(id, converted = conversion.is_some(), "created expense");
    Ok(id)
}

pub fn get_expense(conn: &Connection, id: i64) -> Result<Expense> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1");
    conn.query_row(&sql, [id], expense_from_row)
        .optional()?
        .ok_or(ClerkError::UnknownExpense(id))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortField {
    #[default]
    TxnDate,
    CreatedAt,
    AmountBase,
    Merchant,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            Self::TxnDate => "txn_date",
            Self::CreatedAt => "created_at",
            Self::AmountBase => "amount_base",
            Self::Merchant => "merchant_normalized",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExpenseFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub category: Option<Category>,
    pub merchant: Option<String>,
    pub status: Option<ExpenseStatus>,
    pub limit: u32,
    pub offset: u32,
    pub sort_by: SortField,
    pub descending: bool,
}

impl Default for ExpenseFilter {
    fn default() -> Self {
        Self {
            date_from: None,
            date_to: None,
            category: None,
            merchant: None,
            status: None,
            limit: 50,
            offset: 0,
            sort_by: SortField::TxnDate,
            descending: true,
        }
    }
}

pub fn list_expenses(conn: &Connection, filter: &ExpenseFilter) -> Result<Vec<Expense>> {
    if filter.limit == 0 || filter.limit > MAX_PAGE {
        return Err(ClerkError::Other(format!(
            "limit must be between 1 and {MAX_PAGE}, got {}",
            filter.limit
        )));
    }

    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();
    let mut push = |clause: &str, value: Value| {
        params.push(value);
        clauses.push(clause.replace('?', &format!("?{}", params.len())));
    };
    if let Some(from) = filter.date_from {
        push("txn_date >= ?", Value::Text(from.to_string()));
    }
    if let Some(to) = filter.date_to {
        push("txn_date <= ?", Value::Text(to.to_string()));
    }
    if let Some(category) = filter.category {
        push("category = ?", Value::Text(category.as_str().to_string()));
    }
    if let Some(status) = filter.status {
        push("status = ?", Value::Text(status.as_str().to_string()));
    }
    if let Some(merchant) = &filter.merchant {
        push(
            "(merchant_raw LIKE ? OR merchant_normalized LIKE ?)",
            Value::Text(format!("%{merchant}%")),
        );
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let order = if filter.descending { "DESC" } else { "ASC" };
    let sql = format!(
        "SELECT {EXPENSE_COLUMNS} FROM expenses {where_clause} \
         ORDER BY {} {order}, id {order} LIMIT {} OFFSET {}",
        filter.sort_by.column(),
        filter.limit,
        filter.offset
    );
    debug!(%sql, "listing expenses");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), expense_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A manual edit; `None` leaves the stored value unchanged.
#[derive(Debug, Clone, Default)]
pub struct ExpenseUpdate {
    pub txn_date: Option<NaiveDate>,
    pub merchant_raw: Option<String>,
    pub amount_original: Option<f64>,
    pub currency_original: Option<String>,
    pub category: Option<Category>,
    pub notes: Option<String>,
    pub status: Option<ExpenseStatus>,
}

impl ExpenseUpdate {
    fn touches_conversion(&self) -> bool {
        self.txn_date.is_some() || self.amount_original.is_some() || self.currency_original.is_some()
    }
}

pub(crate) fn save_expense(conn: &Connection, e: &Expense) -> Result<()> {
    conn.execute(
        "UPDATE expenses SET txn_date = ?1, merchant_raw = ?2, merchant_normalized = ?3, \
         amount_original = ?4, currency_original = ?5, amount_base = ?6, currency_base = ?7, \
         fx_rate_used = ?8, fx_source = ?9, category = ?10, confidence = ?11, status = ?12, \
         notes = ?13 WHERE id = ?14",
        rusqlite::params![
            e.txn_date,
            e.merchant_raw,
            e.merchant_normalized,
            e.amount_original,
            e.currency_original,
            e.amount_base,
            e.currency_base,
            e.fx_rate_used,
            e.fx_source,
            e.category.map(|c| c.as_str()),
            e.confidence,
            e.status.as_str(),
            e.notes,
            e.id,
        ],
    )?;
    Ok(())
}

/// Apply a manual edit. When the edit changes the amount, currency or date
/// and all three are known, the base amount is recomputed; a missing rate
/// keeps the previous base amount.
pub fn update_expense<S: RateStore + ?Sized>(
    conn: &Connection,
    converter: &Converter<'_, S>,
    id: i64,
    update: &ExpenseUpdate,
) -> Result<Expense> {
    let tx = conn.unchecked_transaction()?;
    let mut expense = get_expense(&tx, id)?;

    if let Some(d) = update.txn_date {
        expense.txn_date = Some(d);
    }
    if let Some(m) = &update.merchant_raw {
        expense.merchant_raw = Some(m.clone());
        expense.merchant_normalized = normalize_merchant(m);
    }
    if let Some(a) = update.amount_original {
        expense.amount_original = Some(a);
    }
    if let Some(c) = &update.currency_original {
        expense.currency_original = Some(c.to_uppercase());
    }
    if let Some(c) = update.category {
        expense.category = Some(c);
    }
    if let Some(n) = &update.notes {
        expense.notes = Some(n.clone());
    }
    if let Some(s) = update.status {
        expense.status = s;
    }

    if update.touches_conversion() {
        if let (Some(amount), Some(currency), Some(date)) = (
            expense.amount_original,
            expense.currency_original.as_deref(),
            expense.txn_date,
        ) {
            match converter.convert_to_base(amount, currency, date)? {
                Some(c) => {
                    expense.amount_base = Some(c.amount_base);
                    expense.fx_rate_used = Some(c.fx_rate);
                    expense.fx_source = Some(c.fx_source);
                    expense.currency_base = converter.base_currency().to_string();
                }
                None => debug!(id, currency, %date, "no rate, keeping previous base amount"),
            }
        }
    }

    save_expense(&tx, &expense)?;
    tx.commit()?;
    info!(id, "updated expense");
    Ok(expense)
}

pub fn approve_expense(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute(
        "UPDATE expenses SET status = 'approved' WHERE id = ?1",
        [id],
    )?;
    if changed == 0 {
        return Err(ClerkError::UnknownExpense(id));
    }
    info!(id, "approved expense");
    Ok(())
}

fn compute_checksum(file_path: &Path) -> Result<String> {
    let data = std::fs::read(file_path)?;
    let mut hasher = Sha256::new();
    hasher.update(&data);
    Ok(hex::encode(hasher.finalize()))
}

fn attachment_from_row(row: &Row<'_>) -> rusqlite::Result<Attachment> {
    Ok(Attachment {
        id: row.get(0)?,
        expense_id: row.get(1)?,
        file_name: row.get(2)?,
        path: row.get(3)?,
        checksum: row.get(4)?,
    })
}

/// Copy a receipt into `receipts_dir/<expense_id>/` and record it. The same
/// file (by SHA-256) cannot be attached twice.
pub fn attach_receipt(
    conn: &Connection,
    expense_id: i64,
    source: &Path,
    receipts_dir: &Path,
) -> Result<Attachment> {
    get_expense(conn, expense_id)?;

    let checksum = compute_checksum(source)?;
    let existing: Option<i64> = conn
        .query_row(
            "SELECT expense_id FROM attachments WHERE checksum = ?1",
            [&checksum],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(owner) = existing {
        return Err(ClerkError::DuplicateAttachment(owner));
    }

    let file_name = source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| ClerkError::Other(format!("Not a file: {}", source.display())))?;
    let dest_dir = receipts_dir.join(expense_id.to_string());
    std::fs::create_dir_all(&dest_dir)?;
    let dest = dest_dir.join(&file_name);
    std::fs::copy(source, &dest)?;
    let path = dest.to_string_lossy().to_string();

    conn.execute(
        "INSERT INTO attachments (expense_id, file_name, path, checksum) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![expense_id, file_name, path, checksum],
    )?;
    info!(expense_id, %file_name, "attached receipt");
    Ok(Attachment {
        id: conn.last_insert_rowid(),
        expense_id,
        file_name,
        path,
        checksum,
    })
}

pub fn first_attachment(conn: &Connection, expense_id: i64) -> Result<Option<Attachment>> {
    let attachment = conn
        .query_row(
            "SELECT id, expense_id, file_name, path, checksum FROM attachments \
             WHERE expense_id = ?1 ORDER BY id LIMIT 1",
            [expense_id],
            attachment_from_row,
        )
        .optional()?;
    Ok(attachment)
}

pub fn export_csv(conn: &Connection, output: &Path) -> Result<usize> {
    let sql = format!("SELECT {EXPENSE_COLUMNS} FROM expenses ORDER BY txn_date, id");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], expense_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut writer = csv::Writer::from_path(output)?;
    for expense in &rows {
        writer.serialize(expense)?;
    }
    writer.flush()?;
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;
    use crate::fx::RateTable;
    use crate::models::FxRate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usd_table() -> RateTable {
        [FxRate {
            rate_date: date(2024, 1, 1),
            base: "USD".to_string(),
            quote: "SGD".to_string(),
            rate: 1.5,
            source: "manual".to_string(),
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_create_converts_when_complete() {
        let (_dir, conn) = test_db();
        let table = usd_table();
        let converter = Converter::new(&table, "SGD");
        let id = create_expense(
            &conn,
            &converter,
            &NewExpense {
                txn_date: Some(date(2024, 1, 2)),
                amount_original: Some(10.0),
                currency_original: Some("usd".to_string()),
                ..NewExpense::default()
            },
        )
        .unwrap();
        let e = get_expense(&conn, id).unwrap();
        assert_eq!(e.currency_original.as_deref(), Some("USD"));
        assert_eq!(e.amount_base, Some(15.0));
        assert_eq!(e.fx_source.as_deref(), Some("manual"));
        assert_eq!(e.currency_base, "SGD");
        assert_eq!(e.status, ExpenseStatus::Extracted);
    }

    #[test]
    fn test_create_without_rate_leaves_base_empty() {
        let (_dir, conn) = test_db();
        let table = RateTable::new();
        let converter = Converter::new(&table, "SGD");
        let id = create_expense(
            &conn,
            &converter,
            &NewExpense {
                txn_date: Some(date(2024, 1, 2)),
                amount_original: Some(10.0),
                currency_original: Some("EUR".to_string()),
                ..NewExpense::default()
            },
        )
        .unwrap();
        assert_eq!(get_expense(&conn, id).unwrap().amount_base, None);
    }

    #[test]
    fn test_manual_merchant_is_normalized() {
        let (_dir, conn) = test_db();
        let table = RateTable::new();
        let converter = Converter::new(&table, "SGD");
        let id = create_expense(
            &conn,
            &converter,
            &NewExpense {
                txn_date: Some(date(2024, 1, 2)),
                merchant_raw: Some("  Starbucks   Coffee Pte Ltd ".to_string()),
                amount_original: Some(10.0),
                currency_original: Some("SGD".to_string()),
                ..NewExpense::default()
            },
        )
        .unwrap();
        let e = get_expense(&conn, id).unwrap();
        assert_eq!(e.merchant_normalized.as_deref(), Some("Starbucks Coffee"));

        approve_expense(&conn, id).unwrap();
        let top = crate::analytics::top_merchants(&conn, None, None, 10).unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].merchant, "Starbucks Coffee");
        assert_eq!(top[0].total, 10.0);

        let e = update_expense(
            &conn,
            &converter,
            id,
            &ExpenseUpdate { merchant_raw: Some("Grab Holdings Inc.".to_string()), ..ExpenseUpdate::default() },
        )
        .unwrap();
        assert_eq!(e.merchant_normalized.as_deref(), Some("Grab Holdings"));
        assert_eq!(
            get_expense(&conn, id).unwrap().merchant_normalized.as_deref(),
            Some("Grab Holdings")
        );
    }

    #[test]
    fn test_unknown_expense() {
        let (_dir, conn) = test_db();
        assert!(matches!(get_expense(&conn, 42), Err(ClerkError::UnknownExpense(42))));
        assert!(matches!(approve_expense(&conn, 42), Err(ClerkError::UnknownExpense(42))));
    }

    #[test]
    fn test_edit_reconverts_only_on_relevant_change() {
        let (_dir, conn) = test_db();
        let table = usd_table();
        let converter = Converter::new(&table, "SGD");
        let id = create_expense(
            &conn,
            &converter,
            &NewExpense {
                txn_date: Some(date(2024, 1, 2)),
                amount_original: Some(10.0),
                currency_original: Some("USD".to_string()),
                ..NewExpense::default()
            },
        )
        .unwrap();

        // Tamper with the stored base amount; a notes-only edit must not touch it.
        conn.execute("UPDATE expenses SET amount_base = 1.0 WHERE id = ?1", [id]).unwrap();
        let e = update_expense(
            &conn,
            &converter,
            id,
            &ExpenseUpdate { notes: Some("team lunch".to_string()), ..ExpenseUpdate::default() },
        )
        .unwrap();
        assert_eq!(e.amount_base, Some(1.0));
        assert_eq!(e.notes.as_deref(), Some("team lunch"));

        let e = update_expense(
            &conn,
            &converter,
            id,
            &ExpenseUpdate { amount_original: Some(20.0), ..ExpenseUpdate::default() },
        )
        .unwrap();
        assert_eq!(e.amount_base, Some(30.0));
        assert_eq!(get_expense(&conn, id).unwrap().amount_base, Some(30.0));
    }

    #[test]
    fn test_edit_without_rate_keeps_previous_base() {
        let (_dir, conn) = test_db();
        let table = usd_table();
        let converter = Converter::new(&table, "SGD");
        let id = create_expense(
            &conn,
            &converter,
            &NewExpense {
                txn_date: Some(date(2024, 1, 2)),
                amount_original: Some(10.0),
                currency_original: Some("USD".to_string()),
                ..NewExpense::default()
            },
        )
        .unwrap();
        let e = update_expense(
            &conn,
            &converter,
            id,
            &ExpenseUpdate { currency_original: Some("GBP".to_string()), ..ExpenseUpdate::default() },
        )
        .unwrap();
        assert_eq!(e.currency_original.as_deref(), Some("GBP"));
        assert_eq!(e.amount_base, Some(15.0));
        assert_eq!(e.fx_source.as_deref(), Some("manual"));
    }

    #[test]
    fn test_list_filters_and_sorts() {
        let (_dir, conn) = test_db();
        let table = RateTable::new();
        let converter = Converter::new(&table, "SGD");
        for (day, merchant, amount, category) in [
            (1, "Blue Bottle Coffee", 8.0, Some(Category::Food)),
            (2, "Grab", 14.0, Some(Category::Transport)),
            (3, "Coffee Bean", 6.0, Some(Category::Food)),
        ] {
            create_expense(
                &conn,
                &converter,
                &NewExpense {
                    txn_date: Some(date(2024, 1, day)),
                    merchant_raw: Some(merchant.to_string()),
                    amount_original: Some(amount),
                    currency_original: Some("SGD".to_string()),
                    category,
                    ..NewExpense::default()
                },
            )
            .unwrap();
        }

        let all = list_expenses(&conn, &ExpenseFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].txn_date, Some(date(2024, 1, 3)));

        let coffee = list_expenses(
            &conn,
            &ExpenseFilter { merchant: Some("coffee".to_string()), ..ExpenseFilter::default() },
        )
        .unwrap();
        assert_eq!(coffee.len(), 2);

        let food_by_amount = list_expenses(
            &conn,
            &ExpenseFilter {
                category: Some(Category::Food),
                date_from: Some(date(2024, 1, 1)),
                date_to: Some(date(2024, 1, 31)),
                sort_by: SortField::AmountBase,
                descending: false,
                ..ExpenseFilter::default()
            },
        )
        .unwrap();
        let amounts: Vec<Option<f64>> = food_by_amount.iter().map(|e| e.amount_base).collect();
        assert_eq!(amounts, vec![Some(6.0), Some(8.0)]);

        let page = list_expenses(&conn, &ExpenseFilter { limit: 1, offset: 1, ..ExpenseFilter::default() })
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].txn_date, Some(date(2024, 1, 2)));
    }

    #[test]
    fn test_list_rejects_bad_limit() {
        let (_dir, conn) = test_db();
        for limit in [0, MAX_PAGE + 1] {
            let filter = ExpenseFilter { limit, ..ExpenseFilter::default() };
            assert!(list_expenses(&conn, &filter).is_err());
        }
    }

    #[test]
    fn test_attach_receipt_rejects_duplicates() {
        let (dir, conn) = test_db();
        let table = RateTable::new();
        let converter = Converter::new(&table, "SGD");
        let first = create_expense(&conn, &converter, &NewExpense::default()).unwrap();
        let second = create_expense(&conn, &converter, &NewExpense::default()).unwrap();

        let receipt = dir.path().join("cafe_12.50_sgd.pdf");
        std::fs::write(&receipt, b"%PDF-1.4 receipt").unwrap();
        let receipts_dir = dir.path().join("receipts");

        let attachment = attach_receipt(&conn, first, &receipt, &receipts_dir).unwrap();
        assert_eq!(attachment.file_name, "cafe_12.50_sgd.pdf");
        assert!(receipts_dir.join(first.to_string()).join("cafe_12.50_sgd.pdf").exists());
        assert_eq!(
            first_attachment(&conn, first).unwrap().unwrap().checksum,
            attachment.checksum
        );
        assert!(first_attachment(&conn, second).unwrap().is_none());

        let err = attach_receipt(&conn, second, &receipt, &receipts_dir).unwrap_err();
        assert!(matches!(err, ClerkError::DuplicateAttachment(id) if id == first));
    }

    #[test]
    fn test_export_csv() {
        let (dir, conn) = test_db();
        let table = RateTable::new();
        let converter = Converter::new(&table, "SGD");
        create_expense(
            &conn,
            &converter,
            &NewExpense { merchant_raw: Some("Cafe".to_string()), ..NewExpense::default() },
        )
        .unwrap();
        let out = dir.path().join("expenses.csv");
        assert_eq!(export_csv(&conn, &out).unwrap(), 1);
        let content = std::fs::read_to_string(&out).unwrap();
        assert!(content.starts_with("id,txn_date,merchant_raw"));
        assert!(content.contains("Cafe"));
    }
}
