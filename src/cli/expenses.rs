use std::path::{Path, PathBuf};

use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::cli::{open, parse_date_opt, ExpenseFields, ListArgs, SortOrder};
use crate::error::Result;
use crate::expenses::{
    approve_expense, attach_receipt, create_expense, export_csv, first_attachment, get_expense,
    list_expenses, update_expense, ExpenseFilter, ExpenseUpdate, NewExpense,
};
use crate::fmt::{money, opt_money};
use crate::fx::Converter;
use crate::models::{check_amount, parse_currency, Category, Expense, ExpenseStatus};
use crate::rates::SqliteRates;

fn status_label(status: ExpenseStatus) -> String {
    match status {
        ExpenseStatus::Approved => status.as_str().green().to_string(),
        ExpenseStatus::NeedsReview => status.as_str().yellow().to_string(),
        ExpenseStatus::Extracted => status.as_str().to_string(),
    }
}

struct ParsedFields {
    txn_date: Option<chrono::NaiveDate>,
    amount: Option<f64>,
    currency: Option<String>,
    category: Option<Category>,
}

fn parse_fields(fields: &ExpenseFields) -> Result<ParsedFields> {
    Ok(ParsedFields {
        txn_date: parse_date_opt(fields.date.as_deref())?,
        amount: fields.amount.map(check_amount).transpose()?,
        currency: fields.currency.as_deref().map(parse_currency).transpose()?,
        category: fields.category.as_deref().map(str::parse::<Category>).transpose()?,
    })
}

pub fn add(fields: ExpenseFields, file: Option<PathBuf>) -> Result<()> {
    let (settings, conn) = open()?;
    let store = SqliteRates::new(&conn);
    let converter = Converter::new(&store, &settings.base_currency());

    let parsed = parse_fields(&fields)?;
    let new = NewExpense {
        txn_date: parsed.txn_date,
        merchant_raw: fields.merchant,
        amount_original: parsed.amount,
        currency_original: parsed.currency,
        category: parsed.category,
        notes: fields.notes,
    };

    let tx = conn.unchecked_transaction()?;
    let id = create_expense(&tx, &converter, &new)?;
    if let Some(path) = file {
        let attachment = attach_receipt(&tx, id, &path, &settings.receipts_dir())?;
        println!("Attached {}", attachment.file_name);
    }
    tx.commit()?;

    println!("Added expense {id}");
    Ok(())
}

pub fn list(args: ListArgs) -> Result<()> {
    let (_settings, conn) = open()?;
    let filter = ExpenseFilter {
        date_from: parse_date_opt(args.from.as_deref())?,
        date_to: parse_date_opt(args.to.as_deref())?,
        category: args.category.as_deref().map(str::parse::<Category>).transpose()?,
        merchant: args.merchant,
        status: args.status.as_deref().map(str::parse::<ExpenseStatus>).transpose()?,
        limit: args.limit,
        offset: args.offset,
        sort_by: args.sort,
        descending: matches!(args.order, SortOrder::Desc),
    };
    let rows = list_expenses(&conn, &filter)?;

    if rows.is_empty() {
        println!("No expenses found.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Date", "Merchant", "Original", "Base", "Category", "Status"]);
    for e in &rows {
        table.add_row(vec![
            Cell::new(e.id),
            Cell::new(e.txn_date.map(|d| d.to_string()).unwrap_or_default()),
            Cell::new(merchant_label(e)),
            Cell::new(opt_money(e.amount_original, e.currency_original.as_deref())),
            Cell::new(opt_money(e.amount_base, Some(&e.currency_base))),
            Cell::new(e.category.map(|c| c.as_str()).unwrap_or("")),
            Cell::new(status_label(e.status)),
        ]);
    }
    println!("Expenses\n{table}");
    Ok(())
}

fn merchant_label(e: &Expense) -> &str {
    e.merchant_normalized
        .as_deref()
        .or(e.merchant_raw.as_deref())
        .unwrap_or("")
}

pub(crate) fn print_expense(e: &Expense) {
    let dash = "\u{2014}";
    println!("{}", format!("Expense {}", e.id).bold());
    println!("  Date:       {}", e.txn_date.map(|d| d.to_string()).unwrap_or_else(|| dash.to_string()));
    println!("  Merchant:   {}", e.merchant_raw.as_deref().unwrap_or(dash));
    println!("  Normalized: {}", e.merchant_normalized.as_deref().unwrap_or(dash));
    println!("  Original:   {}", opt_money(e.amount_original, e.currency_original.as_deref()));
    match e.amount_base {
        Some(base) => println!(
            "  Base:       {} (rate {}, {})",
            money(base, &e.currency_base),
            e.fx_rate_used.map(|r| format!("{r:.6}")).unwrap_or_else(|| dash.to_string()),
            e.fx_source.as_deref().unwrap_or(dash)
        ),
        None => println!("  Base:       {}", dash),
    }
    println!("  Category:   {}", e.category.map(|c| c.as_str()).unwrap_or(dash));
    println!(
        "  Confidence: {}",
        e.confidence.map(|c| format!("{c:.2}")).unwrap_or_else(|| dash.to_string())
    );
    println!("  Status:     {}", status_label(e.status));
    if let Some(notes) = &e.notes {
        println!("  Notes:      {notes}");
    }
}

pub fn show(id: i64) -> Result<()> {
    let (_settings, conn) = open()?;
    let expense = get_expense(&conn, id)?;
    print_expense(&expense);
    if let Some(a) = first_attachment(&conn, id)? {
        println!("  Receipt:    {}", a.path);
    }
    Ok(())
}

pub fn edit(id: i64, fields: ExpenseFields, status: Option<String>) -> Result<()> {
    let (settings, conn) = open()?;
    let store = SqliteRates::new(&conn);
    let converter = Converter::new(&store, &settings.base_currency());

    let parsed = parse_fields(&fields)?;
    let update = ExpenseUpdate {
        txn_date: parsed.txn_date,
        merchant_raw: fields.merchant,
        amount_original: parsed.amount,
        currency_original: parsed.currency,
        category: parsed.category,
        notes: fields.notes,
        status: status.as_deref().map(str::parse::<ExpenseStatus>).transpose()?,
    };
    let expense = update_expense(&conn, &converter, id, &update)?;
    print_expense(&expense);
    Ok(())
}

pub fn approve(id: i64) -> Result<()> {
    let (_settings, conn) = open()?;
    approve_expense(&conn, id)?;
    println!("Approved expense {id}");
    Ok(())
}

pub fn export(output: &Path) -> Result<()> {
    let (_settings, conn) = open()?;
    let count = export_csv(&conn, output)?;
    println!("Exported {count} expenses to {}", output.display());
    Ok(())
}
