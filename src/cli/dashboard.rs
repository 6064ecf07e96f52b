use chrono::Local;
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::analytics::dashboard;
use crate::cli::{open, parse_date_opt};
use crate::error::Result;
use crate::fmt::money;

fn totals_table(header: &str, rows: impl IntoIterator<Item = (String, f64)>, currency: &str) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header, "Total"]);
    for (label, total) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(money(total, currency))]);
    }
    table
}

pub fn run(from: Option<&str>, to: Option<&str>, json: bool) -> Result<()> {
    let from = parse_date_opt(from)?;
    let to = parse_date_opt(to)?;
    let (settings, conn) = open()?;
    let data = dashboard(&conn, Local::now().date_naive(), from, to)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    let base = settings.base_currency();
    if data.monthly.is_empty() && data.by_category.is_empty() {
        println!("No approved expenses yet.");
        return Ok(());
    }

    println!("{}", "Monthly spend (last 12 months)".bold());
    println!(
        "{}\n",
        totals_table("Month", data.monthly.into_iter().map(|m| (m.month, m.total)), &base)
    );
    println!("{}", "By category".bold());
    println!(
        "{}\n",
        totals_table(
            "Category",
            data.by_category.into_iter().map(|c| (c.category, c.total)),
            &base
        )
    );
    println!("{}", "By original currency".bold());
    println!(
        "{}\n",
        totals_table(
            "Currency",
            data.by_currency.into_iter().map(|c| (c.currency, c.total)),
            &base
        )
    );
    println!("{}", "Top merchants".bold());
    println!(
        "{}",
        totals_table(
            "Merchant",
            data.top_merchants.into_iter().map(|m| (m.merchant, m.total)),
            &base
        )
    );
    Ok(())
}
