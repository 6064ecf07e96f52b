use chrono::Local;
use comfy_table::{Cell, Table};

use crate::cli::open;
use crate::error::{ClerkError, Result};
use crate::fx::stub_rates;
use crate::models::{parse_currency, parse_date, FxRate};
use crate::rates::{list_rates, upsert_rates};

pub fn add(date: &str, currency: &str, rate: f64, source: &str) -> Result<()> {
    let rate_date = parse_date(date)?;
    let from = parse_currency(currency)?;
    if !(rate.is_finite() && rate > 0.0) {
        return Err(ClerkError::Other(format!("Rate must be positive: {rate}")));
    }

    let (settings, conn) = open()?;
    let quote = settings.base_currency();
    upsert_rates(
        &conn,
        &[FxRate {
            rate_date,
            base: from.clone(),
            quote: quote.clone(),
            rate,
            source: source.to_string(),
        }],
    )?;
    println!("Recorded 1 {from} = {rate} {quote} on {rate_date} ({source})");
    Ok(())
}

pub fn list(currency: Option<&str>, limit: usize) -> Result<()> {
    let currency = currency.map(parse_currency).transpose()?;
    let (_settings, conn) = open()?;
    let rows = list_rates(&conn, currency.as_deref(), limit)?;

    if rows.is_empty() {
        println!("No rates stored. Run `clerk rates sync` or `clerk rates add`.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "From", "To", "Rate", "Source"]);
    for r in rows {
        table.add_row(vec![
            Cell::new(r.rate_date),
            Cell::new(r.base),
            Cell::new(r.quote),
            Cell::new(format!("{:.6}", r.rate)),
            Cell::new(r.source),
        ]);
    }
    println!("FX rates\n{table}");
    Ok(())
}

fn check_days(days: u32) -> Result<()> {
    if days == 0 {
        return Err(ClerkError::Other("--days must be at least 1".to_string()));
    }
    Ok(())
}

pub fn sync(days: u32) -> Result<()> {
    check_days(days)?;
    let (settings, conn) = open()?;
    let base = settings.base_currency();
    let rates = stub_rates(&base, Local::now().date_naive(), days, &mut rand::thread_rng());
    if rates.is_empty() {
        println!("No stub rates available for base currency {base}.");
        return Ok(());
    }
    let count = upsert_rates(&conn, &rates)?;
    println!("Synced {count} stub rates into {base} over {days} days");
    Ok(())
}
