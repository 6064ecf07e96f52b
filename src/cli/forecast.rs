use chrono::Local;
use colored::Colorize;
use comfy_table::{Cell, Table};
use serde::Serialize;

use crate::analytics::{monthly_totals, DEFAULT_MONTHS_BACK};
use crate::cli::open;
use crate::error::Result;
use crate::fmt::money;
use crate::forecast::forecast;
use crate::models::{ForecastPoint, MonthlyTotal};

#[derive(Serialize)]
struct ForecastReport {
    currency: String,
    history: Vec<MonthlyTotal>,
    forecast: Vec<ForecastPoint>,
}

pub fn run(json: bool) -> Result<()> {
    let (settings, conn) = open()?;
    let today = Local::now().date_naive();
    let history = monthly_totals(&conn, today, DEFAULT_MONTHS_BACK)?;
    let points = forecast(&history, today);
    let currency = settings.base_currency();

    if json {
        let report = ForecastReport {
            currency,
            history,
            forecast: points,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Month", "Amount", "Lower", "Upper"]);
    for m in &history {
        table.add_row(vec![
            Cell::new(&m.month),
            Cell::new(money(m.total, &currency)),
            Cell::new(""),
            Cell::new(""),
        ]);
    }
    for p in &points {
        table.add_row(vec![
            Cell::new(format!("{} (forecast)", p.month).cyan()),
            Cell::new(money(p.amount, &currency).bold()),
            Cell::new(money(p.lower, &currency)),
            Cell::new(money(p.upper, &currency)),
        ]);
    }
    println!("Spend forecast\n{table}");
    Ok(())
}
