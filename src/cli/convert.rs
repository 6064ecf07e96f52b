use chrono::Local;

use crate::cli::{open, parse_date_opt};
use crate::error::Result;
use crate::fmt::money;
use crate::fx::Converter;
use crate::models::parse_currency;
use crate::rates::SqliteRates;

pub fn run(amount: f64, currency: &str, date: Option<&str>) -> Result<()> {
    let currency = parse_currency(currency)?;
    let as_of = parse_date_opt(date)?.unwrap_or_else(|| Local::now().date_naive());

    let (settings, conn) = open()?;
    let store = SqliteRates::new(&conn);
    let converter = Converter::new(&store, &settings.base_currency());

    match converter.convert_to_base(amount, &currency, as_of)? {
        Some(c) => println!(
            "{} = {} (rate {:.6} from {}, {})",
            money(amount, &currency),
            money(c.amount_base, converter.base_currency()),
            c.fx_rate,
            c.rate_date,
            c.fx_source
        ),
        None => println!(
            "No {currency}/{} rate on or before {as_of}.",
            converter.base_currency()
        ),
    }
    Ok(())
}
