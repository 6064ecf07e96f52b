use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;

use crate::error::Result;
use crate::fx::RateStore;
use crate::models::FxRate;

const RATE_COLUMNS: &str = "rate_date, base, quote, rate, source";

fn rate_from_row(row: &Row<'_>) -> rusqlite::Result<FxRate> {
    Ok(FxRate {
        rate_date: row.get(0)?,
        base: row.get(1)?,
        quote: row.get(2)?,
        rate: row.get(3)?,
        source: row.get(4)?,
    })
}

/// `RateStore` over the `fx_rates` table.
pub struct SqliteRates<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRates<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl RateStore for SqliteRates<'_> {
    fn rate_on(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>> {
        debug!(%date, base, quote, "exact rate lookup");
        let sql = format!(
            "SELECT {RATE_COLUMNS} FROM fx_rates \
             WHERE rate_date = ?1 AND base = ?2 AND quote = ?3 \
             ORDER BY source LIMIT 1"
        );
        let rate = self
            .conn
            .query_row(&sql, rusqlite::params![date, base, quote], rate_from_row)
            .optional()?;
        Ok(rate)
    }

    fn latest_before(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>> {
        debug!(%date, base, quote, "prior rate lookup");
        let sql = format!(
            "SELECT {RATE_COLUMNS} FROM fx_rates \
             WHERE base = ?1 AND quote = ?2 AND rate_date < ?3 \
             ORDER BY rate_date DESC, source LIMIT 1"
        );
        let rate = self
            .conn
            .query_row(&sql, rusqlite::params![base, quote, date], rate_from_row)
            .optional()?;
        Ok(rate)
    }
}

/// Insert or replace rates keyed on `(rate_date, base, quote, source)`.
pub fn upsert_rates(conn: &Connection, rates: &[FxRate]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO fx_rates (rate_date, base, quote, rate, source) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT (rate_date, base, quote, source) DO UPDATE SET rate = excluded.rate",
        )?;
        for r in rates {
            stmt.execute(rusqlite::params![
                r.rate_date,
                r.base.to_uppercase(),
                r.quote.to_uppercase(),
                r.rate,
                r.source
            ])?;
        }
    }
    tx.commit()?;
    Ok(rates.len())
}

pub fn list_rates(conn: &Connection, currency: Option<&str>, limit: usize) -> Result<Vec<FxRate>> {
    let sql = format!(
        "SELECT {RATE_COLUMNS} FROM fx_rates \
         WHERE (?1 IS NULL OR base = ?1 OR quote = ?1) \
         ORDER BY rate_date DESC, base, quote, source LIMIT ?2"
    );
    let currency = currency.map(str::to_uppercase);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![currency, limit as i64], rate_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
