use chrono::{Months, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::error::Result;
use crate::models::{CategoryTotal, CurrencyTotal, MerchantTotal, MonthlyTotal};

pub const DEFAULT_MONTHS_BACK: u32 = 12;
pub const TOP_MERCHANTS: usize = 10;

// Only approved expenses with a base amount count towards any total.
const APPROVED: &str = "status = 'approved' AND amount_base IS NOT NULL";

// ---------------------------------------------------------------------------
// Date filter helper
// ---------------------------------------------------------------------------

fn date_filter(from: Option<NaiveDate>, to: Option<NaiveDate>) -> (String, Vec<String>) {
    match (from, to) {
        (Some(f), Some(t)) => (
            " AND txn_date BETWEEN ?1 AND ?2".to_string(),
            vec![f.to_string(), t.to_string()],
        ),
        (Some(f), None) => (" AND txn_date >= ?1".to_string(), vec![f.to_string()]),
        (None, Some(t)) => (" AND txn_date <= ?1".to_string(), vec![t.to_string()]),
        (None, None) => (String::new(), Vec::new()),
    }
}

fn grouped_totals(
    conn: &Connection,
    key_expr: &str,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: Option<usize>,
) -> Result<Vec<(String, f64)>> {
    let (clause, params) = date_filter(from, to);
    let limit = limit.map(|n| format!(" LIMIT {n}")).unwrap_or_default();
    let sql = format!(
        "SELECT {key_expr} AS grp, SUM(amount_base) AS total FROM expenses \
         WHERE {APPROVED}{clause} GROUP BY grp ORDER BY total DESC, grp{limit}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            Ok((row.get(0)?, row.get(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Monthly totals
// ---------------------------------------------------------------------------

/// Approved base-currency spend per calendar month, oldest first, over the
/// `months_back` months up to `today`.
pub fn monthly_totals(conn: &Connection, today: NaiveDate, months_back: u32) -> Result<Vec<MonthlyTotal>> {
    let start = today
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(NaiveDate::MIN);
    let sql = format!(
        "SELECT substr(txn_date, 1, 7) AS month, SUM(amount_base) AS total FROM expenses \
         WHERE {APPROVED} AND txn_date IS NOT NULL AND txn_date >= ?1 \
         GROUP BY month ORDER BY month"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([start.to_string()], |row| {
            Ok(MonthlyTotal {
                month: row.get(0)?,
                total: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Breakdowns
// ---------------------------------------------------------------------------

pub fn category_totals(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<CategoryTotal>> {
    Ok(grouped_totals(conn, "COALESCE(category, 'Uncategorized')", from, to, None)?
        .into_iter()
        .map(|(category, total)| CategoryTotal { category, total })
        .collect())
}

pub fn currency_totals(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Vec<CurrencyTotal>> {
    Ok(grouped_totals(conn, "COALESCE(currency_original, 'Unknown')", from, to, None)?
        .into_iter()
        .map(|(currency, total)| CurrencyTotal { currency, total })
        .collect())
}

pub fn top_merchants(
    conn: &Connection,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
    limit: usize,
) -> Result<Vec<MerchantTotal>> {
    Ok(
        grouped_totals(conn, "COALESCE(merchant_normalized, 'Unknown')", from, to, Some(limit))?
            .into_iter()
            .map(|(merchant, total)| MerchantTotal { merchant, total })
            .collect(),
    )
}

// ---------------------------------------------------------------------------
// Dashboard
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Dashboard {
    pub monthly: Vec<MonthlyTotal>,
    pub by_category: Vec<CategoryTotal>,
    pub by_currency: Vec<CurrencyTotal>,
    pub top_merchants: Vec<MerchantTotal>,
}

pub fn dashboard(
    conn: &Connection,
    today: NaiveDate,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Result<Dashboard> {
    Ok(Dashboard {
        monthly: monthly_totals(conn, today, DEFAULT_MONTHS_BACK)?,
        by_category: category_totals(conn, from, to)?,
        by_currency: currency_totals(conn, from, to)?,
        top_merchants: top_merchants(conn, from, to, TOP_MERCHANTS)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_db;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn insert(
        conn: &Connection,
        txn_date: Option<&str>,
        amount_base: Option<f64>,
        status: &str,
        category: Option<&str>,
        currency: Option<&str>,
        merchant: Option<&str>,
    ) {
        conn.execute(
            "INSERT INTO expenses (txn_date, amount_base, currency_base, status, category, currency_original, merchant_normalized) \
             VALUES (?1, ?2, 'SGD', ?3, ?4, ?5, ?6)",
            rusqlite::params![txn_date, amount_base, status, category, currency, merchant],
        )
        .unwrap();
    }

    fn seed(conn: &Connection) {
        insert(conn, Some("2024-01-05"), Some(100.0), "approved", Some("Food"), Some("SGD"), Some("Cafe"));
        insert(conn, Some("2024-01-20"), Some(50.0), "approved", None, Some("USD"), Some("Grab"));
        insert(conn, Some("2024-02-10"), Some(30.0), "approved", Some("Food"), None, None);
        // excluded: not approved, no base amount, outside the window
        insert(conn, Some("2024-02-11"), Some(999.0), "needs_review", Some("Food"), Some("SGD"), Some("Cafe"));
        insert(conn, Some("2024-02-12"), None, "approved", Some("Food"), Some("EUR"), Some("Cafe"));
        insert(conn, Some("2022-12-31"), Some(500.0), "approved", Some("Shopping"), Some("SGD"), Some("Mall"));
    }

    #[test]
    fn test_monthly_totals_window_and_status() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let totals = monthly_totals(&conn, date(2024, 3, 1), 12).unwrap();
        assert_eq!(
            totals,
            vec![MonthlyTotal::new("2024-01", 150.0), MonthlyTotal::new("2024-02", 30.0)]
        );
    }

    #[test]
    fn test_monthly_totals_empty() {
        let (_dir, conn) = test_db();
        assert!(monthly_totals(&conn, date(2024, 3, 1), 12).unwrap().is_empty());
    }

    #[test]
    fn test_category_totals_sorted_desc_with_uncategorized() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let totals = category_totals(&conn, Some(date(2024, 1, 1)), None).unwrap();
        assert_eq!(
            totals,
            vec![
                CategoryTotal { category: "Food".to_string(), total: 130.0 },
                CategoryTotal { category: "Uncategorized".to_string(), total: 50.0 },
            ]
        );
    }

    #[test]
    fn test_currency_totals_and_date_range() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let totals = currency_totals(&conn, Some(date(2024, 1, 1)), Some(date(2024, 1, 31))).unwrap();
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].currency, "SGD");
        assert_eq!(totals[1].currency, "USD");
        let all = currency_totals(&conn, None, None).unwrap();
        assert_eq!(all[0], CurrencyTotal { currency: "SGD".to_string(), total: 600.0 });
        assert!(all.iter().any(|c| c.currency == "Unknown"));
    }

    #[test]
    fn test_top_merchants_limit() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let top = top_merchants(&conn, None, Some(date(2024, 12, 31)), 2).unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].merchant, "Mall");
        assert_eq!(top[1].merchant, "Cafe");
    }

    #[test]
    fn test_dashboard_collects_all_sections() {
        let (_dir, conn) = test_db();
        seed(&conn);
        let d = dashboard(&conn, date(2024, 3, 1), None, None).unwrap();
        assert_eq!(d.monthly.len(), 2);
        assert_eq!(d.by_category[0].category, "Shopping");
        assert!(!d.by_currency.is_empty());
        assert!(d.top_merchants.len() <= TOP_MERCHANTS);
    }
}
