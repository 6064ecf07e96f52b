use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::ClerkError;

/// Coarse spending category. Declaration order is the categorization
/// tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Category {
    Food,
    Transport,
    Shopping,
    Utilities,
    Healthcare,
    Entertainment,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Food,
        Category::Transport,
        Category::Shopping,
        Category::Utilities,
        Category::Healthcare,
        Category::Entertainment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Food",
            Self::Transport => "Transport",
            Self::Shopping => "Shopping",
            Self::Utilities => "Utilities",
            Self::Healthcare => "Healthcare",
            Self::Entertainment => "Entertainment",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ClerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .copied()
            .ok_or_else(|| ClerkError::UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionInput {
    pub filename: String,
    pub text: Option<String>,
}

impl ExtractionInput {
    pub fn new(filename: impl Into<String>, text: Option<impl Into<String>>) -> Self {
        Self {
            filename: filename.into(),
            text: text.map(Into::into),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionResult {
    pub txn_date: Option<NaiveDate>,
    pub merchant_raw: Option<String>,
    pub merchant_normalized: Option<String>,
    pub amount_original: Option<f64>,
    pub currency_original: Option<String>,
    pub category: Option<Category>,
    pub confidence: f64,
    pub needs_review: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantProfile {
    pub normalized: Option<String>,
    pub category: Option<Category>,
    pub confidence: f64,
}

/// One row of the rate table: `1 base = rate quote` on `rate_date`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FxRate {
    pub rate_date: NaiveDate,
    pub base: String,
    pub quote: String,
    pub rate: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub amount_base: f64,
    pub fx_rate: f64,
    pub fx_source: String,
    pub rate_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub month: String,
    pub total: f64,
}

impl MonthlyTotal {
    pub fn new(month: impl Into<String>, total: f64) -> Self {
        Self {
            month: month.into(),
            total,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub month: String,
    pub amount: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpenseStatus {
    Extracted,
    NeedsReview,
    Approved,
}

impl ExpenseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extracted => "extracted",
            Self::NeedsReview => "needs_review",
            Self::Approved => "approved",
        }
    }
}

impl FromStr for ExpenseStatus {
    type Err = ClerkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "extracted" => Ok(Self::Extracted),
            "needs_review" => Ok(Self::NeedsReview),
            "approved" => Ok(Self::Approved),
            other => Err(ClerkError::Other(format!("Unknown status: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Expense {
    pub id: i64,
    pub txn_date: Option<NaiveDate>,
    pub merchant_raw: Option<String>,
    pub merchant_normalized: Option<String>,
    pub amount_original: Option<f64>,
    pub currency_original: Option<String>,
    pub amount_base: Option<f64>,
    pub currency_base: String,
    pub fx_rate_used: Option<f64>,
    pub fx_source: Option<String>,
    pub category: Option<Category>,
    pub confidence: Option<f64>,
    pub status: ExpenseStatus,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub expense_id: i64,
    pub file_name: String,
    pub path: String,
    pub checksum: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrencyTotal {
    pub currency: String,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MerchantTotal {
    pub merchant: String,
    pub total: f64,
}

pub fn parse_date(raw: &str) -> crate::error::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ClerkError::InvalidDate(raw.to_string()))
}

pub fn parse_currency(raw: &str) -> crate::error::Result<String> {
    let code = raw.trim().to_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(ClerkError::InvalidCurrency(raw.to_string()))
    }
}

/// Amounts are positive and finite.
pub fn check_amount(amount: f64) -> crate::error::Result<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(ClerkError::InvalidAmount(amount.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_parses_case_insensitively() {
        assert_eq!("food".parse::<Category>().unwrap(), Category::Food);
        assert_eq!(" Healthcare ".parse::<Category>().unwrap(), Category::Healthcare);
        assert!(matches!(
            "Groceries".parse::<Category>(),
            Err(ClerkError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_status_roundtrips_through_str() {
        for status in [ExpenseStatus::Extracted, ExpenseStatus::NeedsReview, ExpenseStatus::Approved] {
            assert_eq!(status.as_str().parse::<ExpenseStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_parse_currency() {
        assert_eq!(parse_currency("usd").unwrap(), "USD");
        assert!(parse_currency("US").is_err());
        assert!(parse_currency("U5D").is_err());
    }

    #[test]
    fn test_check_amount() {
        assert_eq!(check_amount(12.5).unwrap(), 12.5);
        assert!(matches!(check_amount(0.0), Err(ClerkError::InvalidAmount(_))));
        assert!(check_amount(-3.0).is_err());
        assert!(check_amount(f64::NAN).is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-02-29").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
        assert!(matches!(parse_date("29/02/2024"), Err(ClerkError::InvalidDate(_))));
    }
}
