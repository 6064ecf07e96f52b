use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::merchant::{needs_review, normalize_and_categorize, overall_confidence};
use crate::models::{ExtractionInput, ExtractionResult};

pub const MAX_AMOUNT: f64 = 1_000_000.0;

// (code, standalone keywords, symbols); first hit in this order wins.
const CURRENCY_TABLE: &[(&str, &[&str], &[&str])] = &[
    ("USD", &["usd", "dollar"], &["$"]),
    ("SGD", &["sgd", "singapore"], &[]),
    ("JPY", &["jpy", "yen"], &["¥"]),
    ("EUR", &["eur", "euro"], &["€"]),
    ("GBP", &["gbp", "pound"], &["£"]),
    ("AUD", &["aud"], &[]),
];

static CURRENCY_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    CURRENCY_TABLE
        .iter()
        .map(|(code, keywords, symbols)| {
            let words = keywords.join("|");
            let mut pattern = format!(r"(?i)(?:^|[^a-z0-9])(?:{words})(?:[^a-z0-9]|$)");
            for symbol in *symbols {
                pattern.push('|');
                pattern.push_str(&regex::escape(symbol));
            }
            (*code, Regex::new(&pattern).unwrap())
        })
        .collect()
});

static FILENAME_AMOUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+[.,][0-9]{2})|([0-9]+)").unwrap());

static TEXT_AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:USD|SGD|EUR|GBP|JPY|\$|€|£|¥)\s*([0-9]+[.,][0-9]{2})|([0-9]+[.,][0-9]{2})\s*(?:USD|SGD|EUR|GBP|JPY)?|total[:\s]+([0-9]+[.,][0-9]{2})",
    )
    .unwrap()
});

static TEXT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"([0-9]{4})-([0-9]{2})-([0-9]{2})|([0-9]{2})/([0-9]{2})/([0-9]{4})|([0-9]{2})-([0-9]{2})-([0-9]{4})",
    )
    .unwrap()
});

/// Fields recovered from a single source (filename or text).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Candidates {
    pub txn_date: Option<NaiveDate>,
    pub merchant_raw: Option<String>,
    pub amount_original: Option<f64>,
    pub currency_original: Option<String>,
}

pub fn infer_currency(haystack: &str) -> Option<&'static str> {
    CURRENCY_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(haystack))
        .map(|(code, _)| *code)
}

fn parse_bounded_amount(raw: &str) -> Option<f64> {
    let amount: f64 = raw.replacen(',', ".", 1).parse().ok()?;
    (amount > 0.0 && amount < MAX_AMOUNT).then_some(amount)
}

pub fn extract_from_filename(filename: &str) -> Candidates {
    let amount_original = FILENAME_AMOUNT
        .captures(filename)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)))
        .and_then(|m| parse_bounded_amount(m.as_str()));

    Candidates {
        amount_original,
        currency_original: infer_currency(filename).map(str::to_string),
        ..Candidates::default()
    }
}

fn extract_date(text: &str) -> Option<NaiveDate> {
    let caps = TEXT_DATE.captures(text)?;
    let group = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u32>().ok());
    let (year, month, day) = if caps.get(1).is_some() {
        (group(1)?, group(2)?, group(3)?)
    } else if caps.get(4).is_some() {
        (group(6)?, group(5)?, group(4)?)
    } else {
        (group(9)?, group(8)?, group(7)?)
    };
    NaiveDate::from_ymd_opt(year as i32, month, day)
}

// Receipts usually open with the merchant's name.
fn extract_merchant(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .find(|line| {
            !line.is_empty()
                && line.chars().any(char::is_alphabetic)
                && !line.chars().any(|c| c.is_ascii_digit())
                && !line.to_lowercase().starts_with("total")
        })
        .map(str::to_string)
}

pub fn extract_from_text(text: &str) -> Candidates {
    let amount_original = TEXT_AMOUNT
        .captures(text)
        .and_then(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .and_then(|m| parse_bounded_amount(m.as_str()));

    Candidates {
        txn_date: extract_date(text),
        merchant_raw: extract_merchant(text),
        amount_original,
        currency_original: infer_currency(text).map(str::to_string),
    }
}

fn strip_extension(filename: &str) -> &str {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() => &filename[..idx],
        _ => filename,
    }
}

/// Run the rule-based extractor over a filename and optional receipt text.
/// Text-derived values take priority over filename-derived ones.
pub fn extract(input: &ExtractionInput) -> ExtractionResult {
    let from_file = extract_from_filename(&input.filename);
    let from_text = input
        .text
        .as_deref()
        .filter(|t| !t.is_empty())
        .map(extract_from_text)
        .unwrap_or_default();

    let txn_date = from_text.txn_date.or(from_file.txn_date);
    let merchant_raw = from_text.merchant_raw.or(from_file.merchant_raw);
    let amount_original = from_text.amount_original.or(from_file.amount_original);
    let currency_original = from_text.currency_original.or(from_file.currency_original);

    let profile = normalize_and_categorize(
        merchant_raw
            .as_deref()
            .unwrap_or_else(|| strip_extension(&input.filename)),
    );

    let (has_amount, has_currency, has_date) = (
        amount_original.is_some(),
        currency_original.is_some(),
        txn_date.is_some(),
    );
    let confidence = overall_confidence(has_amount, has_currency, has_date, profile.confidence);

    ExtractionResult {
        txn_date,
        merchant_raw,
        merchant_normalized: profile.normalized,
        amount_original,
        currency_original,
        category: profile.category,
        confidence,
        needs_review: needs_review(has_amount, has_currency, has_date, confidence),
    }
}
