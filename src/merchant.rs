use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Category, MerchantProfile};

pub const MAX_MERCHANT_LEN: usize = 200;

pub const MATCH_CONFIDENCE: f64 = 0.7;
pub const MISS_CONFIDENCE: f64 = 0.3;

static LEGAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:pte|ltd|inc|llc|co)\b\.?").unwrap());

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

// Tried in order; the first category with any keyword hit wins.
const CATEGORY_KEYWORDS: &[(Category, &[&str])] = &[
    (
        Category::Food,
        &["restaurant", "cafe", "coffee", "food", "grocery", "supermarket", "dining", "meal"],
    ),
    (
        Category::Transport,
        &["uber", "grab", "taxi", "petrol", "gas", "parking", "transit", "bus", "train"],
    ),
    (Category::Shopping, &["amazon", "shop", "store", "retail", "mall"]),
    (Category::Utilities, &["electric", "water", "internet", "phone", "utility"]),
    (Category::Healthcare, &["pharmacy", "clinic", "hospital", "medical", "health"]),
    (Category::Entertainment, &["movie", "netflix", "spotify", "game", "entertainment"]),
];

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn clean(s: &str) -> String {
    let collapsed = collapse(s);
    collapse(&LEGAL_SUFFIX.replace_all(&collapsed, ""))
}

/// Trim, collapse whitespace, drop legal-entity suffixes and cap the length.
/// Returns `None` when nothing is left.
pub fn normalize_merchant(raw: &str) -> Option<String> {
    let cleaned = clean(raw);
    let truncated: String = cleaned.chars().take(MAX_MERCHANT_LEN).collect();
    // Cutting mid-word can expose a suffix or a trailing space.
    let normalized = if truncated.len() < cleaned.len() {
        clean(&truncated)
    } else {
        truncated
    };
    (!normalized.is_empty()).then_some(normalized)
}

/// Keyword categorization of an already-normalized merchant name.
pub fn categorize(merchant: Option<&str>) -> (Option<Category>, f64) {
    let Some(merchant) = merchant else {
        return (None, 0.0);
    };
    let lower = merchant.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(category, _)| (Some(*category), MATCH_CONFIDENCE))
        .unwrap_or((None, MISS_CONFIDENCE))
}

pub fn normalize_and_categorize(raw: &str) -> MerchantProfile {
    let normalized = normalize_merchant(raw);
    let (category, confidence) = categorize(normalized.as_deref());
    MerchantProfile {
        normalized,
        category,
        confidence,
    }
}

pub fn overall_confidence(
    has_amount: bool,
    has_currency: bool,
    has_date: bool,
    category_confidence: f64,
) -> f64 {
    let mut confidence = 0.5;
    if has_amount {
        confidence += 0.2;
    }
    if has_currency {
        confidence += 0.15;
    }
    if has_date {
        confidence += 0.1;
    }
    f64::max(confidence, category_confidence).min(1.0)
}

pub fn needs_review(has_amount: bool, has_currency: bool, has_date: bool, confidence: f64) -> bool {
    !has_amount || !has_currency || !has_date || confidence < 0.5
}
