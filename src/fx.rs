use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::Rng;

use crate::error::Result;
use crate::models::{Conversion, FxRate};

pub const IDENTITY_SOURCE: &str = "identity";
pub const STUB_SOURCE: &str = "stub";

/// Units of SGD per unit of each currency, used to seed stub rates.
const STUB_REFERENCE_SGD: &[(&str, f64)] = &[
    ("SGD", 1.0),
    ("USD", 1.35),
    ("EUR", 1.46),
    ("GBP", 1.69),
    ("JPY", 0.0091),
    ("AUD", 0.88),
];

/// Read-only access to a date-indexed rate table. `base` is the currency
/// being converted from, `quote` the one converted to.
pub trait RateStore {
    fn rate_on(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>>;

    /// Most recent rate strictly before `date`.
    fn latest_before(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>>;
}

/// In-memory rate table. Holds at most one rate per pair and date.
#[derive(Debug, Default, Clone)]
pub struct RateTable {
    rates: BTreeMap<(String, String), BTreeMap<NaiveDate, FxRate>>,
}

impl RateTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rate: FxRate) {
        let key = (rate.base.to_uppercase(), rate.quote.to_uppercase());
        self.rates.entry(key).or_default().insert(rate.rate_date, rate);
    }

    fn pair(&self, base: &str, quote: &str) -> Option<&BTreeMap<NaiveDate, FxRate>> {
        self.rates.get(&(base.to_uppercase(), quote.to_uppercase()))
    }
}

impl FromIterator<FxRate> for RateTable {
    fn from_iter<I: IntoIterator<Item = FxRate>>(iter: I) -> Self {
        let mut table = Self::new();
        for rate in iter {
            table.insert(rate);
        }
        table
    }
}

impl RateStore for RateTable {
    fn rate_on(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>> {
        Ok(self.pair(base, quote).and_then(|by_date| by_date.get(&date)).cloned())
    }

    fn latest_before(&self, date: NaiveDate, base: &str, quote: &str) -> Result<Option<FxRate>> {
        Ok(self
            .pair(base, quote)
            .and_then(|by_date| by_date.range(..date).next_back())
            .map(|(_, rate)| rate.clone()))
    }
}

/// Round to cents, half away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub struct Converter<'a, S: RateStore + ?Sized> {
    store: &'a S,
    base_currency: String,
}

impl<'a, S: RateStore + ?Sized> Converter<'a, S> {
    pub fn new(store: &'a S, base_currency: &str) -> Self {
        Self {
            store,
            base_currency: base_currency.to_uppercase(),
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Convert into the base currency. `Ok(None)` means no rate exists on or
    /// before `as_of`; callers must not invent one.
    pub fn convert_to_base(
        &self,
        amount: f64,
        from_currency: &str,
        as_of: NaiveDate,
    ) -> Result<Option<Conversion>> {
        let from = from_currency.to_uppercase();
        if from == self.base_currency {
            return Ok(Some(Conversion {
                amount_base: amount,
                fx_rate: 1.0,
                fx_source: IDENTITY_SOURCE.to_string(),
                rate_date: as_of,
            }));
        }

        let found = match self.store.rate_on(as_of, &from, &self.base_currency)? {
            Some(rate) => Some(rate),
            None => self.store.latest_before(as_of, &from, &self.base_currency)?,
        };

        Ok(found.map(|fx| Conversion {
            amount_base: round_cents(amount * fx.rate),
            fx_rate: fx.rate,
            fx_source: fx.source,
            rate_date: fx.rate_date,
        }))
    }
}

/// Placeholder rates for the last `days` days ending at `today`, one row per
/// supported currency into `base`. Each rate is jittered by up to ±0.2%.
pub fn stub_rates<R: Rng + ?Sized>(
    base: &str,
    today: NaiveDate,
    days: u32,
    rng: &mut R,
) -> Vec<FxRate> {
    let base = base.to_uppercase();
    let Some(base_in_sgd) = STUB_REFERENCE_SGD
        .iter()
        .find(|(code, _)| *code == base)
        .map(|(_, rate)| *rate)
    else {
        return Vec::new();
    };

    let mut rates = Vec::new();
    for offset in 0..days {
        let rate_date = today - Duration::days(i64::from(offset));
        for (code, in_sgd) in STUB_REFERENCE_SGD {
            if *code == base {
                continue;
            }
            let jitter = 0.998 + rng.gen::<f64>() * 0.004;
            rates.push(FxRate {
                rate_date,
                base: code.to_string(),
                quote: base.clone(),
                rate: in_sgd / base_in_sgd * jitter,
                source: STUB_SOURCE.to_string(),
            });
        }
    }
    rates
}
