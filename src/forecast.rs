use chrono::{Datelike, Months, NaiveDate};

use crate::fx::round_cents;
use crate::models::{ForecastPoint, MonthlyTotal};

pub const HORIZON: u32 = 3;
const WINDOW: usize = 3;
const MIN_BAND_RATIO: f64 = 0.2;

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std_dev(values: &[f64], avg: f64) -> f64 {
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Flat three-month projection from a moving average of the last three
/// months, with a band of at least 20% of the average.
pub fn forecast(monthly_totals: &[MonthlyTotal], today: NaiveDate) -> Vec<ForecastPoint> {
    let mut sorted: Vec<&MonthlyTotal> = monthly_totals.iter().collect();
    sorted.sort_by(|a, b| a.month.cmp(&b.month));
    let values: Vec<f64> = sorted.iter().map(|m| m.total).collect();

    let (avg, dispersion) = match values.len() {
        0 => (0.0, 0.0),
        n if n >= WINDOW => {
            let recent = &values[n - WINDOW..];
            let avg = mean(recent);
            let std = population_std_dev(recent, avg);
            (avg, if std == 0.0 { avg * MIN_BAND_RATIO } else { std })
        }
        _ => {
            let avg = mean(&values);
            (avg, avg * MIN_BAND_RATIO)
        }
    };
    let band = f64::max(avg * MIN_BAND_RATIO, dispersion);

    let first_of_month = today.with_day(1).unwrap_or(today);
    (1..=HORIZON)
        .filter_map(|offset| first_of_month.checked_add_months(Months::new(offset)))
        .map(|month| ForecastPoint {
            month: month.format("%Y-%m").to_string(),
            amount: round_cents(avg),
            lower: round_cents(avg - band),
            upper: round_cents(avg + band),
        })
        .collect()
}
