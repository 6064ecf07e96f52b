/// Format an amount with its currency code and thousands separators:
/// `SGD 1,234.56`.
pub fn money(val: f64, currency: &str) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let cents = format!("{:.2}", abs);
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((cents.as_str(), "00"));

    let mut with_commas = String::new();
    for (i, c) in int_part.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            with_commas.push(',');
        }
        with_commas.push(c);
    }
    let with_commas: String = with_commas.chars().rev().collect();

    let sign = if negative { "-" } else { "" };
    format!("{currency} {sign}{with_commas}.{dec_part}")
}

pub fn opt_money(val: Option<f64>, currency: Option<&str>) -> String {
    match val {
        Some(v) => money(v, currency.unwrap_or("???")),
        None => "\u{2014}".to_string(),
    }
}
