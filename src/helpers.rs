use chrono::{DateTime, NaiveDate, NaiveDateTime};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a string for fuzzy matching: lowercase + ASCII alphanumeric only.
pub fn normalize_key(value: &str) -> String {
    fold_accents(value)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Strip diacritics: NFD decomposition with combining marks removed.
///
/// "Orçamento" → "Orcamento", "fotógrafo" → "fotografo".
pub fn fold_accents(value: &str) -> String {
    value.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Accent-stripped, lowercased copy with punctuation turned into single spaces.
///
/// This is the form every keyword match runs against, so matching is
/// insensitive to case, accents and punctuation.
pub fn normalize_text(value: &str) -> String {
    let folded = fold_accents(value).to_lowercase();
    let spaced: String = folded
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse the date part of a backend timestamp.
///
/// Accepts `YYYY-MM-DD`, RFC 3339 and the `YYYY-MM-DD HH:MM:SS` form
/// Postgres emits for `timestamp without time zone`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(d) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.date());
        }
    }
    None
}

/// Parse an optional backend timestamp column.
pub fn parse_opt_date(value: Option<&str>) -> Option<NaiveDate> {
    value.and_then(parse_date)
}

/// Format an amount with a currency symbol, thousands separators and cents.
///
/// `format_money(-1234.5, "$")` → `-$1,234.50`
pub fn format_money(amount: f64, symbol: &str) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}.{:02}", sign, symbol, grouped, frac)
}

/// "1 day" / "3 days".
pub fn plural_days(n: i64) -> String {
    format!("{} day{}", n, if n == 1 { "" } else { "s" })
}
