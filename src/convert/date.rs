// src/convert/date.rs
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static BARE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}$").unwrap());
static YEAR_MONTH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{1,2}$").unwrap());
static ISO_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}").unwrap());

/// Archival date strings separate segments with `".-"` (`"1920.-mar.-05"`);
/// collapse that to plain dashes before parsing.
fn pre_clean(raw: &str) -> String {
    raw.trim().to_lowercase().replace(".-", "-")
}

/// Deterministic parse of `raw` into `YYYY-MM-DD`. Returns `None` when no
/// rule applies and the caller should consult the model.
///
/// Accepted forms, tried in order: bare 4-digit year (day and month default
/// to January 1st), `YYYY-MM-DD` (unpadded accepted), `YYYY-<abbrev month
/// name>-DD`, and `YYYY-MM` (day defaults to the 1st).
pub fn parse_date(raw: &str) -> Option<String> {
    let cleaned = pre_clean(raw);

    if BARE_YEAR.is_match(&cleaned) {
        return Some(format!("{cleaned}-01-01"));
    }

    for format in ["%Y-%m-%d", "%Y-%b-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    if YEAR_MONTH.is_match(&cleaned) {
        if let Ok(date) = NaiveDate::parse_from_str(&format!("{cleaned}-1"), "%Y-%m-%d") {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }

    None
}

/// Whether `text` starts with an ISO-8601 date (`\d{4}-\d{2}-\d{2}`).
/// Prefix check only; trailing text is the caller's problem.
pub fn has_iso_prefix(text: &str) -> bool {
    ISO_PREFIX.is_match(text)
}
