//! Reject statements that could mutate data.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::CorrectionError;

static MUTATING_KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(insert|update|delete|drop|alter|create)\b").expect("valid keyword regex")
});

/// `true` when no mutating keyword appears as a whole word anywhere in the
/// text, literals and comments included.
pub fn is_read_only(sql: &str) -> bool {
    !MUTATING_KEYWORD.is_match(sql)
}

/// Checked form of [`is_read_only`], naming the first offending keyword.
pub fn ensure_read_only(sql: &str) -> Result<(), CorrectionError> {
    match MUTATING_KEYWORD.find(sql) {
        Some(m) => Err(CorrectionError::UnsafeStatement {
            keyword: m.as_str().to_lowercase(),
        }),
        None => Ok(()),
    }
}
