//! Message normalization for baseline comparisons.
//!
//! Verifier messages embed metadata tokens and module version ids that change from run to
//! run. Both are stripped before a message is compared with a literal expectation, unless
//! the expectation asks to keep them. Comparison also tolerates whitespace differences, so
//! baselines can be indented freely inside test sources.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::{Error, Result};

/// Remove metadata tokens and module version ids from a verifier message.
///
/// Tokens are written as `(0x0a000005)`. Module version ids are bracketed GUIDs, e.g.
/// `'[5c5d2a0e-8f4b-4b8e-9f1a-3f9c2b7d1e60]C'`. Each is removed together with its
/// brackets. Bracketed text that is not a valid GUID is kept.
///
/// # Errors
/// Returns [`Error::Error`] if the normalization patterns fail to compile.
pub fn strip_tokens_and_module_ids(message: &str) -> Result<String> {
    let without_tokens = token_pattern()?.replace_all(message, "");
    let without_ids = module_id_pattern()?.replace_all(&without_tokens, |caps: &Captures<'_>| {
        if uguid::Guid::try_parse(&caps[1]).is_ok() {
            String::new()
        } else {
            caps[0].to_string()
        }
    });
    Ok(without_ids.into_owned())
}

/// Normalize whitespace for tolerant comparison.
///
/// Each line is trimmed and empty lines are dropped. Every remaining line is
/// newline-terminated. Lines not starting with a brace get a two-space indent, so
/// brace-delimited listings keep their shape.
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    for line in text.split(['\n', '\r']) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !(trimmed.starts_with('{') || trimmed.starts_with('}')) {
            output.push_str("  ");
        }
        output.push_str(trimmed);
        output.push('\n');
    }
    output
}

/// True if `expected` and `actual` are equal up to whitespace differences
#[must_use]
pub fn equal_tolerating_whitespace(expected: &str, actual: &str) -> bool {
    normalize_whitespace(expected) == normalize_whitespace(actual)
}

fn token_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(&PATTERN, r"\s*\(0x[0-9a-fA-F]{8}\)")
}

fn module_id_pattern() -> Result<&'static Regex> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    compiled(&PATTERN, r"\[([0-9a-fA-F-]{36})\]")
}

fn compiled(cell: &'static OnceLock<Regex>, pattern: &str) -> Result<&'static Regex> {
    if let Some(regex) = cell.get() {
        return Ok(regex);
    }
    let regex = Regex::new(pattern)
        .map_err(|error| Error::Error(format!("invalid pattern '{pattern}': {error}")))?;
    Ok(cell.get_or_init(|| regex))
}
