//! Placeholder substitution implementation.

use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::context::Variables;

/// `<name>` or `<name:default>`; the default may not contain angle brackets.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<([A-Za-z_][A-Za-z0-9_.\-]*)(?::([^<>]*))?>").expect("placeholder pattern is valid")
});

/// Substitute placeholders in an optional text.
///
/// `None` passes through untouched, which lets callers feed the result of a
/// control-file lookup directly.
pub fn substitute(text: Option<&str>, variables: &Variables) -> Option<String> {
    text.map(|t| substitute_str(t, variables))
}

/// Substitute placeholders in `text`.
///
/// Each placeholder is replaced by the variable value when defined, otherwise
/// by its default (empty when omitted). The scan is single pass: expanded
/// values are never scanned again. Text that does not form a valid
/// placeholder is kept verbatim.
pub fn substitute_str(text: &str, variables: &Variables) -> String {
    if !text.contains('<') {
        return text.to_string();
    }

    PLACEHOLDER
        .replace_all(text, |caps: &Captures| match variables.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps.get(2).map_or("", |m| m.as_str()).to_string(),
        })
        .into_owned()
}
