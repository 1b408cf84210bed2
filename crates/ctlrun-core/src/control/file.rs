//! Control-file parsing.
//!
//! Control files use a properties-style key/value format:
//! - lines starting with `#` or `!` are comments
//! - `key = value`, `key: value` and `key value` are all accepted
//! - a trailing backslash joins the next line
//! - `\n`, `\t`, `\r` and `\<char>` escapes are decoded

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::ControlFileError;

/// Immutable key/value store holding the action definitions of one file.
#[derive(Debug, Clone, Default)]
pub struct ControlFile {
    entries: HashMap<String, String>,
    order: Vec<String>,
    source: Option<PathBuf>,
}

impl ControlFile {
    /// Load and parse a control file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ControlFileError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ControlFileError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let mut control = Self::parse(&text);
        control.source = Some(path.to_path_buf());

        tracing::debug!(
            path = %path.display(),
            entries = control.len(),
            "Control file loaded"
        );

        Ok(control)
    }

    /// Parse control-file text. Parsing never fails; unreadable lines are
    /// taken as keys without values.
    pub fn parse(text: &str) -> Self {
        let mut control = Self::default();
        for line in logical_lines(text) {
            if let Some((key, value)) = split_entry(&line) {
                control.insert(key, value);
            }
        }
        control
    }

    fn insert(&mut self, key: String, value: String) {
        if !self.entries.contains_key(&key) {
            self.order.push(key.clone());
        }
        self.entries.insert(key, value);
    }

    /// Get the raw (unsubstituted) value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Keys in the order of their first definition.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Path the file was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

impl std::str::FromStr for ControlFile {
    type Err = std::convert::Infallible;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(text))
    }
}

/// Join continuation lines and drop comments and blank lines.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    for raw in text.lines() {
        let trimmed = raw.trim_start();
        let continuing = current.is_some();

        if !continuing && (trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!'))
        {
            continue;
        }

        let mut part = trimmed.to_string();
        let joins_next = ends_with_continuation(&part);
        if joins_next {
            part.pop();
        }

        let line = match current.take() {
            Some(mut prefix) => {
                prefix.push_str(&part);
                prefix
            }
            None => part,
        };

        if joins_next {
            current = Some(line);
        } else {
            lines.push(line);
        }
    }

    if let Some(line) = current {
        lines.push(line);
    }
    lines
}

/// A line continues when it ends with an odd number of backslashes.
fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|&c| c == '\\').count() % 2 == 1
}

/// Split a logical line into an unescaped key and value.
fn split_entry(line: &str) -> Option<(String, String)> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;
    let mut key_end = chars.len();

    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '=' | ':' => {
                key_end = i;
                break;
            }
            c if c.is_whitespace() => {
                key_end = i;
                break;
            }
            _ => i += 1,
        }
    }
    let key_end = key_end.min(chars.len());

    // Skip whitespace, at most one separator, then whitespace again
    let mut value_start = key_end;
    while value_start < chars.len() && chars[value_start].is_whitespace() {
        value_start += 1;
    }
    if value_start < chars.len() && (chars[value_start] == '=' || chars[value_start] == ':') {
        value_start += 1;
        while value_start < chars.len() && chars[value_start].is_whitespace() {
            value_start += 1;
        }
    }

    let key: String = chars[..key_end].iter().collect();
    if key.is_empty() {
        return None;
    }
    let value: String = chars[value_start.min(chars.len())..].iter().collect();

    Some((unescape(&key), unescape(&value)))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_separators() {
        let control = ControlFile::parse("a = 1\nb: 2\nc 3\nd=4\n");
        assert_eq!(control.get("a"), Some("1"));
        assert_eq!(control.get("b"), Some("2"));
        assert_eq!(control.get("c"), Some("3"));
        assert_eq!(control.get("d"), Some("4"));
        assert_eq!(control.len(), 4);
    }

    #[test]
    fn test_parse_comments_and_blank_lines() {
        let control = ControlFile::parse("# comment\n! also comment\n\n   \nkey = value # not a comment\n");
        assert_eq!(control.len(), 1);
        assert_eq!(control.get("key"), Some("value # not a comment"));
    }

    #[test]
    fn test_parse_continuation() {
        let control = ControlFile::parse("actions = first \\\n    second \\\n    third\nnext = x\n");
        assert_eq!(control.get("actions"), Some("first second third"));
        assert_eq!(control.get("next"), Some("x"));
    }

    #[test]
    fn test_parse_escapes() {
        let control = ControlFile::parse("a\\=b = x\\ty\nline = one\\ntwo\n");
        assert_eq!(control.get("a=b"), Some("x\ty"));
        assert_eq!(control.get("line"), Some("one\ntwo"));
    }

    #[test]
    fn test_parse_empty_value_and_override() {
        let control = ControlFile::parse("empty =\nkey = 1\nkey = 2\n");
        assert_eq!(control.get("empty"), Some(""));
        assert_eq!(control.get("key"), Some("2"));
        assert_eq!(control.keys().collect::<Vec<_>>(), vec!["empty", "key"]);

        let parsed: ControlFile = "key = 3".parse().unwrap();
        assert_eq!(parsed.get("key"), Some("3"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ControlFile::load("/nonexistent/ctlrun/file.cf").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/ctlrun/file.cf"));
    }

    #[test]
    fn test_load_sets_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cf");
        std::fs::write(&path, "actions = echo\n").unwrap();

        let control = ControlFile::load(&path).unwrap();
        assert_eq!(control.source(), Some(path.as_path()));
        assert_eq!(control.get("actions"), Some("echo"));
    }
}
