//! Ordered store of outgoing request headers.
//!
//! A header is either a named pair or a literal, pre-formatted line that is
//! sent untouched. Named headers are unique by name (ASCII
//! case-insensitive): setting an existing name replaces its value in place
//! and keeps its original position.

use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    Named { name: String, value: String },
    /// A complete header line, e.g. `X-Trace: abc`.
    Literal(String),
}

impl HeaderEntry {
    pub fn named(name: impl Into<String>, value: impl Into<String>) -> Self {
        HeaderEntry::Named {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn literal(line: impl Into<String>) -> Self {
        HeaderEntry::Literal(line.into())
    }

    /// Wire form of the entry.
    pub fn to_line(&self) -> String {
        match self {
            HeaderEntry::Named { name, value } => format!("{name}: {value}"),
            HeaderEntry::Literal(line) => line.clone(),
        }
    }
}

impl<N: Into<String>, V: Into<String>> From<(N, V)> for HeaderEntry {
    fn from((name, value): (N, V)) -> Self {
        HeaderEntry::named(name, value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderStore {
    entries: Vec<HeaderEntry>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite one named header.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(idx) => self.entries[idx] = HeaderEntry::Named { name, value },
            None => self.entries.push(HeaderEntry::Named { name, value }),
        }
    }

    pub fn push_literal(&mut self, line: impl Into<String>) {
        self.entries.push(HeaderEntry::Literal(line.into()));
    }

    /// Merge `entries` into the store, or replace the store with them when
    /// `replace` is set.
    pub fn set_all<I>(&mut self, entries: I, replace: bool)
    where
        I: IntoIterator,
        I::Item: Into<HeaderEntry>,
    {
        if replace {
            self.entries.clear();
        }
        for entry in entries {
            match entry.into() {
                HeaderEntry::Named { name, value } => self.set(name, value),
                HeaderEntry::Literal(line) => self.push_literal(line),
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name).and_then(|idx| match &self.entries[idx] {
            HeaderEntry::Named { value, .. } => Some(value.as_str()),
            HeaderEntry::Literal(_) => None,
        })
    }

    /// True when a named header or a literal line carries `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|entry| match entry {
            HeaderEntry::Named { name: n, .. } => n.eq_ignore_ascii_case(name),
            HeaderEntry::Literal(line) => line
                .split_once(':')
                .is_some_and(|(n, _)| n.trim().eq_ignore_ascii_case(name)),
        })
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let idx = self.position(name)?;
        match self.entries.remove(idx) {
            HeaderEntry::Named { value, .. } => Some(value),
            HeaderEntry::Literal(_) => None,
        }
    }

    pub fn entries(&self) -> &[HeaderEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Header lines in insertion order.
    pub fn serialize(&self) -> Vec<String> {
        self.entries.iter().map(HeaderEntry::to_line).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|entry| {
            matches!(entry, HeaderEntry::Named { name: n, .. } if n.eq_ignore_ascii_case(name))
        })
    }
}

/// Split a header line into trimmed name and value.
pub fn split_line(line: &str) -> Result<(&str, &str)> {
    let (name, value) = line
        .split_once(':')
        .ok_or_else(|| ClientError::invalid(format!("header line without ':': {line:?}")))?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(ClientError::invalid(format!("malformed header name in {line:?}")));
    }
    Ok((name, value.trim()))
}
