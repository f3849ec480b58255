//! Structured telemetry paths
//!
//! Two shapes of the same hierarchy are kept apart on purpose:
//! - [`PathPattern`]: what a caller subscribes to, may carry wildcard key predicates.
//! - [`Path`]: what a device reports, literal segments only.
//!
//! Patterns are parsed once from their textual form
//! (`/interfaces/interface[name=*]/state/counters/in-octets`) and never
//! handled as strings afterwards.

mod matcher;

pub use matcher::*;

#[cfg(test)]
mod matcher_test;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

pub const WILDCARD: &str = "*";

/// Value side of a key predicate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyMatch {
    /// `[name=*]` - matches any value and binds it
    Any,
    /// `[name=Ethernet1]` - matches only this value
    Exact(String),
}

impl KeyMatch {
    pub fn accepts(
        &self,
        value: &str,
    ) -> bool {
        match self {
            KeyMatch::Any => true,
            KeyMatch::Exact(expected) => expected == value,
        }
    }
}

/// One segment of a subscription pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternElem {
    pub name: String,
    pub keys: BTreeMap<String, KeyMatch>,
}

impl PatternElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn with_key(
        mut self,
        key: impl Into<String>,
        value: KeyMatch,
    ) -> Self {
        self.keys.insert(key.into(), value);
        self
    }

    pub fn has_wildcard(&self) -> bool {
        self.keys.values().any(|k| *k == KeyMatch::Any)
    }
}

/// Subscription pattern, immutable once parsed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathPattern {
    elems: Vec<PatternElem>,
}

impl PathPattern {
    pub fn new(elems: Vec<PatternElem>) -> Self {
        Self { elems }
    }

    /// Parse the textual gNMI path form.
    ///
    /// Segments are separated by `/`; key predicates follow the segment name
    /// as `[key=value]`, any number of them. Inside a key value `\]`, `\=`
    /// and `\\` escape the literal character, and `/` needs no escaping.
    ///
    /// # Errors
    /// Returns [`Error::Config`] on empty input, empty segments, empty key
    /// names or unbalanced brackets.
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(Error::config(format!("path pattern '{text}' has no segments")));
        }

        let mut elems = Vec::new();
        for raw in split_segments(body, text)? {
            elems.push(parse_segment(&raw, text)?);
        }
        Ok(Self { elems })
    }

    pub fn elems(&self) -> &[PatternElem] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    /// Name of the trailing segment, used to classify updates
    pub fn leaf(&self) -> Option<&str> {
        self.elems.last().map(|e| e.name.as_str())
    }

    pub fn has_wildcard(&self) -> bool {
        self.elems.iter().any(PatternElem::has_wildcard)
    }
}

impl FromStr for PathPattern {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        for elem in &self.elems {
            write!(f, "/{}", elem.name)?;
            for (key, value) in &elem.keys {
                match value {
                    KeyMatch::Any => write!(f, "[{key}={WILDCARD}]")?,
                    KeyMatch::Exact(v) => write!(f, "[{key}={}]", escape_key_value(v))?,
                }
            }
        }
        Ok(())
    }
}

/// One segment of a concrete, device-reported path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct PathElem {
    pub name: String,
    pub keys: BTreeMap<String, String>,
}

impl PathElem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: BTreeMap::new(),
        }
    }

    pub fn with_key(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.keys.insert(key.into(), value.into());
        self
    }
}

/// Concrete path as received from the device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    elems: Vec<PathElem>,
}

impl Path {
    pub fn new(elems: Vec<PathElem>) -> Self {
        Self { elems }
    }

    pub fn elems(&self) -> &[PathElem] {
        &self.elems
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn leaf(&self) -> Option<&str> {
        self.elems.last().map(|e| e.name.as_str())
    }

    /// Prefix + relative path, as carried by a notification
    pub fn join(
        &self,
        other: &Path,
    ) -> Path {
        let mut elems = self.elems.clone();
        elems.extend(other.elems.iter().cloned());
        Path { elems }
    }
}

impl fmt::Display for Path {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        if self.elems.is_empty() {
            return write!(f, "/");
        }
        for elem in &self.elems {
            write!(f, "/{}", elem.name)?;
            for (key, value) in &elem.keys {
                write!(f, "[{key}={}]", escape_key_value(value))?;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers

fn split_segments(
    body: &str,
    original: &str,
) -> Result<Vec<String>> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_brackets = false;
    let mut chars = body.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_brackets => {
                current.push(c);
                match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => return Err(Error::config(format!("dangling escape in '{original}'"))),
                }
            }
            '[' if !in_brackets => {
                in_brackets = true;
                current.push(c);
            }
            ']' if in_brackets => {
                in_brackets = false;
                current.push(c);
            }
            '/' if !in_brackets => {
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if in_brackets {
        return Err(Error::config(format!("unterminated key predicate in '{original}'")));
    }
    segments.push(current);

    if segments.iter().any(|s| s.is_empty()) {
        return Err(Error::config(format!("empty segment in path pattern '{original}'")));
    }
    Ok(segments)
}

fn parse_segment(
    raw: &str,
    original: &str,
) -> Result<PatternElem> {
    let (name, mut rest) = match raw.find('[') {
        Some(i) => (&raw[..i], &raw[i..]),
        None => (raw, ""),
    };
    if name.is_empty() {
        return Err(Error::config(format!("segment without a name in '{original}'")));
    }
    if name.contains(']') {
        return Err(Error::config(format!("unexpected ']' in segment '{name}' of '{original}'")));
    }

    let mut elem = PatternElem::new(name);
    while !rest.is_empty() {
        let inner = rest
            .strip_prefix('[')
            .ok_or_else(|| Error::config(format!("garbage after key predicate in '{original}'")))?;
        let (predicate, remainder) = take_predicate(inner, original)?;
        let (key, value) = predicate
            .split_once('=')
            .ok_or_else(|| Error::config(format!("key predicate '{predicate}' lacks '=' in '{original}'")))?;
        if key.is_empty() {
            return Err(Error::config(format!("empty key name in '{original}'")));
        }
        // Only the bare `*` is a wildcard; `\*` is the literal value.
        let matcher = if value == WILDCARD {
            KeyMatch::Any
        } else {
            KeyMatch::Exact(unescape_key_value(value))
        };
        elem.keys.insert(key.to_string(), matcher);
        rest = remainder;
    }
    Ok(elem)
}

/// Returns the predicate text (escapes intact) and what follows its `]`.
fn take_predicate<'a>(
    inner: &'a str,
    original: &str,
) -> Result<(&'a str, &'a str)> {
    let mut escaped = false;
    for (i, c) in inner.char_indices() {
        match c {
            '\\' if !escaped => escaped = true,
            ']' if !escaped => return Ok((&inner[..i], &inner[i + 1..])),
            _ => escaped = false,
        }
    }
    Err(Error::config(format!("unterminated key predicate in '{original}'")))
}

fn unescape_key_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn escape_key_value(value: &str) -> String {
    if value == WILDCARD {
        return format!("\\{WILDCARD}");
    }
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, ']' | '\\' | '=') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
