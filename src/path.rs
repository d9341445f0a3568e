//! Path Model
//!
//! A path is an ordered sequence of keys addressing a location in the data
//! graph. It has two forms:
//!
//! - **Array form** (`Path`): used for traversal.
//! - **Canonical string form**: used as registry keys. Identifier-safe names
//!   are written `.name`, indices `[n]`, everything else `["name"]`.
//!
//! ## Invariants
//!
//! 1. `parse(&to_canonical(&parse(s))) == parse(s)` for every input `s`.
//! 2. Parsing never fails. Malformed input yields the longest valid prefix.

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;

lazy_static! {
    static ref IDENTIFIER_RE: Regex = Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// One step of a path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathKey {
    Name(String),
    Index(usize),
}

impl PathKey {
    /// Index view of the key, accepting all-digit names.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathKey::Index(i) => Some(*i),
            PathKey::Name(name) => {
                if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) {
                    name.parse().ok()
                } else {
                    None
                }
            }
        }
    }

    /// Object-key view of the key.
    pub fn as_name(&self) -> String {
        match self {
            PathKey::Name(name) => name.clone(),
            PathKey::Index(i) => i.to_string(),
        }
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Name(name) => write!(f, "{}", name),
            PathKey::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for PathKey {
    fn from(name: &str) -> Self {
        PathKey::Name(name.to_string())
    }
}

impl From<String> for PathKey {
    fn from(name: String) -> Self {
        PathKey::Name(name)
    }
}

impl From<usize> for PathKey {
    fn from(index: usize) -> Self {
        PathKey::Index(index)
    }
}

/// Array form of a path. The empty path addresses the data root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path {
    keys: Vec<PathKey>,
}

impl Path {
    pub fn root() -> Self {
        Path { keys: Vec::new() }
    }

    pub fn from_keys(keys: Vec<PathKey>) -> Self {
        Path { keys }
    }

    pub fn keys(&self) -> &[PathKey] {
        &self.keys
    }

    pub fn is_root(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn last(&self) -> Option<&PathKey> {
        self.keys.last()
    }

    /// The path with its last key stripped, or `None` at the root.
    pub fn parent(&self) -> Option<Path> {
        if self.keys.is_empty() {
            return None;
        }
        Some(Path {
            keys: self.keys[..self.keys.len() - 1].to_vec(),
        })
    }

    pub fn push(&mut self, key: PathKey) {
        self.keys.push(key);
    }

    /// New path with `key` appended.
    pub fn child(&self, key: PathKey) -> Path {
        let mut keys = self.keys.clone();
        keys.push(key);
        Path { keys }
    }

    /// New path with every key of `other` appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut keys = self.keys.clone();
        keys.extend(other.keys.iter().cloned());
        Path { keys }
    }

    pub fn to_canonical(&self) -> String {
        to_canonical(self)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&to_canonical(self))
    }
}

impl From<&str> for Path {
    fn from(text: &str) -> Self {
        parse(text)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a dotted/bracketed path string.
///
/// Accepts `a.b[0]`, `a.b.0`, `a["weird key"]` and `a['k']`. Unquoted integer
/// segments become indices; any other unquoted content is taken as a name.
/// A single leading dot is ignored, so `.` alone parses to the root path.
pub fn parse(text: &str) -> Path {
    let chars: Vec<char> = text.trim().chars().collect();
    let mut keys = Vec::new();
    let mut i = 0;

    if chars.first() == Some(&'.') {
        i = 1;
    }

    // Leading bare segment
    if i < chars.len() && chars[i] != '[' {
        match read_bare_segment(&chars, i) {
            Some((key, next)) => {
                keys.push(key);
                i = next;
            }
            None => return Path { keys },
        }
    }

    while i < chars.len() {
        match chars[i] {
            '.' => match read_bare_segment(&chars, i + 1) {
                Some((key, next)) => {
                    keys.push(key);
                    i = next;
                }
                None => break,
            },
            '[' => match read_bracket(&chars, i + 1) {
                Some((key, next)) => {
                    keys.push(key);
                    i = next;
                }
                None => break,
            },
            _ => break,
        }
    }

    Path { keys }
}

/// Read a dotted segment starting at `start`; stops at `.`, `[` or end.
/// An all-digit segment is an index, so `items.0` and `items[0]` agree.
fn read_bare_segment(chars: &[char], start: usize) -> Option<(PathKey, usize)> {
    let mut end = start;
    while end < chars.len() && chars[end] != '.' && chars[end] != '[' {
        if chars[end] == ']' {
            return None;
        }
        end += 1;
    }
    if end == start {
        return None;
    }
    let name: String = chars[start..end].iter().collect();
    Some((unquoted_key(&name), end))
}

/// Read bracket contents after the opening `[`; returns the key and the index after `]`.
fn read_bracket(chars: &[char], start: usize) -> Option<(PathKey, usize)> {
    let first = *chars.get(start)?;

    if first == '"' || first == '\'' {
        let mut name = String::new();
        let mut i = start + 1;
        loop {
            let c = *chars.get(i)?;
            if c == '\\' {
                name.push(*chars.get(i + 1)?);
                i += 2;
                continue;
            }
            if c == first {
                break;
            }
            name.push(c);
            i += 1;
        }
        // closing quote at i, bracket must follow
        if chars.get(i + 1) != Some(&']') {
            return None;
        }
        return Some((PathKey::Name(name), i + 2));
    }

    let mut end = start;
    while end < chars.len() && chars[end] != ']' {
        if chars[end] == '[' {
            return None;
        }
        end += 1;
    }
    if end >= chars.len() {
        return None;
    }
    let inner: String = chars[start..end].iter().collect();
    let inner = inner.trim();
    if inner.is_empty() {
        return None;
    }
    Some((unquoted_key(inner), end + 1))
}

fn unquoted_key(text: &str) -> PathKey {
    if text.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(index) = text.parse::<usize>() {
            return PathKey::Index(index);
        }
    }
    PathKey::Name(text.to_string())
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANONICAL FORM
// ═══════════════════════════════════════════════════════════════════════════════

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

pub fn to_canonical(path: &Path) -> String {
    let mut out = String::new();
    for (position, key) in path.keys.iter().enumerate() {
        match key {
            PathKey::Index(i) => {
                out.push('[');
                out.push_str(&i.to_string());
                out.push(']');
            }
            PathKey::Name(name) if is_identifier(name) => {
                if position > 0 {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathKey::Name(name) => {
                out.push_str("[\"");
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push_str("\"]");
            }
        }
    }
    out
}

/// Canonicalize a path string (parse then re-stringify).
pub fn canonicalize(text: &str) -> String {
    to_canonical(&parse(text))
}

/// True when `candidate` equals `ancestor` or continues it with `.` or `[`.
///
/// Both arguments are canonical strings. The empty string is the ancestor of
/// every path.
pub fn is_ancestor_of(ancestor: &str, candidate: &str) -> bool {
    if candidate == ancestor {
        return true;
    }
    if ancestor.is_empty() {
        return true;
    }
    match candidate.strip_prefix(ancestor) {
        Some(rest) => rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// Strict descendant check: an ancestor that is not the same path.
pub fn is_descendant_of(candidate: &str, ancestor: &str) -> bool {
    candidate != ancestor && is_ancestor_of(ancestor, candidate)
}

/// Resolve `relative` against a repeat item `prefix`.
///
/// Empty or `.` addresses the item itself. A path already under `prefix` is
/// returned unchanged, so rewriting twice never double-prefixes.
pub fn prefix_relative(prefix: &Path, relative: &str) -> String {
    let prefix_text = to_canonical(prefix);
    let trimmed = relative.trim();
    if trimmed.is_empty() || trimmed == "." {
        return prefix_text;
    }
    let parsed = parse(trimmed);
    let canonical = to_canonical(&parsed);
    if !prefix.is_root() && is_ancestor_of(&prefix_text, &canonical) {
        return canonical;
    }
    to_canonical(&prefix.join(&parsed))
}
