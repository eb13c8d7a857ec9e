use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use tracing::debug;

use crate::prelude::*;
use crate::trace::{ReadOptions, Trace};

/// Something a [Trace] can be produced from.
#[derive(Debug, Clone)]
pub enum Source {
    /// A TRC file.
    Path(PathBuf),
    /// The in-memory contents of a TRC file or instrument response.
    Bytes(Vec<u8>),
    /// A file name pattern possibly matching several TRC files. `*`, `?`, `[...]` and
    /// `[!...]` are supported in any path component.
    Glob(String),
    /// An already decoded trace.
    Trace(Trace),
}

impl Source {
    /// Resolve this source into decoded traces. A [Source::Glob] may produce zero or more.
    ///
    /// # Errors
    /// Any error expanding a pattern or reading a trace.
    pub fn into_traces(self, opts: &ReadOptions) -> Result<Vec<Trace>> {
        match self {
            Source::Path(path) => Ok(vec![Trace::from_path(path, opts)?]),
            Source::Bytes(dat) => Ok(vec![Trace::from_bytes(&dat, opts)?]),
            Source::Glob(pattern) => expand_glob(&pattern)?
                .into_iter()
                .map(|path| Trace::from_path(path, opts))
                .collect(),
            Source::Trace(trace) => Ok(vec![trace]),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(value: PathBuf) -> Self {
        Source::Path(value)
    }
}

impl From<&Path> for Source {
    fn from(value: &Path) -> Self {
        Source::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for Source {
    fn from(value: Vec<u8>) -> Self {
        Source::Bytes(value)
    }
}

impl From<Trace> for Source {
    fn from(value: Trace) -> Self {
        Source::Trace(value)
    }
}

/// Strings are treated as patterns if they contain a wildcard, otherwise as paths.
impl From<&str> for Source {
    fn from(value: &str) -> Self {
        if has_wildcard(value) {
            Source::Glob(value.to_string())
        } else {
            Source::Path(PathBuf::from(value))
        }
    }
}

fn has_wildcard(s: &str) -> bool {
    s.contains(['*', '?', '['])
}

/// A shell style pattern for a single path component.
///
/// `*` and `?` never match a leading `.` unless the pattern itself starts with one.
#[derive(Debug, Clone)]
struct NamePattern {
    rx: Regex,
    dotfiles: bool,
}

impl NamePattern {
    fn new(pattern: &str) -> Result<Self> {
        let chars: Vec<char> = pattern.chars().collect();
        let mut rx = String::from("^");
        let mut i = 0;
        while i < chars.len() {
            match chars[i] {
                '*' => rx.push_str(".*"),
                '?' => rx.push('.'),
                '[' => {
                    i = push_class(&chars, i + 1, &mut rx).ok_or_else(|| {
                        Error::InvalidArgument(format!(
                            "unterminated character class in {pattern:?}"
                        ))
                    })?;
                }
                c => rx.push_str(&escape(c)),
            }
            i += 1;
        }
        rx.push('$');
        Ok(NamePattern {
            rx: Regex::new(&rx)?,
            dotfiles: pattern.starts_with('.'),
        })
    }

    fn is_match(&self, name: &str) -> bool {
        (self.dotfiles || !name.starts_with('.')) && self.rx.is_match(name)
    }
}

fn escape(c: char) -> String {
    regex::escape(c.encode_utf8(&mut [0; 4]))
}

/// Push the regex for the class whose body starts at `chars[i]`, returning the index of
/// the closing `]`. A `]` first in the body is literal, as are `^`, `&` and `~`. Reversed
/// ranges match nothing.
fn push_class(chars: &[char], mut i: usize, rx: &mut String) -> Option<usize> {
    let negated = chars.get(i) == Some(&'!');
    if negated {
        i += 1;
    }
    let first = i;
    let mut items = String::default();
    loop {
        let c = *chars.get(i)?;
        if c == ']' && i > first {
            break;
        }
        match (chars.get(i + 1), chars.get(i + 2)) {
            (Some('-'), Some(&end)) if end != ']' => {
                if c <= end {
                    items.push_str(&escape(c));
                    items.push('-');
                    items.push_str(&escape(end));
                }
                i += 3;
            }
            _ => {
                items.push_str(&escape(c));
                i += 1;
            }
        }
    }
    match (negated, items.is_empty()) {
        (false, true) => rx.push_str(r"[^\s\S]"),
        (true, true) => rx.push('.'),
        (negated, false) => {
            rx.push('[');
            if negated {
                rx.push('^');
            }
            rx.push_str(&items);
            rx.push(']');
        }
    }
    Some(i)
}

/// Entries of `dir` whose names match `pattern`. A missing directory, or a path that is
/// not a directory, has no entries.
fn matching_entries(dir: &Path, pattern: &NamePattern) -> Result<Vec<PathBuf>> {
    let listing = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    let entries = match fs::read_dir(listing) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound || !listing.is_dir() => {
            return Ok(Vec::new())
        }
        Err(err) => return Err(err.into()),
    };
    let mut matches = Vec::default();
    for entry in entries {
        let entry = entry?;
        if entry.file_name().to_str().is_some_and(|n| pattern.is_match(n)) {
            matches.push(dir.join(entry.file_name()));
        }
    }
    Ok(matches)
}

/// Paths of the files matching `pattern`, sorted. Any path component may contain
/// wildcards; a directory that does not exist matches nothing.
///
/// # Errors
/// [Error::InvalidArgument] if the pattern is malformed, or any IO error listing a
/// directory.
pub fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let mut paths = vec![PathBuf::new()];
    for component in Path::new(pattern).components() {
        let part = component.as_os_str();
        let wild = match component {
            Component::Normal(name) => name.to_str().filter(|n| has_wildcard(n)),
            _ => None,
        };
        paths = match wild {
            Some(name) => {
                let name = NamePattern::new(name)?;
                let mut next = Vec::default();
                for dir in &paths {
                    next.extend(matching_entries(dir, &name)?);
                }
                next
            }
            None => paths.into_iter().map(|p| p.join(part)).collect(),
        };
        if paths.is_empty() {
            break;
        }
    }

    let mut matches: Vec<_> = paths.into_iter().filter(|p| p.is_file()).collect();
    matches.sort();
    debug!("{pattern:?} matched {} files", matches.len());
    Ok(matches)
}
