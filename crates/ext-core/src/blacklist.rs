//! Ids hidden from package browsing.

use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone)]
struct Entry {
    raw: String,
    pattern: Option<Regex>,
}

/// Case-insensitive exact ids or regular expressions, compiled once.
///
/// An entry that is not a valid regular expression only matches exactly.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    entries: Vec<Entry>,
}

impl Blacklist {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = entries
            .into_iter()
            .map(|raw| {
                let raw = raw.as_ref().to_string();
                let pattern = match RegexBuilder::new(&raw).case_insensitive(true).build() {
                    Ok(pattern) => Some(pattern),
                    Err(e) => {
                        tracing::debug!(entry = %raw, error = %e, "Blacklist entry is not a valid pattern");
                        None
                    }
                };
                Entry { raw, pattern }
            })
            .collect();
        Self { entries }
    }

    pub fn is_blacklisted(&self, id: &str) -> bool {
        self.entries.iter().any(|entry| {
            entry.raw.eq_ignore_ascii_case(id)
                || entry.pattern.as_ref().is_some_and(|p| p.is_match(id))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
