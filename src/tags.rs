//! Selection of the source tags a series is built from.
//!
//! Tags are listed from the registry, filtered with a shell glob, sorted and
//! optionally cut down to the newest `limit` entries. Index 0 of the result is
//! the oldest tag.

use chrono::{DateTime, SecondsFormat, Utc};
use clap::ValueEnum;
use std::cmp::Ordering;

use crate::backends::Backend;
use crate::error::{Error, Result};
use crate::notifier::Notifier;

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, ValueEnum)]
pub enum SortMode {
    /// Natural sort: digit runs compare numerically
    #[default]
    Version,
    /// Plain alphabetical sort
    Name,
    /// Image creation time from the registry
    Date,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagQuery {
    pub filter: String,
    pub sort: SortMode,
    /// Keep only the last `limit` tags after sorting; `None` or 0 keeps everything.
    pub limit: Option<usize>,
}

impl Default for TagQuery {
    fn default() -> Self {
        Self {
            filter: "*".to_string(),
            sort: SortMode::Version,
            limit: None,
        }
    }
}

/// One segment of a natural sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
enum KeyPart {
    Text(String),
    /// Digit run without leading zeros, compared by magnitude.
    Number(String),
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (KeyPart::Text(a), KeyPart::Text(b)) => a.cmp(b),
            (KeyPart::Number(a), KeyPart::Number(b)) => a.len().cmp(&b.len()).then_with(|| a.cmp(b)),
            (KeyPart::Text(_), KeyPart::Number(_)) => Ordering::Less,
            (KeyPart::Number(_), KeyPart::Text(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Natural sort key: alternating text and digit runs, always starting and ending
/// with a (possibly empty) text run so that keys line up position by position.
fn natural_key(tag: &str) -> Vec<KeyPart> {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    for c in tag.chars() {
        if c.is_ascii_digit() {
            if digits.is_empty() {
                parts.push(KeyPart::Text(std::mem::take(&mut text).to_lowercase()));
            }
            digits.push(c);
        } else {
            if !digits.is_empty() {
                parts.push(number_part(std::mem::take(&mut digits)));
            }
            text.push(c);
        }
    }
    if !digits.is_empty() {
        parts.push(number_part(digits));
    }
    parts.push(KeyPart::Text(text.to_lowercase()));
    parts
}

fn number_part(digits: String) -> KeyPart {
    let trimmed = digits.trim_start_matches('0');
    KeyPart::Number(if trimmed.is_empty() { "0".to_string() } else { trimmed.to_string() })
}

/// Compare two tags the way version numbers are read: `41.2 < 41.10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    natural_key(a).cmp(&natural_key(b))
}

/// Sort tags in place by version or name. Date sorting needs the registry,
/// see [`TagSelector::select`].
pub fn sort_tags(tags: &mut [String], mode: SortMode) {
    match mode {
        SortMode::Name => tags.sort(),
        _ => tags.sort_by_cached_key(|tag| natural_key(tag)),
    }
}

/// Sort key for an image creation timestamp.
///
/// RFC 3339 values are normalized to UTC with fixed precision so mixed offsets
/// and fractional digits still compare chronologically as strings.
pub fn date_key(created: &str) -> String {
    match DateTime::parse_from_rfc3339(created) {
        Ok(parsed) => parsed
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Nanos, true),
        Err(_) => created.to_string(),
    }
}

/// Keep the newest `limit` entries of an oldest-first list.
pub fn apply_limit(tags: Vec<String>, limit: Option<usize>) -> Vec<String> {
    match limit {
        Some(limit) if limit > 0 && tags.len() > limit => {
            let skip = tags.len() - limit;
            tags.into_iter().skip(skip).collect()
        }
        _ => tags,
    }
}

pub fn filter_tags(tags: Vec<String>, filter: &str) -> Result<Vec<String>> {
    let pattern = glob::Pattern::new(filter).map_err(|source| Error::InvalidPattern {
        pattern: filter.to_string(),
        source,
    })?;
    Ok(tags.into_iter().filter(|tag| pattern.matches(tag)).collect())
}

pub struct TagSelector<'a, B: Backend> {
    backend: &'a B,
    notifier: &'a Notifier,
}

impl<'a, B: Backend> TagSelector<'a, B> {
    pub fn new(backend: &'a B, notifier: &'a Notifier) -> Self {
        Self { backend, notifier }
    }

    /// List, filter, sort and limit the tags of `repo`.
    ///
    /// Fails with [`Error::NotFound`] when no tag matches the filter.
    pub fn select(&self, repo: &str, query: &TagQuery) -> Result<Vec<String>> {
        self.notifier.step(&format!(
            "Listing tags from {} matching '{}'...",
            repo, query.filter
        ));
        let all_tags = self.backend.list_tags(repo)?;
        self.notifier
            .debug(&format!("Registry returned {} tags", all_tags.len()));

        let mut tags = filter_tags(all_tags, &query.filter)?;
        if tags.is_empty() {
            return Err(Error::NotFound(format!(
                "No tags found matching '{}'",
                query.filter
            )));
        }

        match query.sort {
            SortMode::Date => {
                self.notifier
                    .step("Fetching image creation dates (this may take a while)...");
                tags = self.sort_by_date(repo, tags);
            }
            mode => sort_tags(&mut tags, mode),
        }

        let tags = apply_limit(tags, query.limit);

        self.notifier
            .println(&format!("Found {} matching tags", tags.len()));
        if self.notifier.is_verbose() {
            for tag in &tags {
                self.notifier.detail(tag);
            }
        }
        Ok(tags)
    }

    /// Oldest first. A tag whose date cannot be read sorts before everything else.
    fn sort_by_date(&self, repo: &str, tags: Vec<String>) -> Vec<String> {
        let mut dated: Vec<(String, String)> = tags
            .into_iter()
            .map(|tag| {
                self.notifier.debug(&format!("Inspecting {}...", tag));
                let key = match self.backend.created(repo, &tag) {
                    Ok(created) => date_key(&created),
                    Err(e) => {
                        self.notifier
                            .warn(&format!("Could not get date for {}: {}", tag, e));
                        String::new()
                    }
                };
                (key, tag)
            })
            .collect();

        dated.sort_by(|a, b| a.0.cmp(&b.0));
        dated.into_iter().map(|(_, tag)| tag).collect()
    }
}
