//! Slug allocation.
//!
//! The allocator only proposes candidates. Uniqueness is decided by the
//! store's unique index at write time: callers insert a candidate and move on
//! to the next one when the store reports the slug as taken.

use std::collections::HashSet;

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

const SEPARATOR: char = '-';
const MAX_SLUG_LEN: usize = 80;
const DEFAULT_MAX_ATTEMPTS: usize = 32;

/// Normalize a title into a URL-safe slug body.
///
/// Lowercases, strips diacritics, collapses every run of non-alphanumerics
/// into one `-`, and trims separators. May return an empty string.
pub fn normalize(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_separator = false;

    for c in title.nfkd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            if pending_separator && !out.is_empty() {
                out.push(SEPARATOR);
            }
            pending_separator = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_separator = true;
        }
    }

    if out.len() > MAX_SLUG_LEN {
        out.truncate(MAX_SLUG_LEN);
        while out.ends_with(SEPARATOR) {
            out.pop();
        }
    }
    out
}

/// Slug for a title, falling back to `item-<externalId>` when the title has
/// nothing usable in it.
pub fn base_slug(title: &str, external_id: &str) -> String {
    let normalized = normalize(title);
    if !normalized.is_empty() {
        return normalized;
    }
    let id: String = external_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if id.is_empty() {
        "item".to_string()
    } else {
        format!("item-{id}")
    }
}

/// `base`, `base-2`, `base-3`, ...
fn candidate(base: &str, n: usize) -> String {
    if n <= 1 {
        base.to_string()
    } else {
        format!("{base}{SEPARATOR}{n}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugAllocator {
    /// Retry budget: how many candidates a single item write may try.
    pub max_attempts: usize,
}

impl Default for SlugAllocator {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl SlugAllocator {
    pub fn with_max_attempts(mut self, max: usize) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// First free slug for `title` given the slugs known to be taken.
    pub fn allocate(&self, title: &str, external_id: &str, existing: &HashSet<String>) -> String {
        let base = base_slug(title, external_id);
        let free = (1..).map(|n| candidate(&base, n)).find(|c| !existing.contains(c));
        free.unwrap_or_else(|| base.clone())
    }

    /// Candidates to try against the authoritative index, in order.
    ///
    /// Starts at the first slug free in `existing` (a hint, possibly stale) and
    /// keeps increasing the suffix. Yields at most `max_attempts` candidates.
    pub fn attempts(&self, title: &str, external_id: &str, existing: &HashSet<String>) -> Vec<String> {
        let base = base_slug(title, external_id);
        let start = (1..)
            .find(|n| !existing.contains(&candidate(&base, *n)))
            .unwrap_or(1);
        (start..start + self.max_attempts)
            .map(|n| candidate(&base, n))
            .collect()
    }
}
