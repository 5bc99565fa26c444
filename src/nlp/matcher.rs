//! Resolve a book-name fragment against the catalog
//!
//! Resolution order: exact title, title mentioned inside the fragment,
//! fragment inside a title or author, then Jaro-Winkler similarity. The
//! fuzzy step only accepts a candidate at or above the configured threshold;
//! below it the fragment is reported as unmatched instead of guessed.

use strsim::jaro_winkler;

use super::text::{contains_phrase, normalize};
use crate::catalog::Book;

/// Default similarity threshold for the fuzzy step.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.85;

/// Fragments shorter than this never match by substring.
const MIN_SUBSTRING_LEN: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct BookMatcher {
    threshold: f64,
}

impl Default for BookMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_FUZZY_THRESHOLD)
    }
}

struct Candidate<'a> {
    book: &'a Book,
    title: String,
    author: String,
}

impl BookMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Find the book a fragment refers to, or `None` when nothing is close
    /// enough.
    pub fn resolve<'a>(&self, fragment: &str, books: &'a [Book]) -> Option<&'a Book> {
        let needle = normalize(fragment);
        if needle.is_empty() {
            return None;
        }

        let candidates: Vec<Candidate<'a>> = books
            .iter()
            .map(|book| Candidate {
                book,
                title: normalize(&book.title),
                author: normalize(&book.author),
            })
            .collect();

        if let Some(c) = candidates.iter().find(|c| c.title == needle) {
            return Some(c.book);
        }

        // "dat mua gilead ngay" mentions the whole title; prefer the longest
        // title so "rage of angels" beats "angels".
        if let Some(c) = candidates
            .iter()
            .filter(|c| contains_phrase(&needle, &c.title))
            .max_by(|a, b| {
                a.title
                    .len()
                    .cmp(&b.title.len())
                    .then_with(|| b.book.id.cmp(&a.book.id))
            })
        {
            return Some(c.book);
        }

        if needle.len() >= MIN_SUBSTRING_LEN {
            if let Some(c) = candidates
                .iter()
                .filter(|c| c.title.contains(&needle))
                .min_by(|a, b| {
                    a.title
                        .len()
                        .cmp(&b.title.len())
                        .then_with(|| a.book.id.cmp(&b.book.id))
                })
            {
                return Some(c.book);
            }

            if let Some(c) = candidates
                .iter()
                .filter(|c| c.author.contains(&needle))
                .min_by(|a, b| a.title.cmp(&b.title).then_with(|| a.book.id.cmp(&b.book.id)))
            {
                return Some(c.book);
            }
        }

        self.fuzzy(&needle, &candidates)
    }

    fn fuzzy<'a>(&self, needle: &str, candidates: &[Candidate<'a>]) -> Option<&'a Book> {
        let mut best: Option<(f64, &Candidate<'a>)> = None;

        for c in candidates {
            let score = similarity(needle, &c.title).max(similarity(needle, &c.author));
            let better = match best {
                None => true,
                Some((s, b)) => {
                    score > s
                        || (score == s
                            && (c.title.len(), &c.book.id) < (b.title.len(), &b.book.id))
                }
            };
            if better {
                best = Some((score, c));
            }
        }

        best.filter(|(score, _)| *score >= self.threshold)
            .map(|(_, c)| c.book)
    }
}

/// Best Jaro-Winkler score of the needle against the whole target and
/// against every run of target words as long as the needle.
pub fn similarity(needle: &str, target: &str) -> f64 {
    let whole = jaro_winkler(needle, target);

    let width = needle.split(' ').count();
    let words: Vec<&str> = target.split(' ').collect();
    if width >= words.len() {
        return whole;
    }

    words
        .windows(width)
        .map(|w| jaro_winkler(needle, &w.join(" ")))
        .fold(whole, f64::max)
}
