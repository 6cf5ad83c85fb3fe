//! Fuzzy document search and relevance ranking.
//!
//! Filters a user's document library by a free-text query and a type
//! filter, then orders the survivors by relevance. The whole pipeline is a
//! pure function of `(documents, query, filter)`: it borrows the input
//! slice, never mutates it, and is cheap enough to re-run on every
//! keystroke.
//!
//! # Matching
//!
//! A document is kept when it passes the [`TypeFilter`] and at least one
//! of the following holds (all comparisons are case-insensitive):
//!
//! 1. **Status**: the query mentions `verified` and the document is
//!    verified, or mentions `pending`, `under verification` or `review`
//!    and the document is not.
//! 2. **Filename**: the name contains the query as a substring, or the
//!    query is a subsequence of the name ([`fuzzy_match`]).
//! 3. **Type**: the query is a subsequence of the type label
//!    (`medical-record` → `medical record`).
//!
//! An empty query keeps every document that passes the filter.
//!
//! # Scoring
//!
//! 1. Substring hit: `100 − (index / len) × 10`, so earlier hits rank higher.
//! 2. Otherwise fuzzy: walk the name once, keep a streak of consecutive
//!    query-character hits, add `streak × 2` per hit, then scale by
//!    `/ len × 50`. An incomplete subsequence scores `0`.
//! 3. Fuzzy scores are mapped through `ceiling × s / (s + ceiling)`, which
//!    is strictly increasing and stays below [`FUZZY_SCORE_CEILING`], so no
//!    fuzzy-only hit outranks a substring hit and fuzzy hits keep their
//!    relative order.
//! 4. Sort by score (desc), verified first, upload date (desc).
//!
//! Scores are only meaningful relative to each other for one query.

use std::cmp::Ordering;

use serde::Serialize;

use crate::models::{Document, TypeFilter};

/// Exclusive upper bound for fuzzy-only relevance.
///
/// A substring hit always scores strictly above 90 (`index / len < 1`).
pub const FUZZY_SCORE_CEILING: f64 = 90.0;

const PENDING_TERMS: [&str; 3] = ["pending", "under verification", "review"];

/// A document that survived filtering, with its relevance score.
#[derive(Debug, Clone, Serialize)]
pub struct RankedDocument<'a> {
    #[serde(flatten)]
    pub document: &'a Document,
    /// Relevance score; `0.0` for every result when the query is empty.
    pub score: f64,
}

/// True if every character of `query` occurs in `text` in the same order.
///
/// Gaps are allowed. Both strings are lower-cased first. An empty query
/// matches any text.
pub fn fuzzy_match(query: &str, text: &str) -> bool {
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    let mut wanted = query.chars().peekable();
    for c in text.chars() {
        match wanted.peek() {
            Some(&q) if q == c => {
                wanted.next();
            }
            Some(_) => {}
            None => break,
        }
    }
    wanted.peek().is_none()
}

/// Score for a case-insensitive substring hit, or `None` if `query` is not
/// a substring of `text`.
///
/// Returns `None` for an empty query.
pub fn substring_score(query: &str, text: &str) -> Option<f64> {
    if query.is_empty() {
        return None;
    }
    let query = query.to_lowercase();
    let text = text.to_lowercase();
    let byte_idx = text.find(&query)?;
    let index = text[..byte_idx].chars().count() as f64;
    let len = text.chars().count() as f64;
    Some(100.0 - (index / len) * 10.0)
}

/// Streak-weighted subsequence score of `query` against `text`.
///
/// Consecutive hits weigh more than scattered ones: the `n`th hit in an
/// unbroken run adds `2n`. Returns `0.0` when the query is empty or is not
/// a subsequence of `text`.
pub fn fuzzy_score(query: &str, text: &str) -> f64 {
    let wanted: Vec<char> = query.to_lowercase().chars().collect();
    if wanted.is_empty() {
        return 0.0;
    }
    let text = text.to_lowercase();
    let len = text.chars().count();

    let mut next = 0;
    let mut streak = 0u32;
    let mut running = 0.0;
    for c in text.chars() {
        if next == wanted.len() {
            break;
        }
        if c == wanted[next] {
            next += 1;
            streak += 1;
            running += f64::from(streak * 2);
        } else {
            streak = 0;
        }
    }

    if next < wanted.len() {
        return 0.0;
    }
    running / len as f64 * 50.0
}

/// Relevance of a document name for a non-empty query.
pub fn relevance_score(query: &str, name: &str) -> f64 {
    substring_score(query, name).unwrap_or_else(|| bound_fuzzy(fuzzy_score(query, name)))
}

/// Order-preserving map of a raw fuzzy score into `[0, FUZZY_SCORE_CEILING)`.
fn bound_fuzzy(raw: f64) -> f64 {
    FUZZY_SCORE_CEILING * raw / (raw + FUZZY_SCORE_CEILING)
}

/// True if the query asks for documents in this verification state.
pub fn matches_status(query: &str, verified: bool) -> bool {
    let query = query.to_lowercase();
    if verified {
        query.contains("verified")
    } else {
        PENDING_TERMS.iter().any(|t| query.contains(t))
    }
}

/// True if `doc` belongs in the results for `query` under `filter`.
pub fn matches_document(doc: &Document, query: &str, filter: TypeFilter) -> bool {
    if !filter.allows(doc.kind) {
        return false;
    }
    if query.is_empty() {
        return true;
    }

    let name_hit =
        doc.name.to_lowercase().contains(&query.to_lowercase()) || fuzzy_match(query, &doc.name);

    matches_status(query, doc.verified) || name_hit || fuzzy_match(query, &doc.kind.label())
}

/// Filter and rank `docs` for `query` under `filter`.
///
/// With an empty query the input order is preserved and every score is
/// `0.0`. Otherwise results are sorted by score (desc), then verified
/// before unverified, then upload date (newest first).
pub fn search_documents<'a>(
    docs: &'a [Document],
    query: &str,
    filter: TypeFilter,
) -> Vec<RankedDocument<'a>> {
    let mut results: Vec<RankedDocument<'a>> = docs
        .iter()
        .filter(|doc| matches_document(doc, query, filter))
        .map(|document| RankedDocument {
            document,
            score: if query.is_empty() {
                0.0
            } else {
                relevance_score(query, &document.name)
            },
        })
        .collect();

    if query.is_empty() {
        return results;
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.document.verified.cmp(&a.document.verified))
            .then(b.document.upload_date.cmp(&a.document.upload_date))
    });

    results
}
