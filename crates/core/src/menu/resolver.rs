//! Fuzzy name matching between what a person typed and catalog names.
//!
//! Scoring is rule based and deterministic: the first rule that matches
//! decides the score, there is no summation.

use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

use super::catalog::{Catalog, CatalogItem};

pub const SCORE_EXACT: u8 = 100;
pub const SCORE_CANDIDATE_CONTAINS_QUERY: u8 = 80;
pub const SCORE_QUERY_CONTAINS_CANDIDATE: u8 = 70;
pub const SCORE_ALL_TOKENS: u8 = 60;
pub const SCORE_PARTIAL_TOKEN: u8 = 40;

const PARTIAL_TOKEN_MIN_CHARS: usize = 3;

/// Lowercase, strip diacritics, drop hyphens and periods, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let folded: String = text
        .to_lowercase()
        .nfd()
        .filter(|character| !is_combining_mark(*character))
        .filter(|character| !matches!(character, '-' | '.'))
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn tokenize(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

pub fn match_score(query: &str, candidate_name: &str) -> u8 {
    let query = normalize(query);
    let candidate = normalize(candidate_name);
    if query.is_empty() || candidate.is_empty() {
        return 0;
    }

    if query == candidate {
        return SCORE_EXACT;
    }
    if candidate.contains(&query) {
        return SCORE_CANDIDATE_CONTAINS_QUERY;
    }
    if query.contains(&candidate) {
        return SCORE_QUERY_CONTAINS_CANDIDATE;
    }

    let query_tokens = tokenize(&query);
    let candidate_tokens = tokenize(&candidate);

    let all_tokens_match = query_tokens.iter().all(|query_token| {
        candidate_tokens.iter().any(|candidate_token| {
            candidate_token.contains(query_token) || query_token.contains(candidate_token)
        })
    });
    if all_tokens_match {
        return SCORE_ALL_TOKENS;
    }

    let partial_match = query_tokens
        .iter()
        .filter(|query_token| query_token.chars().count() >= PARTIAL_TOKEN_MIN_CHARS)
        .any(|query_token| {
            candidate_tokens
                .iter()
                .any(|candidate_token| tokens_partially_match(query_token, candidate_token))
        });
    if partial_match {
        return SCORE_PARTIAL_TOKEN;
    }

    0
}

fn tokens_partially_match(query_token: &str, candidate_token: &str) -> bool {
    if candidate_token.contains(query_token) {
        return true;
    }
    if candidate_token.chars().count() >= PARTIAL_TOKEN_MIN_CHARS
        && query_token.contains(candidate_token)
    {
        return true;
    }

    let shared_prefix = query_token
        .chars()
        .zip(candidate_token.chars())
        .take_while(|(left, right)| left == right)
        .count();
    shared_prefix >= PARTIAL_TOKEN_MIN_CHARS
}

#[derive(Clone, Debug, PartialEq)]
pub struct CatalogMatch<'a> {
    pub item: &'a CatalogItem,
    pub score: u8,
}

/// Best catalog entry for `query`. Product-sourced entries outrank ingredient-sourced
/// entries regardless of score; zero scores never match.
pub fn resolve<'a>(query: &str, catalog: &'a Catalog) -> Option<CatalogMatch<'a>> {
    let mut candidates = catalog
        .items()
        .iter()
        .map(|item| CatalogMatch { item, score: match_score(query, &item.name) })
        .filter(|candidate| candidate.score > 0)
        .collect::<Vec<_>>();

    candidates.sort_by(|left, right| {
        right
            .item
            .source
            .is_product()
            .cmp(&left.item.source.is_product())
            .then(right.score.cmp(&left.score))
    });

    candidates.into_iter().next()
}

/// Highest scoring entry of a single homogeneous list. Earlier entries win ties.
pub fn best_match<'a, T, F>(query: &str, items: &'a [T], name_of: F) -> Option<(&'a T, u8)>
where
    F: Fn(&T) -> &str,
{
    let mut best: Option<(&'a T, u8)> = None;
    for item in items {
        let score = match_score(query, name_of(item));
        if score == 0 {
            continue;
        }
        if best.map_or(true, |(_, best_score)| score > best_score) {
            best = Some((item, score));
        }
    }
    best
}
