// 🎯 Category Matcher - pick the budget category an uncategorized label belongs to
//
// Each candidate is scored against both its canonical and its raw
// (builder-supplied) name; the better of the two counts. The strictly highest
// score at or above the threshold wins, ties go to the earliest candidate.

use crate::entities::BudgetLine;
use crate::similarity;
use serde::Serialize;

pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// Anything with a canonical name and optionally a raw one.
pub trait MatchCandidate {
    fn canonical_name(&self) -> &str;
    fn raw_name(&self) -> Option<&str>;
}

impl MatchCandidate for BudgetLine {
    fn canonical_name(&self) -> &str {
        &self.category
    }

    fn raw_name(&self) -> Option<&str> {
        self.raw_category.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryMatch<'a, C> {
    pub candidate: &'a C,
    pub score: f64,
}

pub struct CategoryMatcher {
    /// Minimum score a candidate needs (default: 0.6)
    pub threshold: f64,
}

impl CategoryMatcher {
    pub fn new() -> Self {
        CategoryMatcher {
            threshold: DEFAULT_MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(threshold: f64) -> Self {
        CategoryMatcher { threshold }
    }

    /// Score of `label` against one candidate: best of raw and canonical name.
    pub fn candidate_score<C: MatchCandidate>(&self, label: &str, candidate: &C) -> f64 {
        let canonical = similarity::score(label, candidate.canonical_name());
        let raw = candidate
            .raw_name()
            .map(|raw| similarity::score(label, raw))
            .unwrap_or(0.0);
        raw.max(canonical)
    }

    pub fn find_best_match<'a, C: MatchCandidate>(
        &self,
        label: &str,
        candidates: &'a [C],
    ) -> Option<CategoryMatch<'a, C>> {
        let mut best: Option<CategoryMatch<'a, C>> = None;

        for candidate in candidates {
            let score = self.candidate_score(label, candidate);
            if score < self.threshold {
                continue;
            }
            let better = match &best {
                Some(current) => score > current.score,
                None => true,
            };
            if better {
                best = Some(CategoryMatch { candidate, score });
            }
        }

        best
    }
}

impl Default for CategoryMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper over `CategoryMatcher::find_best_match`.
pub fn find_best_match<'a, C: MatchCandidate>(
    label: &str,
    candidates: &'a [C],
    threshold: f64,
) -> Option<CategoryMatch<'a, C>> {
    CategoryMatcher::with_threshold(threshold).find_best_match(label, candidates)
}

// ============================================================================
// TESTS
// ============================================================================
