// 🔤 String Similarity - edit distance + tiered label score
//
// Tiers, cheapest first:
//   exact           → 1.0
//   containment     → 0.9
//   token overlap   → 0.65 ..= 0.9
//   character typos → 0.56 ..= 0.8   (short labels only)
//   otherwise       → 0.0
//
// The token tier handles reordered / re-punctuated labels such as
// "Framing Labor" vs "Framing - Labor" before any full edit distance runs.

pub const EXACT_SCORE: f64 = 1.0;
pub const CONTAINMENT_SCORE: f64 = 0.9;

const TOKEN_TIER_BASE: f64 = 0.65;
const TOKEN_TIER_SPAN: f64 = 0.25;
const TOKEN_TIER_MIN_OVERLAP: f64 = 0.5;

const TYPO_TIER_MAX_LEN: usize = 30;
const TYPO_TIER_MIN_SIMILARITY: f64 = 0.7;
const TYPO_TIER_WEIGHT: f64 = 0.8;

/// Minimum single-character insertions, deletions and substitutions turning
/// `a` into `b` (Levenshtein, over chars).
pub fn distance(a: &str, b: &str) -> usize {
    strsim::levenshtein(a, b)
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

fn tokenize(value: &str) -> Vec<&str> {
    value
        .split(|c: char| c.is_whitespace() || matches!(c, '-' | '_' | ',' | '&'))
        .filter(|token| token.chars().count() > 1)
        .collect()
}

fn tokens_match(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a) || distance(a, b) <= 1
}

/// Share of tokens on both sides that find a partner on the other side.
/// None when either side has no usable tokens.
fn token_overlap(tokens_a: &[&str], tokens_b: &[&str]) -> Option<f64> {
    if tokens_a.is_empty() || tokens_b.is_empty() {
        return None;
    }

    let matched_a = tokens_a
        .iter()
        .filter(|a| tokens_b.iter().any(|b| tokens_match(a, b)))
        .count();
    let matched_b = tokens_b
        .iter()
        .filter(|b| tokens_a.iter().any(|a| tokens_match(a, b)))
        .count();

    Some((matched_a + matched_b) as f64 / (tokens_a.len() + tokens_b.len()) as f64)
}

/// Similarity of two free-text labels in `[0, 1]`. Symmetric in its arguments.
pub fn score(input: &str, target: &str) -> f64 {
    let a = normalize(input);
    let b = normalize(target);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a == b {
        return EXACT_SCORE;
    }

    if a.contains(&b) || b.contains(&a) {
        return CONTAINMENT_SCORE;
    }

    if let Some(word_score) = token_overlap(&tokenize(&a), &tokenize(&b)) {
        if word_score >= TOKEN_TIER_MIN_OVERLAP {
            return TOKEN_TIER_BASE + word_score * TOKEN_TIER_SPAN;
        }
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a < TYPO_TIER_MAX_LEN && len_b < TYPO_TIER_MAX_LEN {
        let similarity = 1.0 - distance(&a, &b) as f64 / len_a.max(len_b) as f64;
        if similarity >= TYPO_TIER_MIN_SIMILARITY {
            return similarity * TYPO_TIER_WEIGHT;
        }
    }

    0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_classic() {
        assert_eq!(distance("kitten", "sitting"), 3);
        assert_eq!(distance("", "abc"), 3);
        assert_eq!(distance("flaw", "flaw"), 0);
    }

    #[test]
    fn test_exact_after_normalization() {
        assert_eq!(score("Framing Labor", "Framing Labor"), 1.0);
        assert_eq!(score("  framing labor ", "FRAMING LABOR"), 1.0);
        assert_eq!(score("x", "x"), 1.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(score("", "anything"), 0.0);
        assert_eq!(score("anything", ""), 0.0);
        assert_eq!(score("   ", "anything"), 0.0);
    }

    #[test]
    fn test_containment_tier() {
        assert_eq!(score("Plumbing", "Plumbing Rough-In"), CONTAINMENT_SCORE);
        assert_eq!(score("Plumbing Rough-In", "plumbing"), CONTAINMENT_SCORE);
    }

    #[test]
    fn test_token_tier_reordered_and_punctuated() {
        let s = score("Framing Labor", "Framing - Labor");
        assert!(s >= 0.65, "got {}", s);
        assert!(s <= 0.9 + 1e-9);

        let s = score("Labor Framing", "framing_labor");
        assert!((s - 0.9).abs() < 1e-9, "got {}", s);
    }

    #[test]
    fn test_token_tier_tolerates_one_typo_per_token() {
        // "electical" is one edit from "electrical"; "rough" has no partner
        let s = score("Electical Wiring", "Electrical Wiring Rough");
        assert!(s >= 0.65 && s < 0.9, "got {}", s);
    }

    #[test]
    fn test_single_char_tokens_ignored() {
        // "a" and "b" are dropped, leaving no overlap on "drywall" vs "paint"
        assert_eq!(score("a drywall", "b paint"), 0.0);
    }

    #[test]
    fn test_one_edit_single_word_hits_token_tier() {
        assert!((score("insulaton", "insulatin") - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_typo_tier() {
        // transposition = two edits, so the tokens do not pair up;
        // 1 - 2/8 = 0.75, weighted × 0.8
        let s = score("concrete", "concreet");
        assert!((s - 0.6).abs() < 1e-9, "got {}", s);
    }

    #[test]
    fn test_typo_tier_skipped_for_long_labels() {
        let a = "concrete formwork footings pours";
        let b = "concreet fromwork footnigs puors";
        assert!(a.len() >= 30 && b.len() >= 30);
        assert_eq!(score(a, b), 0.0);

        // same kind of typos, short enough for the character tier
        assert!(score("concrete pours", "concreet puors") > 0.0);
    }

    #[test]
    fn test_unrelated_labels() {
        assert_eq!(score("Roofing", "Landscaping"), 0.0);
    }

    #[test]
    fn test_score_symmetry() {
        let pairs = [
            ("Framing Labor", "Framing - Labor"),
            ("Plumbing", "Plumbing Rough-In"),
            ("insulaton", "insulatin"),
            ("HVAC & Ductwork", "ductwork"),
            ("Concrete Flatwork", "Flatwork, Concrete"),
            ("Roofing", "Landscaping"),
            ("Electical Wiring", "Electrical Wiring Rough"),
        ];
        for (a, b) in pairs {
            assert_eq!(score(a, b), score(b, a), "asymmetric for {:?} / {:?}", a, b);
        }
    }

    #[test]
    fn test_score_identity() {
        for label in ["Framing Labor", "HVAC", "Site Work - Phase 2", "é-tile & grout"] {
            assert_eq!(score(label, label), 1.0);
        }
    }
}
