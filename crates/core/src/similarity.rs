//! Lexical similarity scoring for questions.
//!
//! Pure-Rust, deterministic, and dependency-free. The concrete metric is
//! an implementation choice; what the rest of the system relies on is the
//! ordering guarantee: identical question text scores strictly higher
//! than any non-identical entry. Non-identical questions score by word
//! overlap, scaled into [0, 0.95] so they can never reach the exact-match
//! score of 1.0.

/// Words too common to carry intent. Kept short on purpose — over-filtering
/// hurts short questions more than under-filtering hurts long ones.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "by", "did", "do", "for", "from", "has", "have", "how", "in", "is",
    "it", "many", "much", "of", "on", "or", "that", "the", "there", "to", "was", "were", "what",
    "which", "who", "with",
];

/// Lowercase alphanumeric word tokens of a text.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Tokens that carry intent: lowercase words minus stopwords, deduplicated
/// and sorted. Used both for similarity and as the intent-cluster key
/// during memory consolidation, so it must be deterministic.
pub fn intent_tokens(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = tokenize(text)
        .into_iter()
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect();
    tokens.sort();
    tokens.dedup();
    tokens
}

/// Similarity between two questions in [0.0, 1.0].
///
/// Exactly 1.0 iff the questions are identical after trimming and
/// lowercasing; otherwise Jaccard overlap of intent tokens scaled
/// into [0, 0.95].
pub fn question_similarity(a: &str, b: &str) -> f64 {
    let a_norm = a.trim().to_lowercase();
    let b_norm = b.trim().to_lowercase();
    if a_norm == b_norm && !a_norm.is_empty() {
        return 1.0;
    }

    let a_tokens = intent_tokens(&a_norm);
    let b_tokens = intent_tokens(&b_norm);
    if a_tokens.is_empty() || b_tokens.is_empty() {
        return 0.0;
    }

    let shared = a_tokens.iter().filter(|t| b_tokens.contains(t)).count();
    let union = a_tokens.len() + b_tokens.len() - shared;
    if union == 0 {
        return 0.0;
    }

    0.95 * shared as f64 / union as f64
}

/// True when `token` names or partially names `table` — equality with the
/// full table name or with any underscore-separated name part, with a
/// loose singular/plural match.
pub fn token_matches_table(token: &str, table: &str) -> bool {
    if token == table {
        return true;
    }
    table
        .split('_')
        .any(|part| part == token || strip_plural(part) == strip_plural(token))
}

fn strip_plural(word: &str) -> &str {
    word.strip_suffix('s').unwrap_or(word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_questions_score_one() {
        assert_eq!(question_similarity("who won in 2019", "who won in 2019"), 1.0);
    }

    #[test]
    fn case_and_whitespace_insensitive_exact_match() {
        assert_eq!(question_similarity("Who Won in 2019", "  who won in 2019 "), 1.0);
    }

    #[test]
    fn non_identical_never_reaches_exact_score() {
        let sim = question_similarity(
            "who won the 2019 championship",
            "who won the 2019 championship race",
        );
        assert!(sim > 0.0);
        assert!(sim < 1.0);
        assert!(sim <= 0.95);
    }

    #[test]
    fn unrelated_questions_score_low() {
        let related = question_similarity("who won the championship", "championship winner 2019");
        let unrelated = question_similarity("who won the championship", "average pit stop time");
        assert!(related > unrelated);
    }

    #[test]
    fn empty_text_scores_zero() {
        assert_eq!(question_similarity("", "who won"), 0.0);
        assert_eq!(question_similarity("", ""), 0.0);
    }

    #[test]
    fn stopwords_do_not_create_overlap() {
        let sim = question_similarity("who is the winner", "what was the total");
        assert_eq!(sim, 0.0);
    }

    #[test]
    fn intent_tokens_sorted_and_deduplicated() {
        let tokens = intent_tokens("Wins wins WINS in 2019 races");
        assert_eq!(tokens, vec!["2019", "races", "wins"]);
    }

    #[test]
    fn token_matches_table_name_parts() {
        assert!(token_matches_table("championship", "drivers_championship"));
        assert!(token_matches_table("drivers_championship", "drivers_championship"));
        assert!(token_matches_table("wins", "race_wins"));
        assert!(!token_matches_table("points", "race_wins"));
    }

    #[test]
    fn token_matches_loose_plural() {
        assert!(token_matches_table("driver", "drivers_championship"));
        assert!(token_matches_table("races", "race_wins"));
    }
}
