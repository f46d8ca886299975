//! Closest-match suggestions for mistyped identifiers.

/// Similarity ratio below which a candidate is not suggested.
pub const DEFAULT_CUTOFF: f64 = 0.6;

/// Maximum number of suggestions returned by [`close_matches`].
pub const DEFAULT_LIMIT: usize = 3;

/// Levenshtein distance over chars.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Similarity in `[0, 1]`; `1.0` means identical.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = 1.0 - edit_distance(a, b) as f64 / longest as f64;
    ratio
}

/// Candidates at least `cutoff` similar to `word`, best first, at most `limit` of them.
///
/// Ties keep the candidates' original order.
pub fn close_matches<'a, I>(word: &str, candidates: I, cutoff: f64, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut scored: Vec<(f64, &str)> = candidates
        .into_iter()
        .map(|candidate| (similarity(word, candidate), candidate))
        .filter(|(score, _)| *score >= cutoff)
        .collect();
    scored.sort_by(|left, right| right.0.total_cmp(&left.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, candidate)| candidate.to_string())
        .collect()
}

/// [`close_matches`] with the default cutoff and limit.
pub fn suggest<'a, I>(word: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    close_matches(word, candidates, DEFAULT_CUTOFF, DEFAULT_LIMIT)
}

/// Human-readable tail appended to error messages; empty when there is nothing to suggest.
#[must_use]
pub fn suggestions_message(suggestions: &[String]) -> String {
    match suggestions {
        [] => String::new(),
        [only] => format!("\nDid you mean: {only:?}"),
        many => {
            let quoted: Vec<String> = many.iter().map(|s| format!("{s:?}")).collect();
            format!("\nDid you mean one of: {}", quoted.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_basics() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("", "abc"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
    }

    #[test]
    fn suggests_typos_best_first() {
        let keys = ["orders", "order_items", "customers"];
        let found = suggest("ordrs", keys.iter().copied());
        assert_eq!(found.first().map(String::as_str), Some("orders"));
        assert!(!found.contains(&"customers".to_string()));
    }

    #[test]
    fn nothing_close_means_no_suggestions() {
        let found = suggest("zzz", ["alpha", "beta"].iter().copied());
        assert!(found.is_empty());
        assert_eq!(suggestions_message(&found), "");
    }

    #[test]
    fn message_formats_one_and_many() {
        assert_eq!(suggestions_message(&["a".into()]), "\nDid you mean: \"a\"");
        assert_eq!(
            suggestions_message(&["a".into(), "b".into()]),
            "\nDid you mean one of: \"a\", \"b\""
        );
    }
}
