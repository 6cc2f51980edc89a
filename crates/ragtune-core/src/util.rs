//! Small shared helpers used by more than one component.

use std::collections::HashSet;

/// Case-folded Jaccard similarity over whitespace-delimited tokens. Shared by
/// [`crate::estimator::SimilarityEstimator`] (boosting candidates near
/// reranked winners) and [`crate::reformulator`] (near-duplicate filtering),
/// which both need one notion of "how similar are these two strings"
/// without depending on an embedding model.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let tokens = |s: &str| -> HashSet<String> {
        s.to_lowercase()
            .split_whitespace()
            .map(|t| t.to_string())
            .collect()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
