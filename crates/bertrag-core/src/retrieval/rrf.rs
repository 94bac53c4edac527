//! Reciprocal Rank Fusion.
//!
//! Grounded directly on the teacher's `search/hybrid.rs::reciprocal_rank_fusion`
//! (same `1 / (k + rank)` formula), generalized from two input rankings to
//! an arbitrary number so the hybrid path can fuse dense + BM25 + salience.

/// Fuse any number of rankings (each a list of `(index, score)` pairs,
/// already sorted by score descending) via RRF: `score(d) = sum 1/(k +
/// rank_i(d))` over the lists containing `d`. Lists that omit an index
/// simply contribute nothing for it — this is what makes RRF tolerant of
/// partial rankings (e.g. segments without an embedding are absent from
/// the dense ranking).
///
/// Returns `(index, fused_score)` pairs sorted by fused score descending,
/// ties broken by ascending index.
pub fn reciprocal_rank_fusion(rankings: &[Vec<usize>], k: f32) -> Vec<(usize, f32)> {
    use std::collections::HashMap;

    let mut fused: HashMap<usize, f32> = HashMap::new();
    for ranking in rankings {
        for (rank, &idx) in ranking.iter().enumerate() {
            *fused.entry(idx).or_insert(0.0) += 1.0 / (k + (rank + 1) as f32);
        }
    }

    let mut result: Vec<(usize, f32)> = fused.into_iter().collect();
    result.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    result
}

/// Build a ranking (descending by score) over `scores`, a dense `index ->
/// score` vector, keeping only indices whose score is `Some`.
pub fn rank_from_scores(scores: &[Option<f32>]) -> Vec<usize> {
    let mut indices: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.map(|_| i))
        .collect();
    indices.sort_by(|&a, &b| {
        scores[b]
            .partial_cmp(&scores[a])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });
    indices
}

/// Linear combination (legacy weighted-sum) fusion:
/// `retrieval_score = alpha * query_similarity + (1 - alpha) * salience`.
pub fn weighted_sum(query_similarity: f32, salience: f32, alpha: f32) -> f32 {
    alpha * query_similarity + (1.0 - alpha) * salience
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rrf_rewards_items_ranked_highly_in_multiple_lists() {
        let a = vec![0, 1, 2];
        let b = vec![1, 0, 2];
        let fused = reciprocal_rank_fusion(&[a, b], 60.0);
        // item 1 is rank 2 then rank 1; item 0 is rank 1 then rank 2 -> tie in sum,
        // but item 0 wins ties via ascending index since scores are equal.
        assert_eq!(fused[0].0, 0);
    }

    #[test]
    fn rrf_is_monotone_in_rank_improvement() {
        let dense = vec![0, 1, 2, 3];
        let bm25_before = vec![4, 5, 6, 7, 8, 9, 10, 11, 0, 12];
        let bm25_after = vec![0, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let salience = vec![0, 1, 2, 3];

        let before = reciprocal_rank_fusion(&[dense.clone(), bm25_before, salience.clone()], 60.0);
        let after = reciprocal_rank_fusion(&[dense, bm25_after, salience], 60.0);

        let score_before = before.iter().find(|(i, _)| *i == 0).unwrap().1;
        let score_after = after.iter().find(|(i, _)| *i == 0).unwrap().1;
        assert!(score_after > score_before);

        let rank_before = before.iter().position(|(i, _)| *i == 0).unwrap();
        let rank_after = after.iter().position(|(i, _)| *i == 0).unwrap();
        assert!(rank_after <= rank_before);
    }

    #[test]
    fn missing_from_a_ranking_contributes_nothing() {
        let dense = vec![0, 1];
        let salience = vec![1, 0];
        let fused = reciprocal_rank_fusion(&[dense, salience], 60.0);
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn rank_from_scores_skips_none() {
        let scores = vec![Some(0.9), None, Some(0.5)];
        let ranking = rank_from_scores(&scores);
        assert_eq!(ranking, vec![0, 2]);
    }
}
