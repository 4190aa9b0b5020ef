//! Weighted position-score fusion for combining retrieval rankings.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use sage_core::defaults::{LEXICAL_WEIGHT, SEMANTIC_WEIGHT};

/// A chunk's fused score plus the list positions that produced it.
#[derive(Debug, Clone, Copy)]
pub struct FusedHit {
    pub chunk_id: Uuid,
    pub score: f32,
    /// 0-based rank in the semantic list, or `usize::MAX` if absent.
    pub semantic_rank: usize,
    /// 0-based rank in the lexical list, or `usize::MAX` if absent.
    pub lexical_rank: usize,
}

/// Fuse a semantic and a lexical ranking into one ordered result.
///
/// Each input is a list of chunk ids in rank order (best first). A chunk at
/// 0-based rank `r` in a list of budget `k` contributes a position score of
/// `1 - r/k` for that list; absence contributes 0. The fused score is
/// `SEMANTIC_WEIGHT * semantic + LEXICAL_WEIGHT * lexical`, merged by chunk
/// id so a chunk in both lists appears once.
///
/// Output is sorted descending by fused score; ties break by the chunk's
/// semantic rank, then its lexical rank. At most `k` hits are returned.
pub fn fuse(semantic: &[Uuid], lexical: &[Uuid], k: usize) -> Vec<FusedHit> {
    if k == 0 {
        return Vec::new();
    }

    let mut hits: HashMap<Uuid, FusedHit> = HashMap::new();

    for (rank, &id) in semantic.iter().enumerate() {
        let score = position_score(rank, k);
        hits.entry(id)
            .or_insert(FusedHit {
                chunk_id: id,
                score: 0.0,
                semantic_rank: usize::MAX,
                lexical_rank: usize::MAX,
            })
            .add_semantic(rank, score);
    }

    for (rank, &id) in lexical.iter().enumerate() {
        let score = position_score(rank, k);
        hits.entry(id)
            .or_insert(FusedHit {
                chunk_id: id,
                score: 0.0,
                semantic_rank: usize::MAX,
                lexical_rank: usize::MAX,
            })
            .add_lexical(rank, score);
    }

    let mut results: Vec<FusedHit> = hits.into_values().collect();
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.semantic_rank.cmp(&b.semantic_rank))
            .then(a.lexical_rank.cmp(&b.lexical_rank))
    });
    results.truncate(k);

    debug!(
        semantic_hits = semantic.len(),
        lexical_hits = lexical.len(),
        result_count = results.len(),
        semantic_weight = SEMANTIC_WEIGHT,
        lexical_weight = LEXICAL_WEIGHT,
        "fusion complete"
    );

    results
}

/// Normalized position score: rank 0 scores 1.0, rank k-1 scores 1/k.
fn position_score(rank: usize, k: usize) -> f32 {
    1.0 - (rank as f32) / (k as f32)
}

impl FusedHit {
    fn add_semantic(&mut self, rank: usize, score: f32) {
        self.semantic_rank = rank;
        self.score += SEMANTIC_WEIGHT * score;
    }

    fn add_lexical(&mut self, rank: usize, score: f32) {
        self.lexical_rank = rank;
        self.score += LEXICAL_WEIGHT * score;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<Uuid> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    #[test]
    fn test_fuse_agreeing_top_hit_wins() {
        let v = ids(3);
        // Same chunk first in both lists.
        let semantic = vec![v[0], v[1], v[2]];
        let lexical = vec![v[0], v[2], v[1]];

        let results = fuse(&semantic, &lexical, 3);
        assert_eq!(results[0].chunk_id, v[0]);
        // Rank 0 in both lists: 0.6 * 1.0 + 0.4 * 1.0.
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fuse_merges_by_chunk_identity() {
        let v = ids(2);
        let results = fuse(&[v[0], v[1]], &[v[1], v[0]], 5);
        // Each chunk appears exactly once.
        assert_eq!(results.len(), 2);
        let unique: std::collections::HashSet<_> = results.iter().map(|h| h.chunk_id).collect();
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_fuse_absent_from_one_list_contributes_zero() {
        let v = ids(2);
        let results = fuse(&[v[0]], &[v[1]], 3);

        let semantic_only = results.iter().find(|h| h.chunk_id == v[0]).unwrap();
        let lexical_only = results.iter().find(|h| h.chunk_id == v[1]).unwrap();

        // Rank 0 of k=3 scores 1.0 in its own list, 0 in the other.
        assert!((semantic_only.score - 0.6).abs() < 1e-6);
        assert!((lexical_only.score - 0.4).abs() < 1e-6);
        // Semantic weight dominates.
        assert_eq!(results[0].chunk_id, v[0]);
    }

    #[test]
    fn test_fuse_symmetric_positions_favor_semantic() {
        let v = ids(2);
        // v0: semantic 0, lexical 1 -> 0.6*1.0 + 0.4*0.5 = 0.8
        // v1: semantic 1, lexical 0 -> 0.6*0.5 + 0.4*1.0 = 0.7
        let results = fuse(&[v[0], v[1]], &[v[1], v[0]], 2);
        assert_eq!(results[0].chunk_id, v[0]);
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn test_fuse_equal_scores_prefer_earlier_semantic_rank() {
        let v = ids(2);
        let a = FusedHit {
            chunk_id: v[0],
            score: 0.5,
            semantic_rank: 1,
            lexical_rank: usize::MAX,
        };
        let b = FusedHit {
            chunk_id: v[1],
            score: 0.5,
            semantic_rank: 2,
            lexical_rank: 0,
        };
        let mut list = vec![b, a];
        list.sort_by(|x, y| {
            y.score
                .partial_cmp(&x.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(x.semantic_rank.cmp(&y.semantic_rank))
                .then(x.lexical_rank.cmp(&y.lexical_rank))
        });
        assert_eq!(list[0].chunk_id, v[0]);
    }

    #[test]
    fn test_fuse_respects_k() {
        let v = ids(10);
        let results = fuse(&v, &[], 4);
        assert_eq!(results.len(), 4);
    }

    #[test]
    fn test_fuse_k_zero() {
        let v = ids(2);
        assert!(fuse(&v, &v, 0).is_empty());
    }

    #[test]
    fn test_fuse_empty_inputs() {
        assert!(fuse(&[], &[], 5).is_empty());
    }

    #[test]
    fn test_fuse_is_deterministic() {
        let v = ids(6);
        let semantic: Vec<Uuid> = v[0..5].to_vec();
        let lexical: Vec<Uuid> = vec![v[5], v[2], v[0], v[4]];

        let first: Vec<Uuid> = fuse(&semantic, &lexical, 5)
            .iter()
            .map(|h| h.chunk_id)
            .collect();
        for _ in 0..20 {
            let again: Vec<Uuid> = fuse(&semantic, &lexical, 5)
                .iter()
                .map(|h| h.chunk_id)
                .collect();
            assert_eq!(again, first);
        }
    }
}
