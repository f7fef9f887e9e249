//! Weighted reciprocal-rank fusion of ranked candidate lists.

use std::collections::{HashMap, HashSet};

/// Default rank offset, from the original RRF paper.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// One ranked input to [`reciprocal_rank_fusion`].
#[derive(Debug, Clone, Copy)]
pub struct RankedList<'a> {
    /// `(id, score)` pairs, best first. Only the order is used.
    pub hits: &'a [(String, f32)],
    /// Multiplier applied to this list's rank credit.
    pub weight: f32,
}

impl<'a> RankedList<'a> {
    /// Wrap a ranked list with a fusion weight.
    pub fn new(hits: &'a [(String, f32)], weight: f32) -> Self {
        Self { hits, weight }
    }
}

/// Fuse ranked lists into one ranking.
///
/// Each occurrence of an id at 1-based rank `r` in a list with weight `w`
/// earns `w / (k + r)`; ids found in several lists accumulate credit. The
/// result is sorted by credit, best first. Equal credit keeps the order in
/// which ids were first seen, scanning the lists in the order given. Repeats
/// of an id within one list are ignored.
pub fn reciprocal_rank_fusion(lists: &[RankedList<'_>], k: f32) -> Vec<(String, f32)> {
    let mut fused: Vec<(String, f32)> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();

    for list in lists {
        let mut seen: HashSet<&str> = HashSet::new();
        for (rank, (id, _)) in list.hits.iter().enumerate() {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let credit = list.weight / (k + rank as f32 + 1.0);
            match slots.get(id.as_str()) {
                Some(&slot) => fused[slot].1 += credit,
                None => {
                    slots.insert(id.as_str(), fused.len());
                    fused.push((id.clone(), credit));
                }
            }
        }
    }

    fused.sort_by(|a, b| b.1.total_cmp(&a.1));
    fused
}
