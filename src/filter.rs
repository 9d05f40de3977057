//! Result filtering over ordered search results
//!
//! A `ResultSet` is the ordered id sequence handed over by the search layer.
//! Filtering marks rejected positions with `EXCLUDED`, then compacts: the
//! survivors shift left in their original order and the length shrinks.

use crate::selection::Selection;
use crate::tag::ItemId;
use roaring::RoaringBitmap;

/// Marker for a position excluded from the result
pub const EXCLUDED: i32 = -1;

/// Ordered search hits, each an item id with a score
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultSet {
    ids: Vec<i32>,
    scores: Vec<f32>,
}

impl ResultSet {
    /// Hits with zero scores
    pub fn new(ids: Vec<i32>) -> Self {
        let scores = vec![0.0; ids.len()];
        Self { ids, scores }
    }

    /// Hits with scores. Extra entries of the longer vector are dropped.
    pub fn with_scores(mut ids: Vec<i32>, mut scores: Vec<f32>) -> Self {
        let len = ids.len().min(scores.len());
        ids.truncate(len);
        scores.truncate(len);
        Self { ids, scores }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn id(&self, pos: usize) -> Option<i32> {
        self.ids.get(pos).copied()
    }

    pub fn ids(&self) -> &[i32] {
        &self.ids
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    /// Mark a position as excluded; takes effect on the next `compact`
    pub fn exclude(&mut self, pos: usize) {
        if let Some(id) = self.ids.get_mut(pos) {
            *id = EXCLUDED;
        }
    }

    /// Drop excluded positions, keeping the order of the rest
    pub fn compact(&mut self) {
        let mut kept = 0;
        for pos in 0..self.ids.len() {
            if self.ids[pos] < 0 {
                continue;
            }
            self.ids[kept] = self.ids[pos];
            self.scores[kept] = self.scores[pos];
            kept += 1;
        }
        self.ids.truncate(kept);
        self.scores.truncate(kept);
    }

    /// Exclude every live entry failing `keep`, then compact
    pub fn retain_items<F>(&mut self, mut keep: F)
    where
        F: FnMut(ItemId) -> bool,
    {
        for pos in 0..self.ids.len() {
            let id = self.ids[pos];
            if id >= 0 && !keep(id as ItemId) {
                self.ids[pos] = EXCLUDED;
            }
        }
        self.compact();
    }
}

/// Keep items present in `bitmap`
pub fn retain_in(result: &mut ResultSet, bitmap: &RoaringBitmap) {
    result.retain_items(|item| bitmap.contains(item));
}

/// Keep items absent from `bitmap`
pub fn retain_not_in(result: &mut ResultSet, bitmap: &RoaringBitmap) {
    result.retain_items(|item| !bitmap.contains(item));
}

/// Keep checked items
pub fn retain_checked(result: &mut ResultSet, selection: &Selection) {
    result.retain_items(|item| selection.is_checked(item));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compact_drops_sentinels_in_order() {
        let mut r = ResultSet::with_scores(vec![4, -1, 2, -1, 7], vec![0.9, 0.8, 0.7, 0.6, 0.5]);
        r.compact();
        assert_eq!(r.ids(), &[4, 2, 7]);
        assert_eq!(r.scores(), &[0.9, 0.7, 0.5]);
    }

    #[test]
    fn test_exclude_then_compact() {
        let mut r = ResultSet::new(vec![1, 2, 3]);
        r.exclude(1);
        r.exclude(10);
        r.compact();
        assert_eq!(r.ids(), &[1, 3]);
    }

    #[test]
    fn test_retain_in_bitmap() {
        let bitmap: RoaringBitmap = [1, 3].into_iter().collect();
        let mut r = ResultSet::new(vec![3, 2, -1, 1, 0]);
        retain_in(&mut r, &bitmap);
        assert_eq!(r.ids(), &[3, 1]);

        let mut r = ResultSet::new(vec![3, 2, -1, 1, 0]);
        retain_not_in(&mut r, &bitmap);
        assert_eq!(r.ids(), &[2, 0]);
    }

    #[test]
    fn test_retain_checked() {
        let mut s = Selection::new(5);
        s.set_checked(4, true);
        s.set_checked(0, true);
        let mut r = ResultSet::new(vec![0, 1, 2, 3, 4]);
        retain_checked(&mut r, &s);
        assert_eq!(r.ids(), &[0, 4]);
    }

    #[test]
    fn test_empty() {
        let mut r = ResultSet::default();
        r.retain_items(|_| true);
        assert!(r.is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn should_preserve_order_of_survivors(
                ids in prop::collection::vec(-1i32..50, 0..60),
                keep in prop::collection::hash_set(0u32..50, 0..50),
            ) {
                let expected: Vec<i32> = ids
                    .iter()
                    .copied()
                    .filter(|&id| id >= 0 && keep.contains(&(id as u32)))
                    .collect();

                let mut r = ResultSet::new(ids);
                r.retain_items(|item| keep.contains(&item));

                prop_assert_eq!(r.len(), expected.len());
                prop_assert_eq!(r.ids(), expected.as_slice());
                prop_assert_eq!(r.scores().len(), r.len());
            }
        }
    }
}
