//! Selection tracking - the "checked" flag of every item
//!
//! Items are enumerated by an `ItemDomain` supplied by the owning case.

use crate::tag::ItemId;

/// The set of items that exist in a case
pub trait ItemDomain: Send + Sync {
    /// Number of items that actually exist
    fn total_items(&self) -> u32;

    /// Highest item id in the case
    fn last_id(&self) -> ItemId;

    /// Ids of every existing item
    fn item_ids(&self) -> Box<dyn Iterator<Item = ItemId> + '_>;
}

/// Domain where every id in `0..=last_id` exists
#[derive(Debug, Clone, Copy)]
pub struct DenseDomain {
    pub last_id: ItemId,
}

impl ItemDomain for DenseDomain {
    fn total_items(&self) -> u32 {
        self.last_id.saturating_add(1)
    }

    fn last_id(&self) -> ItemId {
        self.last_id
    }

    fn item_ids(&self) -> Box<dyn Iterator<Item = ItemId> + '_> {
        Box::new(0..=self.last_id)
    }
}

/// Domain with gaps, given as an explicit id list
#[derive(Debug, Clone)]
pub struct ItemList {
    ids: Vec<ItemId>,
    last_id: ItemId,
}

impl ItemList {
    pub fn new(mut ids: Vec<ItemId>) -> Self {
        ids.sort_unstable();
        ids.dedup();
        let last_id = ids.last().copied().unwrap_or(0);
        Self { ids, last_id }
    }
}

impl ItemDomain for ItemList {
    fn total_items(&self) -> u32 {
        u32::try_from(self.ids.len()).unwrap_or(u32::MAX)
    }

    fn last_id(&self) -> ItemId {
        self.last_id
    }

    fn item_ids(&self) -> Box<dyn Iterator<Item = ItemId> + '_> {
        Box::new(self.ids.iter().copied())
    }
}

/// Dense checked flags with a running count of set entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    checked: Vec<bool>,
    count: usize,
}

impl Selection {
    /// All-unchecked selection over `len` ids
    pub fn new(len: usize) -> Self {
        Self {
            checked: vec![false; len],
            count: 0,
        }
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.checked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checked.is_empty()
    }

    /// Set one item. Returns true if its state changed.
    pub fn set_checked(&mut self, item: ItemId, value: bool) -> bool {
        let Some(slot) = self.checked.get_mut(item as usize) else {
            log::debug!("ignoring checked flag for item {} outside the universe", item);
            return false;
        };
        if *slot == value {
            return false;
        }
        *slot = value;
        if value {
            self.count += 1;
        } else {
            self.count -= 1;
        }
        true
    }

    pub fn is_checked(&self, item: ItemId) -> bool {
        self.checked.get(item as usize).copied().unwrap_or(false)
    }

    /// Check every item the domain enumerates
    pub fn check_all(&mut self, domain: &dyn ItemDomain) {
        for item in domain.item_ids() {
            self.set_checked(item, true);
        }
    }

    pub fn clear_all(&mut self) {
        self.checked.fill(false);
        self.count = 0;
    }

    /// Count of checked items, O(1)
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn as_slice(&self) -> &[bool] {
        &self.checked
    }

    /// Copy flags from `flags`, truncated or padded to this selection's length
    pub fn restore_from(&mut self, flags: &[bool]) {
        let len = flags.len().min(self.checked.len());
        self.checked.fill(false);
        self.checked[..len].copy_from_slice(&flags[..len]);
        self.count = self.checked.iter().filter(|&&c| c).count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_tracks_transitions() {
        let mut s = Selection::new(5);
        assert!(s.set_checked(1, true));
        assert!(!s.set_checked(1, true));
        assert!(s.set_checked(3, true));
        assert_eq!(s.count(), 2);
        assert!(s.set_checked(1, false));
        assert!(!s.set_checked(1, false));
        assert_eq!(s.count(), 1);
        assert!(s.is_checked(3));
        assert!(!s.is_checked(1));
    }

    #[test]
    fn test_out_of_range_is_ignored() {
        let mut s = Selection::new(2);
        assert!(!s.set_checked(10, true));
        assert_eq!(s.count(), 0);
        assert!(!s.is_checked(10));
    }

    #[test]
    fn test_check_all_uses_domain() {
        let mut s = Selection::new(10);
        let domain = ItemList::new(vec![0, 4, 9]);
        s.check_all(&domain);
        assert_eq!(s.count(), domain.total_items() as usize);
        assert!(s.is_checked(4));
        assert!(!s.is_checked(5));

        s.clear_all();
        assert_eq!(s.count(), 0);
        assert!(!s.is_checked(4));
    }

    #[test]
    fn test_domain_counts() {
        let list = ItemList::new(vec![7, 2, 7, 0]);
        assert_eq!(list.total_items(), 3);
        assert_eq!(list.last_id(), 7);
        assert_eq!(list.item_ids().collect::<Vec<_>>(), vec![0, 2, 7]);

        let empty = ItemList::new(Vec::new());
        assert_eq!(empty.total_items(), 0);

        // the full id range has 2^32 items, which saturates
        let full = DenseDomain { last_id: u32::MAX };
        assert_eq!(full.total_items(), u32::MAX);
        assert_eq!(DenseDomain { last_id: 9 }.total_items(), 10);
    }

    #[test]
    fn test_check_all_dense() {
        let mut s = Selection::new(4);
        s.set_checked(2, true);
        s.check_all(&DenseDomain { last_id: 3 });
        assert_eq!(s.count(), 4);
    }

    #[test]
    fn test_restore_truncates_and_pads() {
        let mut s = Selection::new(3);
        s.restore_from(&[true, false, true, true, true]);
        assert_eq!(s.as_slice(), &[true, false, true]);
        assert_eq!(s.count(), 2);

        let mut s = Selection::new(4);
        s.restore_from(&[true]);
        assert_eq!(s.as_slice(), &[true, false, false, false]);
        assert_eq!(s.count(), 1);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn should_keep_count_equal_to_scan(
                ops in prop::collection::vec((0u32..40, any::<bool>()), 0..100)
            ) {
                let mut s = Selection::new(32);
                for (item, value) in ops {
                    s.set_checked(item, value);
                    let scanned = s.as_slice().iter().filter(|&&c| c).count();
                    prop_assert_eq!(s.count(), scanned);
                }
            }
        }
    }
}
