//! Bitmap membership store - one compressed bitmap per live tag
//!
//! Also owns the union cache: the OR of every tag bitmap, materialized on
//! first read and kept until a removal makes it stale.
//!
//! Adds are pushed straight into a materialized union since adding an item
//! to any tag can only grow the union. Removals and tag deletion drop the
//! cache instead: the item may still belong to another tag, and knowing that
//! would need a per-item reference count.

use crate::error::{Result, StoreError};
use crate::tag::{ItemId, TagId};
use parking_lot::Mutex;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
pub struct Membership {
    bitmaps: BTreeMap<TagId, RoaringBitmap>,
    // None means stale; recomputed by the next reader
    union: Mutex<Option<RoaringBitmap>>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing bitmaps, e.g. a loaded snapshot
    pub fn from_bitmaps(bitmaps: BTreeMap<TagId, RoaringBitmap>) -> Self {
        Self {
            bitmaps,
            union: Mutex::new(None),
        }
    }

    /// Smallest tag id with no bitmap
    pub fn next_free_id(&self) -> TagId {
        let mut next = 0;
        for id in self.bitmaps.keys() {
            if id.0 != next {
                break;
            }
            next += 1;
        }
        TagId(next)
    }

    pub fn is_live(&self, tag: TagId) -> bool {
        self.bitmaps.contains_key(&tag)
    }

    /// Create an empty bitmap for `tag`. An existing bitmap is left alone.
    pub fn insert_tag(&mut self, tag: TagId) {
        self.bitmaps.entry(tag).or_default();
    }

    /// Drop the bitmap of `tag`, returning it if it was live
    pub fn remove_tag(&mut self, tag: TagId) -> Option<RoaringBitmap> {
        let removed = self.bitmaps.remove(&tag);
        if removed.as_ref().is_some_and(|b| !b.is_empty()) {
            *self.union.get_mut() = None;
        }
        removed
    }

    pub fn add_members<I>(&mut self, tag: TagId, items: I) -> Result<()>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let bitmap = self.bitmaps.get_mut(&tag).ok_or(StoreError::UnknownTag(tag))?;
        let union = self.union.get_mut();
        for item in items {
            bitmap.insert(item);
            if let Some(u) = union.as_mut() {
                u.insert(item);
            }
        }
        Ok(())
    }

    pub fn remove_members<I>(&mut self, tag: TagId, items: I) -> Result<()>
    where
        I: IntoIterator<Item = ItemId>,
    {
        let bitmap = self.bitmaps.get_mut(&tag).ok_or(StoreError::UnknownTag(tag))?;
        for item in items {
            bitmap.remove(item);
        }
        *self.union.get_mut() = None;
        Ok(())
    }

    pub fn contains(&self, item: ItemId, tag: TagId) -> bool {
        self.bitmaps.get(&tag).is_some_and(|b| b.contains(item))
    }

    /// True if any of `tags` contains `item`
    pub fn contains_any(&self, item: ItemId, tags: &[TagId]) -> bool {
        tags.iter().any(|&t| self.contains(item, t))
    }

    /// Ids of every tag containing `item`, ascending
    pub fn tags_containing(&self, item: ItemId) -> Vec<TagId> {
        self.bitmaps
            .iter()
            .filter(|(_, b)| b.contains(item))
            .map(|(&id, _)| id)
            .collect()
    }

    pub fn cardinality(&self, tag: TagId) -> Option<u64> {
        self.bitmaps.get(&tag).map(|b| b.len())
    }

    pub fn bitmap(&self, tag: TagId) -> Option<&RoaringBitmap> {
        self.bitmaps.get(&tag)
    }

    pub fn bitmaps(&self) -> &BTreeMap<TagId, RoaringBitmap> {
        &self.bitmaps
    }

    /// Copy of the union of all tags, materializing the cache if stale
    pub fn union_all(&self) -> RoaringBitmap {
        let mut cache = self.union.lock();
        cache
            .get_or_insert_with(|| {
                let mut union = RoaringBitmap::new();
                for b in self.bitmaps.values() {
                    union |= b;
                }
                union
            })
            .clone()
    }

    /// True if `item` belongs to at least one tag
    pub fn in_any(&self, item: ItemId) -> bool {
        if let Some(u) = self.union.lock().as_ref() {
            return u.contains(item);
        }
        self.bitmaps.values().any(|b| b.contains(item))
    }

    /// OR of the given tags; tags that are not live contribute nothing
    pub fn union_of(&self, tags: &[TagId]) -> RoaringBitmap {
        let mut union = RoaringBitmap::new();
        for tag in tags {
            if let Some(b) = self.bitmaps.get(tag) {
                union |= b;
            }
        }
        union
    }

    /// OR of the given tags plus every item of `0..=last_id` with no tag
    pub fn union_of_or_untagged(&self, tags: &[TagId], last_id: ItemId) -> RoaringBitmap {
        let mut untagged = RoaringBitmap::new();
        untagged.insert_range(0..=last_id);
        untagged -= &self.union_all();

        let mut union = self.union_of(tags);
        union |= untagged;
        union
    }

    #[cfg(test)]
    fn cache_is_materialized(&self) -> bool {
        self.union.lock().is_some()
    }
}
