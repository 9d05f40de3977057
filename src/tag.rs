//! Tag identifiers and per-item tag bit vectors
//!
//! Tags are dense small integers. The legacy snapshot layout stores, for
//! every item, a fixed-width vector with one bit per tag (8 tags per byte);
//! `TagBits` is that vector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a tag (bookmark). Reused after the tag is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TagId(pub u32);

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Identifier of an evidence item inside the declared universe.
pub type ItemId = u32;

/// Number of tags packed into one byte of a `TagBits` vector
pub const TAGS_PER_BYTE: usize = u8::BITS as usize;

/// Fixed-width bit vector holding one bit per tag. Tag `t` lives in byte
/// `t / 8` at bit `t % 8`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TagBits(pub Vec<u8>);

impl TagBits {
    /// Zeroed vector wide enough for `tag_slots` tags
    pub fn with_slots(tag_slots: usize) -> Self {
        TagBits(vec![0; tag_slots.div_ceil(TAGS_PER_BYTE)])
    }

    fn slot(tag: TagId) -> (usize, u8) {
        let t = tag.0 as usize;
        (t / TAGS_PER_BYTE, 1 << (t % TAGS_PER_BYTE))
    }

    /// Check if a tag is set. Tags beyond the width read as unset.
    pub fn contains(&self, tag: TagId) -> bool {
        let (byte, mask) = Self::slot(tag);
        self.0.get(byte).is_some_and(|b| b & mask != 0)
    }

    /// Set a tag. Tags beyond the width are ignored.
    pub fn add(&mut self, tag: TagId) {
        let (byte, mask) = Self::slot(tag);
        if let Some(b) = self.0.get_mut(byte) {
            *b |= mask;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_rounds_up_to_whole_bytes() {
        assert_eq!(TagBits::with_slots(0).0.len(), 0);
        assert_eq!(TagBits::with_slots(1).0.len(), 1);
        assert_eq!(TagBits::with_slots(8).0.len(), 1);
        assert_eq!(TagBits::with_slots(9).0.len(), 2);
    }

    #[test]
    fn test_bit_position_per_tag() {
        let mut bits = TagBits::with_slots(16);
        bits.add(TagId(0));
        bits.add(TagId(7));
        bits.add(TagId(9));
        assert_eq!(bits.0, vec![0b1000_0001, 0b0000_0010]);
    }

    #[test]
    fn test_reads_from_raw_bytes() {
        // byte 1, bit 3 is tag 11
        let bits = TagBits(vec![0, 0b0000_1000]);
        assert!(bits.contains(TagId(11)));
        assert!(!bits.contains(TagId(3)));
        assert!(!bits.contains(TagId(10)));
    }

    #[test]
    fn test_out_of_width() {
        let mut bits = TagBits::with_slots(8);
        bits.add(TagId(20));
        assert_eq!(bits.0, vec![0]);
        assert!(!bits.contains(TagId(20)));
        assert!(!TagBits::default().contains(TagId(0)));
    }
}
