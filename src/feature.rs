//! Feature identifiers and the key order every block operation relies on.
//!
//! Feature ids are compared through [`FeatureKey`], the byte-reversed id. A
//! feature group owns the top bits of the key, so a group is one contiguous
//! key interval even though its raw ids are spread over the whole `u64` line.
//! Never sort or search raw ids directly.

/// A raw 64-bit feature identifier as produced by the feature hasher.
pub type FeatureId = u64;

/// The comparison key of a feature: its id with the byte order reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FeatureKey(u64);

impl FeatureKey {
    /// Maps a raw id into key order.
    #[inline]
    pub fn of(id: FeatureId) -> Self {
        Self(id.swap_bytes())
    }

    /// Wraps a value that is already in key order.
    #[inline]
    pub fn from_key(key: u64) -> Self {
        Self(key)
    }

    /// Builds the raw id of the feature `local` inside group `tag`.
    ///
    /// `local` is truncated to the bits left free by the group tag.
    pub fn with_group(tag: u64, local: u64, bits: u32) -> FeatureId {
        let key = group_begin(tag, bits) | (local & group_mask(bits));
        Self(key).raw()
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }

    /// Maps the key back to the raw id.
    #[inline]
    pub fn raw(self) -> FeatureId {
        self.0.swap_bytes()
    }

    /// The feature group tag stored in the top `bits` bits of the key.
    #[inline]
    pub fn group(self, bits: u32) -> u64 {
        // `bits == 0` would shift by 64.
        self.0.checked_shr(u64::BITS - bits).unwrap_or(0)
    }
}

/// The first key of group `tag`.
pub(crate) fn group_begin(tag: u64, bits: u32) -> u64 {
    tag.checked_shl(u64::BITS - bits).unwrap_or(0)
}

/// The mask of the key bits below the group tag.
pub(crate) fn group_mask(bits: u32) -> u64 {
    u64::MAX.checked_shr(bits).unwrap_or(0)
}

/// Sorts raw ids ascending in key order.
pub fn sort_by_key(ids: &mut [FeatureId]) {
    ids.sort_unstable_by_key(|&id| FeatureKey::of(id));
}

/// A half-open interval `[begin, end)`.
///
/// Used both for key ranges (feature blocks, store ranges) and for positions
/// into a sorted id list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    /// The whole key space.
    pub const ALL: Range = Range {
        begin: 0,
        end: u64::MAX,
    };

    pub fn new(begin: u64, end: u64) -> Self {
        Self { begin, end }
    }

    /// Whether `begin <= end`.
    pub fn valid(&self) -> bool {
        self.begin <= self.end
    }

    /// The width of the interval, `0` when invalid.
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.begin)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, value: u64) -> bool {
        self.begin <= value && value < self.end
    }

    /// Returns the `idx`-th of `parts` equal-width, contiguous sub-intervals.
    ///
    /// # Panics
    /// If `parts` is zero, `idx >= parts`, or the range is invalid.
    pub fn segment(&self, idx: usize, parts: usize) -> Range {
        assert!(self.valid(), "segmenting an invalid range {self:?}");
        assert!(idx < parts, "segment {idx} out of {parts}");

        let width = self.len() as u128;
        let begin = self.begin as u128;
        let at = |i: usize| (begin + width * i as u128 / parts as u128) as u64;

        Range::new(at(idx), at(idx + 1))
    }
}

impl From<std::ops::Range<u64>> for Range {
    fn from(value: std::ops::Range<u64>) -> Self {
        Self::new(value.start, value.end)
    }
}

impl From<Range> for std::ops::Range<usize> {
    fn from(value: Range) -> Self {
        value.begin as usize..value.end as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_reverses_bytes() {
        let id = 0x0102_0304_0506_0708;
        let key = FeatureKey::of(id);

        assert_eq!(key.get(), 0x0807_0605_0403_0201);
        assert_eq!(key.raw(), id);
    }

    #[test]
    fn group_is_contiguous_in_key_order() {
        let bits = 8;
        let mut ids: Vec<_> = (0..50u64)
            .flat_map(|i| [FeatureKey::with_group(2, i * 977, bits), FeatureKey::with_group(1, i, bits)])
            .collect();

        sort_by_key(&mut ids);

        let groups: Vec<_> = ids.iter().map(|&id| FeatureKey::of(id).group(bits)).collect();
        assert!(groups[..50].iter().all(|&g| g == 1));
        assert!(groups[50..].iter().all(|&g| g == 2));
    }

    #[test]
    fn raw_ids_of_a_group_are_scattered() {
        let bits = 4;
        let a = FeatureKey::with_group(3, 0, bits);
        let b = FeatureKey::with_group(3, 1 << 40, bits);
        let c = FeatureKey::with_group(4, 0, bits);

        assert!(a < c && c < b);
    }

    #[test]
    fn zero_group_bits() {
        let key = FeatureKey::of(u64::MAX);
        assert_eq!(key.group(0), 0);
        assert_eq!(group_begin(0, 0), 0);
        assert_eq!(group_mask(0), u64::MAX);
    }

    #[test]
    fn segments_are_contiguous_and_cover() {
        let range = Range::new(7, 1000);
        let parts = 7;

        let segs: Vec<_> = (0..parts).map(|i| range.segment(i, parts)).collect();

        assert_eq!(segs[0].begin, range.begin);
        assert_eq!(segs[parts - 1].end, range.end);
        for w in segs.windows(2) {
            assert_eq!(w[0].end, w[1].begin);
        }
    }

    #[test]
    fn segment_of_full_width_does_not_overflow() {
        let range = Range::new(0, u64::MAX);
        let last = range.segment(3, 4);

        assert_eq!(last.end, u64::MAX);
        assert!(last.begin > u64::MAX / 2);
    }

    #[test]
    fn range_validity() {
        assert!(Range::new(3, 3).valid());
        assert!(Range::new(3, 3).is_empty());
        assert!(!Range::new(4, 3).valid());
        assert_eq!(Range::new(4, 3).len(), 0);
        assert!(Range::new(1, 3).contains(2));
        assert!(!Range::new(1, 3).contains(3));
    }
}
