use log::debug;

use crate::{
    error::{FmErr, Result},
    feature::{self, FeatureId, FeatureKey, Range},
};

/// Splits the feature key space into blocks and locates them inside sorted id lists.
pub struct FeatureBlock;

impl FeatureBlock {
    /// Partitions the key space of the given feature groups into blocks.
    ///
    /// # Arguments
    /// * `group_bits` - The amount of key bits holding the group tag, a multiple of 4.
    /// * `groups` - A list of `(tag, partitions)` pairs.
    ///
    /// # Returns
    /// The blocks sorted by key and valid, or an error if the groups are malformed or
    /// would produce empty or overlapping blocks. Blocks of adjacent groups are
    /// contiguous, groups left out of `groups` stay uncovered.
    pub fn partition(group_bits: u32, groups: &[(u64, usize)]) -> Result<Vec<Range>> {
        if group_bits % 4 != 0 || group_bits > u64::BITS {
            return Err(FmErr::InvalidGroupBits {
                bits: group_bits,
                max: u64::BITS,
            });
        }

        let mut blocks = Vec::new();

        for &(tag, parts) in groups {
            if group_bits < u64::BITS && tag >> group_bits != 0 {
                return Err(FmErr::TagOutOfRange {
                    tag,
                    bits: group_bits,
                });
            }

            if parts == 0 {
                return Err(FmErr::ZeroPartitions { tag });
            }

            let begin = feature::group_begin(tag, group_bits);
            let space = Range::new(begin, begin | feature::group_mask(group_bits));

            if parts as u64 > space.len() {
                return Err(FmErr::EmptySegment { tag, idx: 0, parts });
            }
            blocks.reserve(parts);

            for idx in 0..parts {
                let block = space.segment(idx, parts);
                if block.is_empty() {
                    return Err(FmErr::EmptySegment { tag, idx, parts });
                }

                blocks.push(block);
            }
        }

        blocks.sort_unstable_by_key(|block| block.begin);

        for idx in 1..blocks.len() {
            let next_begin = blocks[idx].begin;
            let before = &mut blocks[idx - 1];

            // the group mask leaves out the last key of every group
            if before.end < next_begin {
                before.end += 1;
                if before.end < next_begin {
                    debug!(
                        block = idx - 1, gap = next_begin - before.end;
                        "leaving gap between feature blocks"
                    );
                }
            }

            if before.end > next_begin {
                return Err(FmErr::OverlappingBlocks {
                    idx: idx - 1,
                    end: before.end,
                    next_begin,
                });
            }
        }

        Ok(blocks)
    }

    /// Finds the position range of every block inside a list of feature ids.
    ///
    /// The search cursor only moves forward, so each block is searched in the
    /// suffix left by the previous one.
    ///
    /// # Arguments
    /// * `ids` - Feature ids sorted ascending in key order.
    /// * `blocks` - Sorted, non-overlapping, valid blocks.
    ///
    /// # Returns
    /// One position range per block, in block order, or an error if `blocks` is malformed.
    pub fn find_position(ids: &[FeatureId], blocks: &[Range]) -> Result<Vec<Range>> {
        Self::validate(blocks)?;
        debug_assert!(
            ids.is_sorted_by_key(|&id| FeatureKey::of(id)),
            "feature ids must be sorted in key order"
        );

        let mut cur = 0;
        let mut positions = Vec::with_capacity(blocks.len());

        for block in blocks {
            let rest = &ids[cur..];
            let lb = cur + rest.partition_point(|&id| FeatureKey::of(id).get() < block.begin);

            let rest = &ids[lb..];
            let ub = lb + rest.partition_point(|&id| FeatureKey::of(id).get() < block.end);

            positions.push(Range::new(lb as u64, ub as u64));
            cur = ub;
        }

        Ok(positions)
    }

    /// Checks every block is valid and no block overlaps its successor.
    pub fn validate(blocks: &[Range]) -> Result<()> {
        for (idx, block) in blocks.iter().enumerate() {
            if !block.valid() {
                return Err(FmErr::InvalidBlock {
                    idx,
                    begin: block.begin,
                    end: block.end,
                });
            }
        }

        for (idx, pair) in blocks.windows(2).enumerate() {
            if pair[0].end > pair[1].begin {
                return Err(FmErr::OverlappingBlocks {
                    idx,
                    end: pair[0].end,
                    next_begin: pair[1].begin,
                });
            }
        }

        Ok(())
    }
}
