use rayon::prelude::*;

use crate::{
    error::{FmErr, Result},
    feature::{FeatureId, FeatureKey},
};

/// Only one of every `SAMPLE_STRIDE` rows is inspected.
pub const SAMPLE_STRIDE: usize = 10;

/// Row blocks at least this long are sampled in parallel.
const PAR_MIN_ROWS: usize = 1 << 14;

/// The widest supported group tag, the histogram has `2^MAX_GROUP_BITS` buckets.
const MAX_GROUP_BITS: u32 = 16;

/// A batch of sparse rows in compressed sparse row layout.
#[derive(Debug, Clone, Copy)]
pub struct RowBlock<'a> {
    offsets: &'a [usize],
    indices: &'a [FeatureId],
}

impl<'a> RowBlock<'a> {
    /// Creates a new `RowBlock`.
    ///
    /// # Arguments
    /// * `offsets` - `rows + 1` non-decreasing offsets into `indices`.
    /// * `indices` - The nonzero feature ids of every row, concatenated.
    ///
    /// # Returns
    /// A new `RowBlock` or an error if the offsets don't describe `indices`.
    pub fn new(offsets: &'a [usize], indices: &'a [FeatureId]) -> Result<Self> {
        let Some(&last) = offsets.last() else {
            return Err(FmErr::InvalidRowBlock("offsets can't be empty".into()));
        };

        if !offsets.is_sorted() {
            return Err(FmErr::InvalidRowBlock("offsets must be non-decreasing".into()));
        }

        if offsets[0] != 0 || last != indices.len() {
            return Err(FmErr::InvalidRowBlock(format!(
                "offsets span [{}, {last}) but there are {} indices",
                offsets[0],
                indices.len()
            )));
        }

        Ok(Self { offsets, indices })
    }

    /// The amount of rows in the block.
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The feature ids of row `i`.
    pub fn row(&self, i: usize) -> &'a [FeatureId] {
        &self.indices[self.offsets[i]..self.offsets[i + 1]]
    }
}

/// Sampled nonzero counts per feature group.
///
/// The buffer holds one counter per group tag followed by the number of
/// sampled rows and the number of rows seen.
#[derive(Debug, Clone)]
pub struct GroupStats {
    nbit: u32,
    value: Vec<u64>,
}

impl GroupStats {
    /// Creates a new `GroupStats` counter.
    ///
    /// # Arguments
    /// * `nbit` - The amount of key bits holding the group tag, a multiple of 4 up to 16.
    pub fn new(nbit: u32) -> Result<Self> {
        if nbit % 4 != 0 || nbit > MAX_GROUP_BITS {
            return Err(FmErr::InvalidGroupBits {
                bits: nbit,
                max: MAX_GROUP_BITS,
            });
        }

        Ok(Self {
            nbit,
            value: vec![0; (1 << nbit) + 2],
        })
    }

    fn buckets(&self) -> usize {
        1 << self.nbit
    }

    /// Counts the group of every feature in every `SAMPLE_STRIDE`-th row.
    pub fn add(&mut self, rows: &RowBlock<'_>) {
        let buckets = self.buckets();
        let nbit = self.nbit;

        let count = |mut hist: Vec<u64>, i: usize| {
            for &id in rows.row(i) {
                hist[FeatureKey::of(id).group(nbit) as usize] += 1;
            }
            hist
        };

        let hist = if rows.len() >= PAR_MIN_ROWS {
            (0..rows.len())
                .into_par_iter()
                .step_by(SAMPLE_STRIDE)
                .fold(|| vec![0; buckets], count)
                .reduce(
                    || vec![0; buckets],
                    |mut a, b| {
                        a.iter_mut().zip(b).for_each(|(x, y)| *x += y);
                        a
                    },
                )
        } else {
            (0..rows.len())
                .step_by(SAMPLE_STRIDE)
                .fold(vec![0; buckets], count)
        };

        self.value[..buckets]
            .iter_mut()
            .zip(hist)
            .for_each(|(acc, n)| *acc += n);

        self.value[buckets] += rows.len().div_ceil(SAMPLE_STRIDE) as u64;
        self.value[buckets + 1] += rows.len() as u64;
    }

    /// The raw accumulated counters, unscaled.
    pub fn get(&self) -> &[u64] {
        &self.value
    }

    /// The sampled rows and the total rows seen so far.
    pub fn rows(&self) -> (u64, u64) {
        let buckets = self.buckets();
        (self.value[buckets], self.value[buckets + 1])
    }

    /// Per group nonzero counts rescaled to the whole data seen so far.
    pub fn estimated_density(&self) -> Vec<f64> {
        let (sampled, total) = self.rows();
        let scale = if sampled == 0 {
            0.
        } else {
            total as f64 / sampled as f64
        };

        self.value[..self.buckets()]
            .iter()
            .map(|&n| n as f64 * scale)
            .collect()
    }
}
