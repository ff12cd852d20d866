use std::{
    collections::HashMap,
    io::{self, BufWriter, Read, Write},
    ops::{Index, IndexMut},
};

use log::{debug, info};

use super::{
    SgdEntry,
    entry::EMPTY,
    persist::{self, Header},
};
use crate::feature::{FeatureId, FeatureKey, Range};

/// Key ranges narrower than this get a dense backing.
pub const DENSE_RANGE_LIMIT: u64 = 10_000_000;

#[derive(Debug)]
enum Backing {
    /// Indexed by `key - range.begin`.
    Dense(Vec<SgdEntry>),
    /// Indexed by key.
    Sparse(HashMap<u64, SgdEntry>),
}

/// Holds the `SgdEntry` of every feature whose key falls in a fixed range.
///
/// Entries are created lazily on first write. Reading a feature that was never
/// written yields an empty entry without allocating it.
///
/// A range ending at `u64::MAX` also covers the key `u64::MAX`, so a store over
/// [`Range::ALL`] holds every feature.
#[derive(Debug)]
pub struct WeightStore {
    v_dim: usize,
    range: Range,
    backing: Backing,
}

impl WeightStore {
    /// Creates a new `WeightStore`.
    ///
    /// # Arguments
    /// * `v_dim` - The width of every embedding this store will hold.
    /// * `range` - The key range this store covers.
    ///
    /// # Panics
    /// If `range` is invalid.
    pub fn new(v_dim: usize, range: Range) -> Self {
        assert!(range.valid(), "weight store over an invalid range {range:?}");

        let backing = if range.len() < DENSE_RANGE_LIMIT {
            let slots = range.len() + (range.end == u64::MAX) as u64;
            Backing::Dense(vec![SgdEntry::default(); slots as usize])
        } else {
            Backing::Sparse(HashMap::new())
        };

        let store = Self {
            v_dim,
            range,
            backing,
        };

        info!(
            begin = range.begin,
            end = range.end,
            dense = store.is_dense();
            "created weight store"
        );

        store
    }

    pub fn is_dense(&self) -> bool {
        matches!(self.backing, Backing::Dense(_))
    }

    pub fn range(&self) -> Range {
        self.range
    }

    pub fn v_dim(&self) -> usize {
        self.v_dim
    }

    /// Whether `key` belongs to this store.
    pub fn covers(&self, key: u64) -> bool {
        self.range.contains(key) || (self.range.end == u64::MAX && key == u64::MAX)
    }

    fn check_key(&self, key: u64) -> u64 {
        assert!(
            self.covers(key),
            "key {key:#x} is outside the store range [{:#x}, {:#x})",
            self.range.begin,
            self.range.end
        );
        key
    }

    /// The entry of feature `id`, or `None` if it was never written.
    ///
    /// # Panics
    /// If the key of `id` is outside of this store's range.
    pub fn get(&self, id: FeatureId) -> Option<&SgdEntry> {
        let key = self.check_key(FeatureKey::of(id).get());

        match &self.backing {
            Backing::Dense(entries) => Some(&entries[(key - self.range.begin) as usize]),
            Backing::Sparse(entries) => entries.get(&key),
        }
    }

    fn slot(&mut self, key: u64) -> &mut SgdEntry {
        let key = self.check_key(key);

        match &mut self.backing {
            Backing::Dense(entries) => &mut entries[(key - self.range.begin) as usize],
            Backing::Sparse(entries) => entries.entry(key).or_default(),
        }
    }

    /// The entry of feature `id`, creating it empty if absent.
    ///
    /// # Panics
    /// If the key of `id` is outside of this store's range.
    pub fn entry(&mut self, id: FeatureId) -> &mut SgdEntry {
        self.slot(FeatureKey::of(id).get())
    }

    /// Iterates over every non-empty entry, with the raw id of its feature.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (FeatureId, &SgdEntry)> + '_> {
        let begin = self.range.begin;

        match &self.backing {
            Backing::Dense(entries) => Box::new(
                entries
                    .iter()
                    .enumerate()
                    .filter(|(_, entry)| !entry.is_empty())
                    .map(move |(i, entry)| (FeatureKey::from_key(begin + i as u64).raw(), entry)),
            ),
            Backing::Sparse(entries) => Box::new(
                entries
                    .iter()
                    .filter(|(_, entry)| !entry.is_empty())
                    .map(|(&key, entry)| (FeatureKey::from_key(key).raw(), entry)),
            ),
        }
    }

    /// Like [`WeightStore::iter`], with mutable entries.
    pub fn iter_mut(&mut self) -> Box<dyn Iterator<Item = (FeatureId, &mut SgdEntry)> + '_> {
        let begin = self.range.begin;

        match &mut self.backing {
            Backing::Dense(entries) => Box::new(
                entries
                    .iter_mut()
                    .enumerate()
                    .filter(|(_, entry)| !entry.is_empty())
                    .map(move |(i, entry)| (FeatureKey::from_key(begin + i as u64).raw(), entry)),
            ),
            Backing::Sparse(entries) => Box::new(
                entries
                    .iter_mut()
                    .filter(|(_, entry)| !entry.is_empty())
                    .map(|(&key, entry)| (FeatureKey::from_key(key).raw(), entry)),
            ),
        }
    }

    /// The amount of non-empty entries.
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Writes every non-empty entry to `out`.
    ///
    /// # Arguments
    /// * `save_aux` - Whether to also write counts and accumulators.
    /// * `out` - The output stream.
    pub fn save(&self, save_aux: bool, out: &mut dyn Write) -> io::Result<()> {
        let mut out = BufWriter::new(out);

        let header = Header {
            v_dim: self.v_dim,
            aux: save_aux,
            count: self.len() as u64,
        };
        header.write(&mut out)?;

        for (id, entry) in self.iter() {
            persist::write_record(&mut out, save_aux, FeatureKey::of(id).get(), entry)?;
        }

        out.flush()?;

        info!(entries = header.count, aux = save_aux; "saved weight store");
        Ok(())
    }

    /// Reads entries previously written by [`WeightStore::save`], replacing the stored ones.
    ///
    /// The store is only touched once the whole stream was read.
    ///
    /// # Returns
    /// Whether the stream carried counts and accumulators, or an `InvalidData`
    /// error if the stream is foreign, has another embedding width, or holds
    /// features outside of this store's range.
    pub fn load(&mut self, input: &mut dyn Read) -> io::Result<bool> {
        let header = Header::read(input)?;

        if header.v_dim != self.v_dim {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "embedding width mismatch, stream has {} and store has {}",
                    header.v_dim, self.v_dim
                ),
            ));
        }

        let mut records = Vec::new();
        for _ in 0..header.count {
            let (key, entry) = persist::read_record(input, &header)?;

            if !self.covers(key) {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("stored key {key:#x} is outside the store range"),
                ));
            }

            records.push((key, entry));
        }

        for (key, entry) in records {
            *self.slot(key) = entry;
        }

        debug!(entries = header.count, aux = header.aux; "loaded weight store");
        Ok(header.aux)
    }
}

impl Index<FeatureId> for WeightStore {
    type Output = SgdEntry;

    fn index(&self, id: FeatureId) -> &Self::Output {
        self.get(id).unwrap_or(&EMPTY)
    }
}

impl IndexMut<FeatureId> for WeightStore {
    fn index_mut(&mut self, id: FeatureId) -> &mut Self::Output {
        self.entry(id)
    }
}
