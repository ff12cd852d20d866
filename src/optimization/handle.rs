use std::{
    io::{self, Read, Write},
    sync::Arc,
};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task;

use super::{UpdateStats, Updater, ValueType};
use crate::{error::Result, feature::FeatureId};

/// A shared `Updater`, cloned into every worker that touches its range.
///
/// Synchronous block workers take the guards directly, an async transport goes
/// through the `async` methods, which run the CPU-bound work in place on the
/// runtime's worker thread.
///
/// Every `update` takes the write lock of the whole updater. Updates only run in
/// parallel across handles, so give each block range its own updater, see
/// [`SgdUpdater::with_range`](super::SgdUpdater::with_range).
pub struct UpdaterHandle<U: Updater>(Arc<RwLock<U>>);

impl<U: Updater> Clone for UpdaterHandle<U> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<U: Updater> UpdaterHandle<U> {
    /// Creates a new `UpdaterHandle`.
    ///
    /// # Arguments
    /// * `updater` - The updater to share.
    pub fn new(updater: U) -> Self {
        Self(Arc::new(RwLock::new(updater)))
    }

    /// Shared access, many readers may `get` at once.
    pub fn read(&self) -> RwLockReadGuard<'_, U> {
        self.0.read()
    }

    /// Exclusive access, for `update` and `load`.
    pub fn write(&self) -> RwLockWriteGuard<'_, U> {
        self.0.write()
    }
}

impl<U: Updater + Send + Sync> UpdaterHandle<U> {
    /// Async call to the synchronous implementation of `Updater::get`.
    pub async fn get(
        &self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &mut Vec<f32>,
        lens: &mut Vec<usize>,
    ) -> Result<()> {
        task::block_in_place(|| self.read().get(ids, value_type, values, lens))
    }

    /// Async call to the synchronous implementation of `Updater::update`.
    pub async fn update(
        &self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &[f32],
        lens: &[usize],
    ) -> Result<UpdateStats> {
        task::block_in_place(|| self.write().update(ids, value_type, values, lens))
    }

    /// Async call to the synchronous implementation of `Updater::save`.
    pub async fn save(&self, save_aux: bool, out: &mut (dyn Write + Send)) -> io::Result<()> {
        task::block_in_place(|| self.read().save(save_aux, out))
    }

    /// Async call to the synchronous implementation of `Updater::load`.
    pub async fn load(&self, input: &mut (dyn Read + Send)) -> io::Result<bool> {
        task::block_in_place(|| self.write().load(input))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::{
        blocks::FeatureBlock,
        feature::{FeatureKey, Range},
        initialization::ConstParamGen,
        optimization::{SgdConfig, SgdUpdater},
    };

    fn handle() -> UpdaterHandle<SgdUpdater<ConstParamGen>> {
        let config = SgdConfig {
            l1: 0.,
            v_threshold: 1.,
            ..SgdConfig::new(2)
        };
        let updater =
            SgdUpdater::with_param_gen(config, Range::ALL, ConstParamGen::new(0.25)).unwrap();

        UpdaterHandle::new(updater)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_state() {
        let a = handle();
        let b = a.clone();

        let stats = a
            .update(&[1], ValueType::WeightAndEmbedding, &[1., 1.], &[2])
            .await
            .unwrap();
        assert_eq!(stats, UpdateStats { new_w: 1, new_v: 1 });

        let (mut values, mut lens) = (Vec::new(), Vec::new());
        b.get(&[1], ValueType::WeightAndEmbedding, &mut values, &mut lens)
            .await
            .unwrap();

        assert_eq!(lens, [3]);
        assert_ne!(values[0], 0.);
        assert_eq!(values[1..], [0.25, 0.25]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_load_through_handle() {
        let source = handle();
        source
            .update(&[1, 2], ValueType::Weight, &[1., 0.5, 1., -0.5], &[2, 2])
            .await
            .unwrap();

        let mut buf = Vec::new();
        source.save(true, &mut buf).await.unwrap();

        let target = handle();
        assert!(target.load(&mut Cursor::new(buf)).await.unwrap());
        assert_eq!(target.read().nnz_w(), 2);
        assert_eq!(target.read().store()[2], source.read().store()[2]);
    }

    #[test]
    fn block_updaters_dont_block_each_other() {
        let bits = 4;
        let blocks = FeatureBlock::partition(bits, &[(1, 1), (2, 1)]).unwrap();
        let config = SgdConfig {
            l1: 0.,
            ..SgdConfig::new(0)
        };

        let handles: Vec<_> = blocks
            .iter()
            .map(|&block| {
                let updater =
                    SgdUpdater::with_param_gen(config, block, ConstParamGen::new(0.)).unwrap();
                UpdaterHandle::new(updater)
            })
            .collect();

        let (a, b) = (&handles[0], &handles[1]);
        let id_a = FeatureKey::with_group(1, 3, bits);
        let id_b = FeatureKey::with_group(2, 3, bits);

        let mut held = a.write();
        std::thread::scope(|s| {
            s.spawn(|| {
                assert!(a.0.try_write().is_none());
                b.write()
                    .update(&[id_b], ValueType::Weight, &[1., 1.], &[2])
                    .unwrap();
            });
        });
        held.update(&[id_a], ValueType::Weight, &[1., -1.], &[2]).unwrap();
        drop(held);

        assert!(a.read().store()[id_a].w > 0.);
        assert!(b.read().store()[id_b].w < 0.);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_tasks_on_disjoint_ids() {
        let handle = handle();

        let tasks: Vec<_> = (1..=8u64)
            .map(|id| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    for _ in 0..10 {
                        handle
                            .update(&[id], ValueType::Weight, &[1., 0.1], &[2])
                            .await
                            .unwrap();
                    }
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap();
        }

        let updater = handle.read();
        assert_eq!(updater.nnz_v(), 8);
        assert!((1..=8).all(|id| updater.store()[id].fea_cnt == 10.));
    }
}
