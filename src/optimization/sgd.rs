use std::io::{self, Read, Write};

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand_distr::Uniform;

use super::{SgdConfig, UpdateStats, Updater, ValueType};
use crate::{
    error::{FmErr, Result},
    feature::{FeatureId, Range},
    initialization::{ParamGen, RandParamGen},
    storage::{Embedding, SgdEntry, WeightStore},
};

/// Scalars per id in an update before the embedding gradient: occurrence and bias gradient.
const UPDATE_HEAD: usize = 2;

/// FTRL-proximal on the bias, Adagrad on the embedding.
///
/// Embeddings are allocated lazily, once a feature has been seen at least
/// `V_threshold` times.
#[derive(Debug)]
pub struct SgdUpdater<G: ParamGen = RandParamGen<StdRng, Uniform<f32>>> {
    config: SgdConfig,
    store: WeightStore,
    param_gen: G,
    has_aux: bool,
    nnz_w: usize,
    nnz_v: usize,
}

impl SgdUpdater {
    /// Creates a new `SgdUpdater` over the whole key space.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    ///
    /// # Returns
    /// An error if `config` is out of range.
    pub fn new(config: SgdConfig) -> Result<Self> {
        Self::with_range(config, Range::ALL)
    }

    /// Creates a new `SgdUpdater` owning the features whose key falls in `range`.
    ///
    /// Embeddings are initialized from a `StdRng` seeded with `config.seed`.
    ///
    /// # Panics
    /// If `range` is invalid.
    pub fn with_range(config: SgdConfig, range: Range) -> Result<Self> {
        config.validate()?;
        let param_gen = RandParamGen::seeded(config.seed, config.v_init_scale)?;
        Self::with_param_gen(config, range, param_gen)
    }

    /// Creates a new `SgdUpdater` out of string key-value pairs.
    ///
    /// # Returns
    /// The updater and the pairs it didn't consume, see [`SgdConfig::from_kwargs`].
    pub fn from_kwargs<I, K, V>(kwargs: I) -> Result<(Self, Vec<(String, String)>)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (config, rest) = SgdConfig::from_kwargs(kwargs)?;
        Ok((Self::new(config)?, rest))
    }
}

impl<G: ParamGen> SgdUpdater<G> {
    /// Creates a new `SgdUpdater` with a custom embedding initializer.
    ///
    /// # Arguments
    /// * `config` - The hyperparameters.
    /// * `range` - The key range this updater owns.
    /// * `param_gen` - Samples the initial coordinates of every new embedding.
    ///
    /// # Panics
    /// If `range` is invalid.
    pub fn with_param_gen(config: SgdConfig, range: Range, param_gen: G) -> Result<Self> {
        config.validate()?;

        let store = WeightStore::new(config.v_dim, range);

        info!(
            v_dim = config.v_dim,
            v_threshold = config.v_threshold,
            l1 = config.l1,
            lr = config.lr;
            "created sgd updater"
        );

        Ok(Self {
            config,
            store,
            param_gen,
            has_aux: true,
            nnz_w: 0,
            nnz_v: 0,
        })
    }

    pub fn config(&self) -> &SgdConfig {
        &self.config
    }

    pub fn store(&self) -> &WeightStore {
        &self.store
    }

    /// Whether the optimizer state is complete, `false` after loading a model saved without it.
    pub fn has_aux(&self) -> bool {
        self.has_aux
    }

    /// The amount of features with a nonzero bias.
    pub fn nnz_w(&self) -> usize {
        self.nnz_w
    }

    /// The amount of features with an embedding.
    pub fn nnz_v(&self) -> usize {
        self.nnz_v
    }

    /// Rebuilds the FTRL state from the stored weights.
    ///
    /// Meant for models loaded without their auxiliary state: afterwards a zero
    /// gradient step leaves every weight where it was loaded.
    pub fn reinit_aux(&mut self) {
        let SgdConfig {
            l1, l2, lr, lr_beta, ..
        } = self.config;

        let scale = lr_beta / lr + l2;

        for (_, entry) in self.store.iter_mut() {
            entry.sqrt_g = 0.;
            entry.z = if entry.w == 0. {
                0.
            } else {
                -entry.w * scale - entry.w.signum() * l1
            };
        }

        self.has_aux = true;
        info!(nnz_w = self.nnz_w; "rebuilt auxiliary state from weights");
    }

    /// Checks a whole update batch before any of it gets applied.
    fn check_update(
        &self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &[f32],
        lens: &[usize],
    ) -> Result<()> {
        check_lens(ids, values, lens)?;

        let with_v = UPDATE_HEAD + self.config.v_dim;

        for (idx, (&id, &len)) in ids.iter().zip(lens).enumerate() {
            let valid = len == UPDATE_HEAD
                || (len == with_v
                    && value_type == ValueType::WeightAndEmbedding
                    && self.store[id].v().is_some());

            if !valid {
                return Err(FmErr::InvalidLength { idx, got: len });
            }
        }

        Ok(())
    }
}

/// Checks that `lens` has one count per id and that the counts add up to `values`.
fn check_lens(ids: &[FeatureId], values: &[f32], lens: &[usize]) -> Result<()> {
    if lens.len() != ids.len() {
        return Err(FmErr::SizeMismatch {
            a: "lens",
            b: "ids",
            got: lens.len(),
            expected: ids.len(),
        });
    }

    let total: usize = lens.iter().sum();
    if total != values.len() {
        return Err(FmErr::SizeMismatch {
            a: "values",
            b: "lens",
            got: values.len(),
            expected: total,
        });
    }

    Ok(())
}

/// One FTRL-proximal step on the bias of `entry`.
fn ftrl_step(config: &SgdConfig, entry: &mut SgdEntry, grad: f32) {
    let sqrt_g = (entry.sqrt_g.powi(2) + grad.powi(2)).sqrt();
    let sigma = (sqrt_g - entry.sqrt_g) / config.lr;

    entry.z += grad - sigma * entry.w;
    entry.sqrt_g = sqrt_g;

    entry.w = if entry.z.abs() <= config.l1 {
        0.
    } else {
        let z = entry.z - entry.z.signum() * config.l1;
        -z / ((config.lr_beta + sqrt_g) / config.lr + config.l2)
    };
}

/// One Adagrad step on every coordinate of `v`.
fn adagrad_step(config: &SgdConfig, v: &mut Embedding, grad: &[f32]) {
    let (weights, sqrt_g) = v.parts_mut();

    weights
        .iter_mut()
        .zip(sqrt_g.iter_mut())
        .zip(grad)
        .for_each(|((v, c), g)| {
            let g = g + config.v_l2 * *v;
            *c = (c.powi(2) + g.powi(2)).sqrt();
            *v -= config.v_lr / (*c + config.v_lr_beta) * g;
        });
}

impl<G: ParamGen> Updater for SgdUpdater<G> {
    fn load(&mut self, input: &mut dyn Read) -> io::Result<bool> {
        let has_aux = self.store.load(input)?;

        self.has_aux = has_aux;
        self.nnz_w = self.store.iter().filter(|(_, e)| e.w != 0.).count();
        self.nnz_v = self.store.iter().filter(|(_, e)| e.v().is_some()).count();

        if !has_aux {
            warn!("loaded a model without auxiliary state, training resumes from scratch accumulators");
        }

        info!(nnz_w = self.nnz_w, nnz_v = self.nnz_v, aux = has_aux; "loaded model");
        Ok(has_aux)
    }

    fn save(&self, save_aux: bool, out: &mut dyn Write) -> io::Result<()> {
        self.store.save(save_aux, out)
    }

    fn get(
        &self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &mut Vec<f32>,
        lens: &mut Vec<usize>,
    ) -> Result<()> {
        values.clear();
        lens.clear();

        for &id in ids {
            let entry = &self.store[id];

            let v = match value_type {
                ValueType::Weight => None,
                ValueType::WeightAndEmbedding => entry.v(),
            };

            values.push(entry.w);
            if let Some(v) = v {
                values.extend_from_slice(v.weights());
            }

            lens.push(1 + v.map_or(0, Embedding::len));
        }

        Ok(())
    }

    fn update(
        &mut self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &[f32],
        lens: &[usize],
    ) -> Result<UpdateStats> {
        self.check_update(ids, value_type, values, lens)?;

        let Self {
            config,
            store,
            param_gen,
            nnz_w,
            nnz_v,
            ..
        } = self;

        let mut stats = UpdateStats::default();
        let mut offset = 0;

        for (&id, &len) in ids.iter().zip(lens) {
            let chunk = &values[offset..offset + len];
            offset += len;

            let (occurrence, grad_w, grad_v) = (chunk[0], chunk[1], &chunk[UPDATE_HEAD..]);
            let zero_grad_v = grad_v.iter().all(|&g| g == 0.);

            if occurrence == 0. && grad_w == 0. && zero_grad_v {
                continue;
            }

            let entry = store.entry(id);
            entry.fea_cnt += occurrence;

            if grad_w != 0. {
                let was_zero = entry.w == 0.;
                ftrl_step(config, entry, grad_w);

                match (was_zero, entry.w == 0.) {
                    (true, false) => {
                        stats.new_w += 1;
                        *nnz_w += 1;
                    }
                    (false, true) => *nnz_w = nnz_w.saturating_sub(1),
                    _ => {}
                }
            }

            if !zero_grad_v {
                if let Some(v) = entry.v_mut() {
                    adagrad_step(config, v, grad_v);
                }
            }

            if occurrence > 0.
                && config.v_dim > 0
                && entry.fea_cnt >= config.v_threshold
                && entry.v().is_none()
            {
                entry.alloc_v(Embedding::new(param_gen.sample(config.v_dim)));
                stats.new_v += 1;
                *nnz_v += 1;
            }
        }

        debug!(ids = ids.len(), new_w = stats.new_w, new_v = stats.new_v; "applied update");
        Ok(stats)
    }
}
