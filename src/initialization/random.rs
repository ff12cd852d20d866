use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::{Distribution, Uniform};

use super::ParamGen;
use crate::error::Result;

/// A parameter generator that follows a certain probabilistic distribution.
#[derive(Debug, Clone)]
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: R,
    distribution: D,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    pub fn new(rng: R, distribution: D) -> Self {
        Self { rng, distribution }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with an inclusive uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The inclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low > high or not finite).
    pub fn uniform_inclusive(rng: R, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new_inclusive(low, high)?))
    }

    /// Creates a new `RandParamGen` parameter generator sampling from `[-scale, scale]`.
    pub fn symmetric(rng: R, scale: f32) -> Result<Self> {
        Self::uniform_inclusive(rng, -scale, scale)
    }
}

impl RandParamGen<StdRng, Uniform<f32>> {
    /// The embedding initializer used by default: a seeded `StdRng` sampling from `[-scale, scale]`.
    pub fn seeded(seed: u64, scale: f32) -> Result<Self> {
        Self::symmetric(StdRng::seed_from_u64(seed), scale)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Vec<f32> {
        (0..n)
            .map(|_| self.distribution.sample(&mut self.rng))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FmErr;

    #[test]
    fn empty() {
        let mut param_gen = RandParamGen::seeded(42, 1.).unwrap();
        assert!(param_gen.sample(0).is_empty());
    }

    #[test]
    fn within_bounds() {
        const SCALE: f32 = 0.01;
        let mut param_gen = RandParamGen::seeded(42, SCALE).unwrap();

        let sample = param_gen.sample(1000);
        assert_eq!(sample.len(), 1000);
        assert!(sample.iter().all(|v| (-SCALE..=SCALE).contains(v)));
    }

    #[test]
    fn same_seed_same_values() {
        let mut a = RandParamGen::seeded(7, 1.).unwrap();
        let mut b = RandParamGen::seeded(7, 1.).unwrap();

        assert_eq!(a.sample(16), b.sample(16));
    }

    #[test]
    fn zero_scale_is_constant() {
        let mut param_gen = RandParamGen::seeded(1, 0.).unwrap();
        assert_eq!(param_gen.sample(3), [0.; 3]);
    }

    #[test]
    fn invalid_range() {
        let rng = StdRng::seed_from_u64(0);
        let res = RandParamGen::uniform_inclusive(rng, 1., -1.);

        assert!(matches!(res, Err(FmErr::InvalidDistribution(_))));
    }
}
