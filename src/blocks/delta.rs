/// The bound every feature starts with.
pub const DEFAULT_INIT: f32 = 1.0;

/// The widest bound a feature can reach.
pub const DEFAULT_MAX: f32 = 5.0;

/// Per-feature trust region for coordinate updates.
///
/// Each value bounds how far a single step may move the feature's weight. After
/// a step is applied its bound is recomputed from the step's magnitude: large
/// steps widen it up to `max`, small steps shrink it towards `0.1`.
#[derive(Debug, Clone)]
pub struct TrustRegion {
    delta: Box<[f32]>,
    max: f32,
}

impl TrustRegion {
    /// Creates a new `TrustRegion` with every bound set to `DEFAULT_INIT`.
    ///
    /// # Arguments
    /// * `len` - The amount of features.
    pub fn new(len: usize) -> Self {
        Self::with_init(len, DEFAULT_INIT)
    }

    /// Creates a new `TrustRegion` with every bound set to `init`.
    pub fn with_init(len: usize, init: f32) -> Self {
        Self {
            delta: vec![init; len].into_boxed_slice(),
            max: DEFAULT_MAX,
        }
    }

    /// Replaces the cap used by `update`.
    pub fn with_max(mut self, max: f32) -> Self {
        self.max = max;
        self
    }

    /// The recomputed bound after a step of `delta_w`.
    #[inline]
    pub fn next_bound(delta_w: f32, max: f32) -> f32 {
        max.min(delta_w.abs() * 2. + 0.1)
    }

    pub fn len(&self) -> usize {
        self.delta.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delta.is_empty()
    }

    /// The current bound of feature `i`.
    pub fn bound(&self, i: usize) -> f32 {
        self.delta[i]
    }

    /// Clamps a proposed step for feature `i` into `[-bound, bound]`.
    pub fn clip(&self, i: usize, step: f32) -> f32 {
        let bound = self.delta[i];
        step.clamp(-bound, bound)
    }

    /// Recomputes the bound of feature `i` from the step it just took.
    pub fn update(&mut self, i: usize, delta_w: f32) {
        self.delta[i] = Self::next_bound(delta_w, self.max);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_init() {
        assert_eq!(TrustRegion::new(3).as_slice(), [1.; 3]);
        assert_eq!(TrustRegion::with_init(2, 0.5).as_slice(), [0.5; 2]);
    }

    #[test]
    fn bound_stays_within_limits() {
        for i in 0..200 {
            let dw = (i as f32 - 100.) * 0.037;
            let bound = TrustRegion::next_bound(dw, DEFAULT_MAX);

            assert!((0.1..=DEFAULT_MAX).contains(&bound), "{dw} -> {bound}");
            if dw.abs() >= (DEFAULT_MAX - 0.1) / 2. {
                assert_eq!(bound, DEFAULT_MAX);
            }
        }
    }

    #[test]
    fn small_steps_shrink_large_steps_widen() {
        let mut region = TrustRegion::new(2).with_max(3.);

        region.update(0, 0.);
        region.update(1, 10.);

        assert!((region.bound(0) - 0.1).abs() < 1e-6);
        assert_eq!(region.bound(1), 3.);
    }

    #[test]
    fn clip_respects_bound() {
        let mut region = TrustRegion::new(1);
        region.update(0, 0.2);

        assert!((region.clip(0, 4.) - 0.5).abs() < 1e-6);
        assert!((region.clip(0, -4.) + 0.5).abs() < 1e-6);
        assert_eq!(region.clip(0, 0.25), 0.25);
    }
}
