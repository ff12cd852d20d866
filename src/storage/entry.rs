/// The lazily allocated embedding of a feature and its Adagrad state.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    weights: Box<[f32]>,
    sqrt_g: Box<[f32]>,
}

impl Embedding {
    /// Creates a new `Embedding` with zeroed accumulators.
    ///
    /// # Arguments
    /// * `weights` - The initial coordinates.
    pub fn new(weights: Vec<f32>) -> Self {
        let sqrt_g = vec![0.; weights.len()].into_boxed_slice();

        Self {
            weights: weights.into_boxed_slice(),
            sqrt_g,
        }
    }

    /// Rebuilds an `Embedding` from persisted parts of the same width.
    pub(crate) fn from_parts(weights: Vec<f32>, sqrt_g: Vec<f32>) -> Self {
        debug_assert_eq!(weights.len(), sqrt_g.len());

        Self {
            weights: weights.into_boxed_slice(),
            sqrt_g: sqrt_g.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    /// The root of the accumulated squared gradients, one per coordinate.
    pub fn sqrt_g(&self) -> &[f32] {
        &self.sqrt_g
    }

    /// Both the coordinates and their accumulators, mutably.
    pub fn parts_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        (&mut self.weights, &mut self.sqrt_g)
    }
}

/// The optimizer state of a single feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SgdEntry {
    /// How many times the feature appeared in the data so far.
    pub fea_cnt: f32,
    /// The bias weight.
    pub w: f32,
    /// FTRL's linear accumulator.
    pub z: f32,
    /// The root of the accumulated squared gradients of `w`.
    pub sqrt_g: f32,
    v: Option<Embedding>,
}

/// The state every feature starts with.
pub(crate) static EMPTY: SgdEntry = SgdEntry {
    fea_cnt: 0.,
    w: 0.,
    z: 0.,
    sqrt_g: 0.,
    v: None,
};

impl SgdEntry {
    pub fn v(&self) -> Option<&Embedding> {
        self.v.as_ref()
    }

    pub fn v_mut(&mut self) -> Option<&mut Embedding> {
        self.v.as_mut()
    }

    /// Allocates the embedding if there's none yet.
    ///
    /// An embedding is never replaced or freed once allocated.
    ///
    /// # Returns
    /// Whether `v` was allocated by this call.
    pub fn alloc_v(&mut self, v: Embedding) -> bool {
        if self.v.is_some() {
            return false;
        }

        self.v = Some(v);
        true
    }

    /// Whether this entry still holds no information at all.
    pub fn is_empty(&self) -> bool {
        self.fea_cnt == 0. && self.w == 0. && self.z == 0. && self.sqrt_g == 0. && self.v.is_none()
    }
}
