use std::{
    io::{self, Read, Write},
    ops::AddAssign,
};

use crate::{error::Result, feature::FeatureId};

/// Which part of a feature's state a `get` or `update` call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// The bias weight only.
    Weight,
    /// The bias weight followed by the embedding, for features that have one.
    WeightAndEmbedding,
}

/// What changed during an `update` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Features whose bias went from zero to nonzero.
    pub new_w: usize,
    /// Features that got an embedding.
    pub new_v: usize,
}

impl AddAssign for UpdateStats {
    fn add_assign(&mut self, rhs: Self) {
        self.new_w += rhs.new_w;
        self.new_v += rhs.new_v;
    }
}

/// The model-update contract a parameter server drives.
///
/// Both `get` and `update` take a flat `values` buffer together with `lens`,
/// the amount of scalars belonging to each id, in the order of `ids`.
pub trait Updater {
    /// Replaces the stored state with the one read from `input`.
    ///
    /// # Returns
    /// Whether the stream carried the auxiliary optimizer state.
    fn load(&mut self, input: &mut dyn Read) -> io::Result<bool>;

    /// Writes the model to `out`.
    ///
    /// # Arguments
    /// * `save_aux` - Whether to include the auxiliary optimizer state.
    /// * `out` - The output stream.
    fn save(&self, save_aux: bool, out: &mut dyn Write) -> io::Result<()>;

    /// Reads the current state of `ids`.
    ///
    /// `values` and `lens` are cleared before being filled.
    fn get(
        &self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &mut Vec<f32>,
        lens: &mut Vec<usize>,
    ) -> Result<()>;

    /// Applies a batch of gradients to `ids`.
    fn update(
        &mut self,
        ids: &[FeatureId],
        value_type: ValueType,
        values: &[f32],
        lens: &[usize],
    ) -> Result<UpdateStats>;
}
