/// A `ParamGen` generates the initial values of freshly allocated embeddings.
pub trait ParamGen {
    /// Should sample exactly `n` values.
    ///
    /// # Arguments
    /// * `n` - The amount of values to generate.
    fn sample(&mut self, n: usize) -> Vec<f32>;
}
