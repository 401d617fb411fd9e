use rayon::prelude::*;

/// The flat parameter buffer of a model and its gradient.
#[derive(Debug, Clone)]
pub struct ParamStore {
    pub(crate) params: Vec<f32>,
    pub(crate) grad: Vec<f32>,
}

impl ParamStore {
    /// Creates a new `ParamStore` with a zeroed gradient.
    pub fn new(params: Vec<f32>) -> Self {
        let grad = vec![0.; params.len()];
        Self { params, grad }
    }

    pub fn size(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    /// Fills the gradient with zeros.
    pub fn zero_grad(&mut self) {
        self.grad.par_iter_mut().for_each(|g| *g = 0.);
    }
}
