use super::{Optimizer, optimizer::check_sizes};
use crate::error::Result;

/// Plain gradient descent: a step of length `learning_rate` against the gradient.
#[derive(Debug, Clone)]
pub struct GradientDescent {
    size: usize,
    learning_rate: f32,
}

impl GradientDescent {
    /// Creates a new `GradientDescent` optimizer.
    ///
    /// # Arguments
    /// * `size` - The amount of parameters of the model it will train.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    pub fn new(size: usize, learning_rate: f32) -> Self {
        Self {
            size,
            learning_rate,
        }
    }
}

impl Optimizer for GradientDescent {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        check_sizes(self.size, grad, params)?;
        let lr = self.learning_rate;

        for (p, g) in params.iter_mut().zip(grad) {
            *p -= lr * g;
        }

        Ok(())
    }

    fn size(&self) -> usize {
        self.size
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_against_the_gradient() {
        let mut optimizer = GradientDescent::new(2, 0.5);
        let mut params = [1.0, -1.0];

        optimizer.update_params(&[2.0, -2.0], &mut params).unwrap();
        assert_eq!(params, [0.0, 0.0]);
    }

    #[test]
    fn rejects_foreign_parameter_sets() {
        let mut optimizer = GradientDescent::new(3, 0.1);
        let mut params = [0.0; 2];

        assert!(optimizer.update_params(&[0.0; 2], &mut params).is_err());
    }
}
