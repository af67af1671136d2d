use crate::layers::param::Param;

/// Adam optimizer over a set of `Param` tensors.
///
/// Each tensor carries its own first/second moment buffers; the optimizer
/// only holds the hyperparameters and the shared step counter. Bias
/// corrections are precomputed once per `step` call, not per parameter.
#[derive(Debug)]
pub struct Adam {
    pub learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    t: usize,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Adam {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
        }
    }

    /// Applies one update to every tensor, consuming the gradients
    /// accumulated since the last call. Gradients are left untouched;
    /// callers zero them before the next accumulation pass.
    pub fn step(&mut self, params: Vec<&mut Param>) {
        self.t += 1;
        let t = self.t as f64;
        let bc1 = 1.0 - self.beta1.powf(t);
        let bc2 = 1.0 - self.beta2.powf(t);
        for p in params {
            for i in 0..p.value.len() {
                let g = p.grad[i];
                p.m[i] = self.beta1 * p.m[i] + (1.0 - self.beta1) * g;
                p.v[i] = self.beta2 * p.v[i] + (1.0 - self.beta2) * g * g;
                let m_hat = p.m[i] / bc1;
                let v_hat = p.v[i] / bc2;
                p.value[i] -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_moves_against_the_gradient() {
        let mut p = Param::new(vec![1.0, -1.0]);
        p.grad = vec![0.5, -0.5];
        let mut adam = Adam::new(0.1);
        adam.step(vec![&mut p]);
        // First step of Adam moves each parameter by ~lr against its gradient.
        assert!(p.value[0] < 1.0);
        assert!(p.value[1] > -1.0);
    }

    #[test]
    fn zero_gradient_leaves_parameters_in_place() {
        let mut p = Param::new(vec![0.25; 4]);
        let mut adam = Adam::new(0.1);
        adam.step(vec![&mut p]);
        assert_eq!(p.value, vec![0.25; 4]);
    }
}
