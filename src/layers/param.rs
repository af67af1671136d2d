use serde::{Deserialize, Serialize};

/// A learnable tensor: flat values plus the gradient and Adam moment
/// buffers that travel with it.
///
/// The scratch buffers (`grad`, `m`, `v`) are skipped during serialization;
/// `reset_scratch` rebuilds them after a checkpoint is loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub value: Vec<f64>,
    #[serde(skip)]
    pub grad: Vec<f64>,
    #[serde(skip)]
    pub m: Vec<f64>,
    #[serde(skip)]
    pub v: Vec<f64>,
}

impl Param {
    pub fn new(value: Vec<f64>) -> Param {
        let n = value.len();
        Param {
            value,
            grad: vec![0.0; n],
            m: vec![0.0; n],
            v: vec![0.0; n],
        }
    }

    /// Rebuilds zeroed scratch buffers sized to the current values.
    pub fn reset_scratch(&mut self) {
        let n = self.value.len();
        self.grad = vec![0.0; n];
        self.m = vec![0.0; n];
        self.v = vec![0.0; n];
    }

    pub fn zero_grad(&mut self) {
        self.grad.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_buffers_survive_a_serde_round_trip() {
        let mut p = Param::new(vec![1.0, 2.0, 3.0]);
        p.grad[1] = 5.0;
        let json = serde_json::to_string(&p).unwrap();
        let mut back: Param = serde_json::from_str(&json).unwrap();
        assert_eq!(back.value, vec![1.0, 2.0, 3.0]);
        // Skipped fields come back empty until reset.
        assert!(back.grad.is_empty());
        back.reset_scratch();
        assert_eq!(back.grad, vec![0.0; 3]);
        assert_eq!(back.m.len(), 3);
        assert_eq!(back.v.len(), 3);
    }
}
