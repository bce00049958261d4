use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};

use control_model::{ControlModel, Unicycle};
use prelude::*;

/// Process model: the same discrete kinematics as the prediction model,
/// optionally perturbed by additive zero-mean Gaussian state noise.
pub struct Plant {
    model: Unicycle,
    noise: Option<Normal<float>>,
    rng: StdRng,
}

impl Plant {
    pub fn new(noise_std: float, seed: u64) -> Plant {
        let noise = if noise_std > 0.0 {
            Some(Normal::new(0.0, noise_std).expect("noise_std validated non-negative"))
        } else {
            None
        };
        Plant {
            model: Unicycle::new(),
            noise,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn step(&mut self, dt: float, x: &Vector3, u: &Vector2) -> Vector3 {
        let mut next = self.model.step(dt, x, u);
        if let Some(noise) = &self.noise {
            for i in 0..3 {
                next[i] += noise.sample(&mut self.rng);
            }
        }
        next
    }
}
