use prelude::*;

pub trait Estimator {
    /// Produces the state estimate the controller sees for this step.
    fn step(&mut self, measurement: &Vector3) -> Vector3;
}

/// Direct state feedback: the plant output is used as the estimate.
pub struct StateFeedback;

impl Estimator for StateFeedback {
    fn step(&mut self, measurement: &Vector3) -> Vector3 {
        *measurement
    }
}
