// Time-varying quantities fed to the optimiser: the reference trajectory
// point and moving-obstacle positions, both closed-form functions of
// simulation time. Stage k of the horizon is evaluated at t_now + k·Ts.

use prelude::*;
use serde::Deserialize;

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct StaticObstacle {
    pub x: float,
    pub y: float,
    pub r: float,
}

/// Obstacle moving along the linear law x(t) = ax·t + bx, y(t) = ay·t + by.
#[derive(Clone, Copy, Debug, Deserialize)]
pub struct MovingObstacle {
    pub ax: float,
    pub bx: float,
    pub ay: float,
    pub by: float,
    pub r: float,
}

impl MovingObstacle {
    pub fn position(&self, t: float) -> (float, float) {
        (self.ax * t + self.bx, self.ay * t + self.by)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum Trajectory {
    Circular { amplitude: float, omega: float },
    Infinity { amplitude: float, omega: float },
}

impl Trajectory {
    pub fn point(&self, t: float) -> (float, float) {
        match *self {
            Trajectory::Circular { amplitude, omega } => {
                let (sin, cos) = (omega * t).sin_cos();
                (amplitude * cos, amplitude * sin)
            }
            Trajectory::Infinity { amplitude, omega } => {
                let (sin, cos) = (omega * t).sin_cos();
                let den = sin * sin + 1.0;
                (amplitude * cos / den, amplitude * sin * cos / den)
            }
        }
    }
}
