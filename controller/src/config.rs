use prelude::*;
use serde::Deserialize;
use thiserror::Error;

use crate::feed::{MovingObstacle, StaticObstacle, Trajectory};

/// Safety-constraint strategy, fixed for a whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
pub enum Strategy {
    #[serde(rename = "MPC-DC")]
    MpcDc,
    #[serde(rename = "MPC-CBF")]
    MpcCbf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Setpoint,
    TrajTracking,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrajectoryShape {
    Circular,
    Infinity,
}

/// Controller parameters for one run. Immutable once validated; parameter
/// sweeps construct one `Config` per experiment.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub strategy: Strategy,
    pub control_type: ControlType,
    /// Prediction horizon length in steps.
    pub N: u32,
    /// Diagonal of the state cost matrix.
    pub Q: [float; 3],
    /// Input-rate penalty weights.
    pub R: [float; 2],
    pub v_limit: float,
    pub omega_limit: float,
    /// Robot radius.
    pub r: float,
    #[serde(default = "default_gamma")]
    pub gamma: float,
    #[serde(default = "default_safety_dist")]
    pub safety_dist: float,
    /// SQP iterations per control step.
    #[serde(default = "default_sqp_iters")]
    pub sqp_iters: u32,
    /// Goal pose, required for setpoint control.
    pub goal: Option<[float; 3]>,
    /// Reference shape, required for trajectory tracking.
    pub trajectory: Option<TrajectoryShape>,
    /// Trajectory amplitude.
    pub A: Option<float>,
    /// Trajectory angular frequency.
    pub w: Option<float>,
    #[serde(default)]
    pub static_obstacles: Vec<StaticObstacle>,
    #[serde(default)]
    pub moving_obstacles: Vec<MovingObstacle>,
}

fn default_gamma() -> float {
    0.5
}

fn default_safety_dist() -> float {
    0.03
}

fn default_sqp_iters() -> u32 {
    5
}

/// Resolved control mode with the fields its type requires.
#[derive(Clone, Copy, Debug)]
pub enum Mode {
    Setpoint { goal: Vector3 },
    TrajTracking { trajectory: Trajectory },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("prediction horizon must be at least 1 step")]
    ZeroHorizon,
    #[error("sampling period must be positive, got {0}")]
    ZeroSamplingPeriod(float),
    #[error("simulation must run for at least one step")]
    ZeroSimTime,
    #[error("actuator limits must be positive, got v_limit={0}, omega_limit={1}")]
    BadActuatorLimits(float, float),
    #[error("robot radius must be positive, got {0}")]
    BadRobotRadius(float),
    #[error("obstacle {index} radius must be positive, got {r}")]
    BadObstacleRadius { index: usize, r: float },
    #[error("gamma must lie in (0, 1], got {0}")]
    BadGamma(float),
    #[error("safety margin must be non-negative, got {0}")]
    BadSafetyMargin(float),
    #[error("setpoint control requires a goal pose")]
    MissingGoal,
    #[error("trajectory tracking requires trajectory, A and w")]
    MissingTrajectory,
    #[error("process noise standard deviation must be non-negative, got {0}")]
    BadProcessNoise(float),
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.N == 0 {
            return Err(ConfigError::ZeroHorizon);
        }
        if self.v_limit <= 0.0 || self.omega_limit <= 0.0 {
            return Err(ConfigError::BadActuatorLimits(self.v_limit, self.omega_limit));
        }
        if self.r <= 0.0 {
            return Err(ConfigError::BadRobotRadius(self.r));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(ConfigError::BadGamma(self.gamma));
        }
        if self.safety_dist < 0.0 {
            return Err(ConfigError::BadSafetyMargin(self.safety_dist));
        }
        let radii = self
            .static_obstacles
            .iter()
            .map(|o| o.r)
            .chain(self.moving_obstacles.iter().map(|o| o.r));
        for (index, r) in radii.enumerate() {
            if r <= 0.0 {
                return Err(ConfigError::BadObstacleRadius { index, r });
            }
        }
        self.mode().map(|_| ())
    }

    /// Resolves the control mode, checking the mutually-required fields.
    pub fn mode(&self) -> Result<Mode, ConfigError> {
        match self.control_type {
            ControlType::Setpoint => {
                let goal = self.goal.ok_or(ConfigError::MissingGoal)?;
                Ok(Mode::Setpoint {
                    goal: Vector3::new(goal[0], goal[1], goal[2]),
                })
            }
            ControlType::TrajTracking => {
                let (shape, amplitude, omega) = match (self.trajectory, self.A, self.w) {
                    (Some(shape), Some(a), Some(w)) => (shape, a, w),
                    _ => return Err(ConfigError::MissingTrajectory),
                };
                let trajectory = match shape {
                    TrajectoryShape::Circular => Trajectory::Circular { amplitude, omega },
                    TrajectoryShape::Infinity => Trajectory::Infinity { amplitude, omega },
                };
                Ok(Mode::TrajTracking { trajectory })
            }
        }
    }
}
