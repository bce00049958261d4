#![allow(non_snake_case)]

mod config;
mod feed;
mod mpc;
mod osqp_mpc;
mod safety;
mod sparse;

pub use config::{Config, ConfigError, ControlType, Mode, Strategy, TrajectoryShape};
pub use feed::{MovingObstacle, StaticObstacle, Trajectory};
pub use mpc::{Mpc, MpcStep};
pub use osqp_mpc::{OsqpMpc, SolveError};
pub use safety::SafetySet;
