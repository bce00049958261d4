#![allow(non_snake_case)]

use prelude::*;

mod unicycle;
pub use unicycle::Unicycle;

#[derive(Clone, Copy, Debug, Default)]
pub struct State {
    pub position: (float, float),
    pub heading: float,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Control {
    pub v: float,
    pub omega: float,
}

pub trait ControlModel {
    /// Discrete next-state map x_{k+1} = f(x_k, u_k).
    fn step(&self, dt: float, x: &Vector3, u: &Vector2) -> Vector3;

    /// Jacobians of the discrete map with respect to state and input,
    /// evaluated at the operating point (x0, u0).
    fn linearise(&self, dt: float, x0: &Vector3, u0: &Vector2) -> (Matrix3, Matrix3x2);

    fn x_to_state(&self, x: &Vector3) -> State {
        State {
            position: (x[0], x[1]),
            heading: x[2],
        }
    }

    fn u_to_control(&self, u: &Vector2) -> Control {
        Control {
            v: u[0],
            omega: u[1],
        }
    }

    fn u_from_control(&self, control: &Control) -> Vector2 {
        Vector2::new(control.v, control.omega)
    }
}

/// State error for a fixed goal pose.
pub fn setpoint_error(x: &Vector3, goal: &Vector3) -> Vector3 {
    x - goal
}

/// State error against a reference point: position offsets plus the wrapped
/// difference between the bearing towards the reference and the heading.
pub fn tracking_error(x: &Vector3, x_ref: float, y_ref: float) -> Vector3 {
    let theta_des = (y_ref - x[1]).atan2(x_ref - x[0]);
    Vector3::new(x[0] - x_ref, x[1] - y_ref, wrap_angle(theta_des - x[2]))
}

/// Quadratic stage cost eᵀQe with diagonal Q.
pub fn stage_cost(error: &Vector3, Q: &Vector3) -> float {
    Q[0] * error[0] * error[0] + Q[1] * error[1] * error[1] + Q[2] * error[2] * error[2]
}
