// Safety constraints around circular obstacles, linearised about the
// nominal horizon trajectory for the QP.
//
// The barrier h(x, obs) = (x-x_o)² + (y-y_o)² - (r + r_o + d_safety)² is
// positive outside the inflated obstacle. MPC-DC keeps h ≥ 0 at every
// predicted stage; MPC-CBF enforces the discrete decrease condition
// h(x_{k+1}) ≥ (1-γ)·h(x_k) instead, letting the barrier decay
// geometrically towards zero.

use prelude::*;

use control_model::{ControlModel, Unicycle};

use crate::config::Strategy;
use crate::feed::{MovingObstacle, StaticObstacle};

/// One linearised inequality on a single horizon stage,
/// lower ≤ Jx·Δx_k + Ju·Δu_k ≤ upper.
pub struct ConstraintRow {
    /// Index k of the state decision variable (0 is the fixed initial state).
    pub stage: usize,
    pub x_coeffs: Vector3,
    /// Input coefficients and the input stage they apply to (CBF only).
    pub u_coeffs: Option<(usize, Vector2)>,
    pub lower: float,
    pub upper: float,
}

pub struct SafetySet {
    strategy: Strategy,
    r_robot: float,
    safety_dist: float,
    gamma: float,
    static_obs: Vec<StaticObstacle>,
    moving_obs: Vec<MovingObstacle>,
}

impl SafetySet {
    pub fn new(
        strategy: Strategy,
        r_robot: float,
        safety_dist: float,
        gamma: float,
        static_obs: Vec<StaticObstacle>,
        moving_obs: Vec<MovingObstacle>,
    ) -> Option<SafetySet> {
        if static_obs.is_empty() && moving_obs.is_empty() {
            // No enabled obstacle class: the problem degenerates to plain
            // tracking with actuator bounds only.
            return None;
        }
        Some(SafetySet {
            strategy,
            r_robot,
            safety_dist,
            gamma,
            static_obs,
            moving_obs,
        })
    }

    pub fn n_obstacles(&self) -> usize {
        self.static_obs.len() + self.moving_obs.len()
    }

    pub fn moving_positions(&self, t: float) -> Vec<(float, float)> {
        self.moving_obs.iter().map(|o| o.position(t)).collect()
    }

    /// Obstacle centres and radii active at simulation time t, static set
    /// first. The order is stable across steps: constraint indices are keyed
    /// by obstacle index.
    pub fn obstacles_at(&self, t: float) -> Vec<(float, float, float)> {
        self.static_obs
            .iter()
            .map(|o| (o.x, o.y, o.r))
            .chain(self.moving_obs.iter().map(|o| {
                let (x, y) = o.position(t);
                (x, y, o.r)
            }))
            .collect()
    }

    /// Barrier value for one obstacle: positive iff the robot centre is
    /// outside the combined radius plus safety margin.
    pub fn barrier(&self, x: &Vector3, obs: (float, float, float)) -> float {
        let (xo, yo, ro) = obs;
        let margin = self.r_robot + ro + self.safety_dist;
        (x[0] - xo).powi(2) + (x[1] - yo).powi(2) - margin * margin
    }

    fn barrier_gradient(&self, x: &Vector3, obs: (float, float, float)) -> Vector3 {
        let (xo, yo, _) = obs;
        Vector3::new(2.0 * (x[0] - xo), 2.0 * (x[1] - yo), 0.0)
    }

    /// Physical clearance (boundary to boundary, without the safety margin)
    /// to the nearest obstacle at time t.
    pub fn min_clearance(&self, x: &Vector3, t: float) -> float {
        self.obstacles_at(t)
            .into_iter()
            .map(|(xo, yo, ro)| {
                float::hypot(x[0] - xo, x[1] - yo) - (self.r_robot + ro)
            })
            .fold(INFINITY, min)
    }

    /// Emits the full linearised constraint set for the horizon.
    /// `x_bar` holds N+1 nominal states, `u_bar` N nominal inputs; stage k
    /// is evaluated at simulation time t_now + k·dt.
    pub fn rows(
        &self,
        model: &Unicycle,
        dt: float,
        t_now: float,
        x_bar: &[Vector3],
        u_bar: &[Vector2],
    ) -> Vec<ConstraintRow> {
        let N = u_bar.len();
        let mut rows = Vec::with_capacity(N * self.n_obstacles());
        match self.strategy {
            Strategy::MpcDc => {
                for k in 1..=N {
                    let t_k = t_now + k as float * dt;
                    for obs in self.obstacles_at(t_k) {
                        // h(x̄) + ∇h·Δx ≥ 0
                        rows.push(ConstraintRow {
                            stage: k,
                            x_coeffs: self.barrier_gradient(&x_bar[k], obs),
                            u_coeffs: None,
                            lower: -self.barrier(&x_bar[k], obs),
                            upper: INFINITY,
                        });
                    }
                }
            }
            Strategy::MpcCbf => {
                for k in 0..N {
                    let t_k = t_now + k as float * dt;
                    let t_k1 = t_k + dt;
                    let x_next = model.step(dt, &x_bar[k], &u_bar[k]);
                    let (A, B) = model.linearise(dt, &x_bar[k], &u_bar[k]);
                    let obs_k = self.obstacles_at(t_k);
                    let obs_k1 = self.obstacles_at(t_k1);
                    for (o_k, o_k1) in obs_k.into_iter().zip(obs_k1) {
                        let g1 = self.barrier_gradient(&x_next, o_k1);
                        // -h(x_{k+1}) + (1-γ)h(x_k) ≤ 0, with x_{k+1}
                        // expanded through the one-step dynamics.
                        let c = -self.barrier(&x_next, o_k1)
                            + (1.0 - self.gamma) * self.barrier(&x_bar[k], o_k);
                        let x_coeffs = (1.0 - self.gamma) * self.barrier_gradient(&x_bar[k], o_k)
                            - A.transpose() * g1;
                        let u_coeffs = -(B.transpose() * g1);
                        rows.push(ConstraintRow {
                            stage: k,
                            x_coeffs,
                            u_coeffs: Some((k, u_coeffs)),
                            lower: NEG_INFINITY,
                            upper: -c,
                        });
                    }
                }
            }
        }
        rows
    }
}
