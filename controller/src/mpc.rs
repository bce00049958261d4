use log::{debug, log_enabled, Level::Debug};

use control_model::{self, Control, ControlModel, Unicycle};
use prelude::*;

use crate::config::{Config, ConfigError, Mode};
use crate::osqp_mpc::{OsqpMpc, SolveError};
use crate::safety::SafetySet;

const SQP_STEP_TOL: float = 1e-5;

/// Receding-horizon controller. Each call to `step` solves the horizon
/// problem from the supplied state and returns the first input of the
/// optimal sequence; the remainder seeds the next step's initial guess.
pub struct Mpc {
    model: Unicycle,
    qp: OsqpMpc,
    N: usize,
    mode: Mode,
    safety: Option<SafetySet>,
    Q: Vector3,
    sqp_iters: u32,
    u_warm: Vec<Vector2>,
    u_prev: Vector2,
    first_step: bool,
}

pub struct MpcStep {
    pub control: Control,
    pub u: Vector2,
    /// Predicted states over the horizon, current state first (N+1 entries).
    pub predicted_states: Vec<Vector3>,
    /// Predicted input sequence (N entries).
    pub predicted_controls: Vec<Vector2>,
}

impl Mpc {
    pub fn new(config: &Config) -> Result<Mpc, ConfigError> {
        config.validate()?;
        let mode = config.mode()?;
        let N = config.N as usize;

        let Q = Vector3::from_column_slice(&config.Q);
        let R = Vector2::from_column_slice(&config.R);
        let u_min = Vector2::new(-config.v_limit, -config.omega_limit);
        let u_max = Vector2::new(config.v_limit, config.omega_limit);

        let safety = SafetySet::new(
            config.strategy,
            config.r,
            config.safety_dist,
            config.gamma,
            config.static_obstacles.clone(),
            config.moving_obstacles.clone(),
        );

        Ok(Mpc {
            model: Unicycle::new(),
            qp: OsqpMpc::new(N, Q, R, u_min, u_max),
            N,
            mode,
            safety,
            Q,
            sqp_iters: config.sqp_iters,
            u_warm: vec![Vector2::zeros(); N],
            u_prev: Vector2::zeros(),
            first_step: true,
        })
    }

    pub fn horizon_len(&self) -> usize {
        self.N
    }

    /// Reference point at simulation time t (trajectory tracking only).
    pub fn reference_point(&self, t: float) -> Option<(float, float)> {
        match self.mode {
            Mode::TrajTracking { trajectory } => Some(trajectory.point(t)),
            Mode::Setpoint { .. } => None,
        }
    }

    /// Moving-obstacle positions at simulation time t, in obstacle order.
    pub fn moving_obstacle_positions(&self, t: float) -> Vec<(float, float)> {
        self.safety
            .as_ref()
            .map(|s| s.moving_positions(t))
            .unwrap_or_default()
    }

    /// Boundary-to-boundary clearance to the nearest obstacle, if any
    /// obstacle class is enabled.
    pub fn clearance(&self, t: float, x: &Vector3) -> Option<float> {
        self.safety.as_ref().map(|s| s.min_clearance(x, t))
    }

    /// Stage cost of the configured objective at state x and time t.
    pub fn stage_cost(&self, t: float, x: &Vector3) -> float {
        let e = match self.mode {
            Mode::Setpoint { goal } => control_model::setpoint_error(x, &goal),
            Mode::TrajTracking { trajectory } => {
                let (x_ref, y_ref) = trajectory.point(t);
                control_model::tracking_error(x, x_ref, y_ref)
            }
        };
        control_model::stage_cost(&e, &self.Q)
    }

    // Tracking target for one stage, phase-unwrapped against the nominal
    // heading so the quadratic error stays continuous.
    fn target_error(&self, t_k: float, x_bar_k: &Vector3) -> Vector3 {
        match self.mode {
            Mode::Setpoint { goal } => {
                let theta_goal = phase_unwrap(x_bar_k[2], goal[2]);
                x_bar_k - Vector3::new(goal[0], goal[1], theta_goal)
            }
            Mode::TrajTracking { trajectory } => {
                let (x_ref, y_ref) = trajectory.point(t_k);
                let theta_des = (y_ref - x_bar_k[1]).atan2(x_ref - x_bar_k[0]);
                let theta_target = phase_unwrap(x_bar_k[2], theta_des);
                x_bar_k - Vector3::new(x_ref, y_ref, theta_target)
            }
        }
    }

    /// One receding-horizon solve from state `x0` at simulation time
    /// `t_now`. Stage k of the horizon is evaluated at t_now + k·dt.
    pub fn step(&mut self, dt: float, t_now: float, x0: &Vector3) -> Result<MpcStep, SolveError> {
        let N = self.N;
        let (u_min, u_max) = self.qp.input_bounds();

        // Warm start: shift the previous optimal sequence one stage.
        let mut u_bar: Vec<Vector2> = if self.first_step {
            vec![Vector2::zeros(); N]
        } else {
            let mut shifted: Vec<Vector2> = self.u_warm[1..].to_vec();
            shifted.push(*self.u_warm.last().unwrap());
            shifted
        };

        let mut x_bar = vec![*x0; N + 1];
        for iter in 0..self.sqp_iters {
            for k in 0..N {
                x_bar[k + 1] = self.model.step(dt, &x_bar[k], &u_bar[k]);
            }

            let mut A = Vec::with_capacity(N);
            let mut B = Vec::with_capacity(N);
            for k in 0..N {
                let (A_k, B_k) = self.model.linearise(dt, &x_bar[k], &u_bar[k]);
                A.push(A_k);
                B.push(B_k);
            }

            let errors: Vec<Vector3> = (1..=N)
                .map(|k| self.target_error(t_now + k as float * dt, &x_bar[k]))
                .collect();

            let rows = match &self.safety {
                Some(s) => s.rows(&self.model, dt, t_now, &x_bar, &u_bar),
                None => Vec::new(),
            };

            let sol = self.qp.solve(&errors, &A, &B, &u_bar, &self.u_prev, &rows)?;

            let mut step_norm: float = 0.0;
            for k in 0..N {
                u_bar[k] += sol.du[k];
                // Numerical tolerance only; the QP already bounds u.
                for j in 0..2 {
                    u_bar[k][j] = min(max(u_bar[k][j], u_min[j]), u_max[j]);
                }
                step_norm = max(step_norm, sol.du[k].amax());
            }

            if log_enabled!(Debug) {
                debug!("sqp iter {}: step norm {:.3e}", iter, step_norm);
            }
            if step_norm < SQP_STEP_TOL {
                break;
            }
        }

        // Final rollout with the accepted inputs.
        for k in 0..N {
            x_bar[k + 1] = self.model.step(dt, &x_bar[k], &u_bar[k]);
        }

        self.u_warm.copy_from_slice(&u_bar);
        self.u_prev = u_bar[0];
        self.first_step = false;

        Ok(MpcStep {
            control: self.model.u_to_control(&u_bar[0]),
            u: u_bar[0],
            predicted_states: x_bar,
            predicted_controls: u_bar,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ControlType, Strategy};
    use crate::feed::StaticObstacle;
    use approx::assert_relative_eq;

    fn setpoint_config() -> Config {
        Config {
            strategy: Strategy::MpcCbf,
            control_type: ControlType::Setpoint,
            N: 10,
            Q: [15.0, 15.0, 0.005],
            R: [2.0, 0.5],
            v_limit: 0.26,
            omega_limit: 1.8,
            r: 0.1,
            gamma: 0.3,
            safety_dist: 0.03,
            sqp_iters: 5,
            goal: Some([2.0, 1.0, PI / 2.0]),
            trajectory: None,
            A: None,
            w: None,
            static_obstacles: Vec::new(),
            moving_obstacles: Vec::new(),
        }
    }

    #[test]
    fn first_control_moves_towards_the_goal() {
        let mut mpc = Mpc::new(&setpoint_config()).unwrap();
        let step = mpc.step(0.1, 0.0, &Vector3::zeros()).unwrap();
        assert!(step.control.v > 0.0);
        assert!(step.control.v <= 0.26 + 1e-9);
        assert!(step.control.omega.abs() <= 1.8 + 1e-9);
        // Heading correction towards the goal bearing is positive.
        assert!(step.control.omega > 0.0);
        assert_eq!(step.predicted_states.len(), 11);
        assert_eq!(step.predicted_controls.len(), 10);
    }

    #[test]
    fn resolving_from_the_same_state_is_deterministic() {
        let x0 = Vector3::new(0.3, -0.1, 0.4);
        let mut a = Mpc::new(&setpoint_config()).unwrap();
        let mut b = Mpc::new(&setpoint_config()).unwrap();
        let ua = a.step(0.1, 0.0, &x0).unwrap().u;
        let ub = b.step(0.1, 0.0, &x0).unwrap().u;
        assert_relative_eq!(ua, ub, epsilon = 1e-9);
    }

    #[test]
    fn cbf_decrease_holds_for_the_applied_control() {
        let mut config = setpoint_config();
        config.static_obstacles = vec![StaticObstacle {
            x: 0.5,
            y: 0.25,
            r: 0.05,
        }];
        let gamma = config.gamma;
        let mut mpc = Mpc::new(&config).unwrap();
        let model = Unicycle::new();

        // Approach the obstacle head-on from close range.
        let x0 = Vector3::new(0.2, 0.1, 0.46);
        let step = mpc.step(0.1, 0.0, &x0).unwrap();
        let x1 = model.step(0.1, &x0, &step.u);

        let margin: float = 0.1 + 0.05 + 0.03;
        let h = |x: &Vector3| {
            (x[0] - 0.5).powi(2) + (x[1] - 0.25).powi(2) - margin * margin
        };
        assert!(h(&x1) >= (1.0 - gamma) * h(&x0) - 1e-4);
    }

    #[test]
    fn predicted_states_follow_the_model() {
        let mut mpc = Mpc::new(&setpoint_config()).unwrap();
        let model = Unicycle::new();
        let x0 = Vector3::zeros();
        let step = mpc.step(0.1, 0.0, &x0).unwrap();
        let mut x = x0;
        for k in 0..10 {
            x = model.step(0.1, &x, &step.predicted_controls[k]);
            assert_relative_eq!(step.predicted_states[k + 1], x, epsilon = 1e-12);
        }
    }
}
