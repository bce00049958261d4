use std::time::Instant;

use log::{error, info};

use controller::{ConfigError, Mpc};
use prelude::*;

use crate::config::RunConfig;
use crate::estimator::{Estimator, StateFeedback};
use crate::plant::Plant;

/// Everything a run produces: the closed-loop trajectory plus the
/// per-step quantities external plotting/analysis collaborators consume.
pub struct History {
    /// Visited states, initial state first (sim_time + 1 on success).
    pub states: Vec<Vector3>,
    /// Applied controls, one per executed step.
    pub controls: Vec<Vector2>,
    /// Stage cost at the state each step was solved from.
    pub costs: Vec<float>,
    /// Reference points actually used (trajectory tracking only).
    pub references: Vec<(float, float)>,
    /// Moving-obstacle positions per step (moving obstacles only).
    pub moving_obstacles: Vec<Vec<(float, float)>>,
    /// Boundary-to-boundary obstacle clearance per executed step.
    pub clearances: Vec<float>,
    /// Last predicted horizon, for plotting collaborators.
    pub predicted_horizon: Vec<Vector3>,
    /// Controller solve time per step, milliseconds.
    pub solve_millis: Vec<float>,
    /// Step at which the optimiser failed, ending the run early.
    pub failed_step: Option<usize>,
}

impl History {
    fn with_capacity(n: usize) -> History {
        History {
            states: Vec::with_capacity(n + 1),
            controls: Vec::with_capacity(n),
            costs: Vec::with_capacity(n),
            references: Vec::new(),
            moving_obstacles: Vec::new(),
            clearances: Vec::new(),
            predicted_horizon: Vec::new(),
            solve_millis: Vec::with_capacity(n),
            failed_step: None,
        }
    }

    pub fn final_state(&self) -> &Vector3 {
        self.states.last().expect("history always holds the initial state")
    }

    pub fn total_cost(&self) -> float {
        self.costs.iter().sum()
    }

    pub fn min_clearance(&self) -> Option<float> {
        self.clearances
            .iter()
            .copied()
            .fold(None, |acc, c| Some(min(acc.unwrap_or(INFINITY), c)))
    }
}

/// Runs the closed-loop simulation: solve, apply the first control to the
/// plant, estimate, advance time; repeats for `sim_time` steps. Reaching
/// the goal early does not end the loop; a failed solve does, and is
/// recorded in the history.
pub fn run_simulation(config: &RunConfig) -> Result<History, ConfigError> {
    let mut mpc = Mpc::new(&config.controller)?;
    let mut plant = Plant::new(config.process_noise, config.seed);
    let mut estimator = StateFeedback;

    let dt = config.Ts;
    let n_steps = config.sim_time as usize;
    let mut history = History::with_capacity(n_steps);

    let mut x = config.initial_state();
    history.states.push(x);

    for k in 0..n_steps {
        let t = k as float * dt;

        if let Some(reference) = mpc.reference_point(t) {
            history.references.push(reference);
        }
        let moving = mpc.moving_obstacle_positions(t);
        if !moving.is_empty() {
            history.moving_obstacles.push(moving);
        }
        if let Some(clearance) = mpc.clearance(t, &x) {
            history.clearances.push(clearance);
        }
        history.costs.push(mpc.stage_cost(t, &x));

        let solve_start = Instant::now();
        let step = match mpc.step(dt, t, &x) {
            Ok(step) => step,
            Err(e) => {
                error!("solve failed at step {}: {}", k, e);
                history.failed_step = Some(k);
                break;
            }
        };
        history
            .solve_millis
            .push(solve_start.elapsed().as_secs_f64() * 1e3);

        let y = plant.step(dt, &x, &step.u);
        x = estimator.step(&y);

        info!(
            "step {}: state ({:.3}, {:.3}, {:.3}), control ({:.3}, {:.3})",
            k, x[0], x[1], x[2], step.control.v, step.control.omega
        );

        history.controls.push(step.u);
        history.states.push(x);
        history.predicted_horizon = step.predicted_states;
    }

    Ok(history)
}
