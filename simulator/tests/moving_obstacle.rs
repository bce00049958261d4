// Go-to-goal with a moving obstacle crossing the straight-line path.

use controller::{Config, ControlType, MovingObstacle, Strategy};
use prelude::*;
use simulator::{run_simulation, RunConfig};

const R_ROBOT: float = 0.1;
const R_OBS: float = 0.1;
const SAFETY_DIST: float = 0.03;

fn config() -> RunConfig {
    RunConfig {
        sim_time: 110,
        Ts: 0.1,
        x0: [0.0, 0.0, 0.0],
        process_noise: 0.0,
        seed: 99,
        controller: Config {
            strategy: Strategy::MpcCbf,
            control_type: ControlType::Setpoint,
            N: 20,
            Q: [15.0, 15.0, 0.005],
            R: [2.0, 0.5],
            v_limit: 0.26,
            omega_limit: 1.8,
            r: R_ROBOT,
            gamma: 0.3,
            safety_dist: SAFETY_DIST,
            sqp_iters: 5,
            goal: Some([2.0, 1.0, PI / 2.0]),
            trajectory: None,
            A: None,
            w: None,
            static_obstacles: Vec::new(),
            // Drifts from (2, 0.5) towards the robot's path at 0.1 m/s.
            moving_obstacles: vec![MovingObstacle {
                ax: -0.1,
                bx: 2.0,
                ay: 0.0,
                by: 0.5,
                r: R_OBS,
            }],
        },
    }
}

#[test]
fn margin_to_the_moving_obstacle_is_kept() {
    let history = run_simulation(&config()).unwrap();
    assert!(history.failed_step.is_none());

    let margin = R_ROBOT + R_OBS + SAFETY_DIST;
    for (k, x) in history.states.iter().enumerate() {
        let t = k as float * 0.1;
        let (xo, yo) = (-0.1 * t + 2.0, 0.5);
        let d2 = (x[0] - xo).powi(2) + (x[1] - yo).powi(2);
        assert!(
            d2 >= margin * margin - 1e-3,
            "step {}: squared distance {} to the moving obstacle below {}",
            k,
            d2,
            margin * margin
        );
    }
}

#[test]
fn per_step_obstacle_positions_are_recorded() {
    let history = run_simulation(&config()).unwrap();
    assert_eq!(history.moving_obstacles.len(), 110);
    let (x, y) = history.moving_obstacles[10][0];
    assert!((x - 1.9).abs() < 1e-12);
    assert!((y - 0.5).abs() < 1e-12);
}
