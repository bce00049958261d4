// Horizon QP in delta form around a nominal trajectory (x̄, ū).
//
// Decision variables z = [Δx_1 .. Δx_N, Δu_0 .. Δu_{N-1}]. The nominal is an
// exact rollout of the nonlinear model, so the linearised state-transition
// equalities carry no defect term:
//
//   Δx_{k+1} = A_k Δx_k + B_k Δu_k,    Δx_0 = 0
//
// Cost is the second-order expansion of Σ e_kᵀQe_k plus the input-rate
// penalty Σ (u_k - u_{k-1})ᵀR(u_k - u_{k-1}); safety rows come in
// pre-linearised from the constraint builder.

use log::warn;
use osqp::{Problem, Settings, Status};

use prelude::*;

use crate::safety::ConstraintRow;
use crate::sparse::TripletMat;

const NX: usize = 3;
const NU: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// No feasible point for the current state and constraint set.
    #[error("optimisation problem is infeasible at the current state")]
    Infeasible,
    /// The solver hit its iteration limit without converging.
    #[error("solver iteration limit reached without convergence")]
    IterationLimit,
    #[error("failed to set up the optimisation problem: {0}")]
    Setup(String),
    #[error("solver returned an unexpected status")]
    Solver,
}

pub struct QpSolution {
    pub dx: Vec<Vector3>,
    pub du: Vec<Vector2>,
}

pub struct OsqpMpc {
    N: usize,
    Q: Vector3,
    R: Vector2,
    u_min: Vector2,
    u_max: Vector2,
    settings: Settings,
}

impl OsqpMpc {
    pub fn new(N: usize, Q: Vector3, R: Vector2, u_min: Vector2, u_max: Vector2) -> OsqpMpc {
        let settings = Settings::default()
            .verbose(false)
            .polish(true)
            .eps_abs(1e-5)
            .eps_rel(1e-5)
            .max_iter(20_000);
        OsqpMpc {
            N,
            Q,
            R,
            u_min,
            u_max,
            settings,
        }
    }

    fn xi(&self, k: usize) -> usize {
        debug_assert!(k >= 1 && k <= self.N);
        (k - 1) * NX
    }

    fn ui(&self, k: usize) -> usize {
        debug_assert!(k < self.N);
        self.N * NX + k * NU
    }

    /// Solves one delta QP. `errors[k-1]` is x̄_k - x_ref_k for stages
    /// 1..=N; `A`/`B` are the stage Jacobians; `u_prev` is the input applied
    /// before the horizon, anchoring the first rate penalty.
    pub fn solve(
        &self,
        errors: &[Vector3],
        A: &[Matrix3],
        B: &[Matrix3x2],
        u_bar: &[Vector2],
        u_prev: &Vector2,
        safety_rows: &[ConstraintRow],
    ) -> Result<QpSolution, SolveError> {
        let N = self.N;
        assert_eq!(errors.len(), N);
        assert_eq!(A.len(), N);
        assert_eq!(B.len(), N);
        assert_eq!(u_bar.len(), N);

        let n = N * (NX + NU);
        let m = N * NX + N * NU + safety_rows.len();

        // Objective. OSQP minimises ½zᵀPz + qᵀz.
        let mut P = TripletMat::new(n, n);
        let mut q = vec![0.0; n];

        for k in 1..=N {
            let xi = self.xi(k);
            for i in 0..NX {
                P.push(xi + i, xi + i, 2.0 * self.Q[i]);
                q[xi + i] = 2.0 * self.Q[i] * errors[k - 1][i];
            }
        }

        // Input-rate penalty: Δu_k couples to Δu_{k+1}.
        for k in 0..N {
            let ui = self.ui(k);
            let d_k = if k == 0 {
                u_bar[0] - u_prev
            } else {
                u_bar[k] - u_bar[k - 1]
            };
            let d_k1 = if k + 1 < N {
                u_bar[k + 1] - u_bar[k]
            } else {
                Vector2::zeros()
            };
            for j in 0..NU {
                let doubled = if k + 1 < N { 2.0 } else { 1.0 };
                P.push(ui + j, ui + j, 2.0 * self.R[j] * doubled);
                if k + 1 < N {
                    P.push(ui + j, self.ui(k + 1) + j, -2.0 * self.R[j]);
                }
                q[ui + j] = 2.0 * self.R[j] * (d_k[j] - d_k1[j]);
            }
        }

        let mut A_mat = TripletMat::new(m, n);
        let mut l = vec![0.0; m];
        let mut u = vec![0.0; m];

        // State-transition equalities.
        for k in 0..N {
            let row = k * NX;
            for i in 0..NX {
                A_mat.push(row + i, self.xi(k + 1) + i, 1.0);
            }
            if k >= 1 {
                for i in 0..NX {
                    for j in 0..NX {
                        A_mat.push(row + i, self.xi(k) + j, -A[k][(i, j)]);
                    }
                }
            }
            for i in 0..NX {
                for j in 0..NU {
                    A_mat.push(row + i, self.ui(k) + j, -B[k][(i, j)]);
                }
            }
            // l = u = 0 already.
        }

        // Actuator bounds on the absolute input.
        let bounds_start = N * NX;
        for k in 0..N {
            for j in 0..NU {
                let row = bounds_start + k * NU + j;
                A_mat.push(row, self.ui(k) + j, 1.0);
                let lo = self.u_min[j] - u_bar[k][j];
                let hi = self.u_max[j] - u_bar[k][j];
                // The nominal can drift outside the bounds by solver
                // tolerance; keep the interval well formed.
                l[row] = min(lo, hi);
                u[row] = hi;
            }
        }

        // Safety inequalities.
        let safety_start = bounds_start + N * NU;
        for (idx, c) in safety_rows.iter().enumerate() {
            let row = safety_start + idx;
            if c.stage >= 1 {
                for j in 0..NX {
                    A_mat.push(row, self.xi(c.stage) + j, c.x_coeffs[j]);
                }
            }
            if let Some((uk, coeffs)) = c.u_coeffs {
                for j in 0..NU {
                    A_mat.push(row, self.ui(uk) + j, coeffs[j]);
                }
            }
            l[row] = c.lower;
            u[row] = c.upper;
        }

        let mut problem = Problem::new(
            P.build_csc(),
            &q,
            A_mat.build_csc(),
            &l,
            &u,
            &self.settings,
        )
        .map_err(|e| SolveError::Setup(format!("{:?}", e)))?;

        let z = match problem.solve() {
            Status::Solved(solution) => solution.x().to_vec(),
            Status::SolvedInaccurate(solution) => {
                warn!("QP solved to reduced accuracy");
                solution.x().to_vec()
            }
            Status::MaxIterationsReached(_) => return Err(SolveError::IterationLimit),
            Status::PrimalInfeasible(_) | Status::PrimalInfeasibleInaccurate(_) => {
                return Err(SolveError::Infeasible)
            }
            Status::DualInfeasible(_) | Status::DualInfeasibleInaccurate(_) => {
                return Err(SolveError::Infeasible)
            }
            _ => return Err(SolveError::Solver),
        };

        let dx = (1..=N)
            .map(|k| Vector3::from_column_slice(&z[self.xi(k)..self.xi(k) + NX]))
            .collect();
        let du = (0..N)
            .map(|k| Vector2::from_column_slice(&z[self.ui(k)..self.ui(k) + NU]))
            .collect();
        Ok(QpSolution { dx, du })
    }

    pub fn input_bounds(&self) -> (Vector2, Vector2) {
        (self.u_min, self.u_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use control_model::{ControlModel, Unicycle};

    // A one-stage horizon with quadratic position cost and trivial dynamics
    // has a closed-form optimum; check the assembled QP reproduces it.
    #[test]
    fn single_stage_unconstrained_optimum() {
        let model = Unicycle::new();
        let Q = Vector3::new(1.0, 1.0, 0.0);
        let R = Vector2::new(0.0001, 0.0001);
        let qp = OsqpMpc::new(
            1,
            Q,
            R,
            Vector2::new(-10.0, -10.0),
            Vector2::new(10.0, 10.0),
        );

        // Start at the origin heading +x, target x = 0.1 after one step of
        // dt = 1: the optimal v is ~0.1.
        let x0 = Vector3::zeros();
        let u0 = Vector2::zeros();
        let x1 = model.step(1.0, &x0, &u0);
        let (A, B) = model.linearise(1.0, &x0, &u0);
        let errors = [x1 - Vector3::new(0.1, 0.0, 0.0)];

        let sol = qp
            .solve(&errors, &[A], &[B], &[u0], &Vector2::zeros(), &[])
            .unwrap();
        assert_relative_eq!(sol.du[0][0], 0.1, epsilon = 1e-3);
        assert_relative_eq!(sol.du[0][1], 0.0, epsilon = 1e-3);
        // The state delta obeys the linearised dynamics.
        assert_relative_eq!(sol.dx[0][0], sol.du[0][0], epsilon = 1e-4);
    }

    #[test]
    fn actuator_bounds_are_hard() {
        let model = Unicycle::new();
        let Q = Vector3::new(100.0, 100.0, 0.0);
        let R = Vector2::new(0.001, 0.001);
        let qp = OsqpMpc::new(
            1,
            Q,
            R,
            Vector2::new(-0.26, -1.8),
            Vector2::new(0.26, 1.8),
        );

        let x0 = Vector3::zeros();
        let u0 = Vector2::zeros();
        let x1 = model.step(0.1, &x0, &u0);
        let (A, B) = model.linearise(0.1, &x0, &u0);
        // Far-away target: the unconstrained optimum would exceed v_limit.
        let errors = [x1 - Vector3::new(5.0, 0.0, 0.0)];

        let sol = qp
            .solve(&errors, &[A], &[B], &[u0], &Vector2::zeros(), &[])
            .unwrap();
        assert!(sol.du[0][0] <= 0.26 + 1e-6);
        assert_relative_eq!(sol.du[0][0], 0.26, epsilon = 1e-4);
    }

    #[test]
    fn infeasible_rows_are_reported() {
        let model = Unicycle::new();
        let qp = OsqpMpc::new(
            1,
            Vector3::new(1.0, 1.0, 0.0),
            Vector2::new(0.01, 0.01),
            Vector2::new(-0.26, -1.8),
            Vector2::new(0.26, 1.8),
        );
        let x0 = Vector3::zeros();
        let u0 = Vector2::zeros();
        let (A, B) = model.linearise(0.1, &x0, &u0);
        // A state row no reachable Δx_1 can satisfy under the bounds.
        let row = ConstraintRow {
            stage: 1,
            x_coeffs: Vector3::new(1.0, 0.0, 0.0),
            u_coeffs: None,
            lower: 10.0,
            upper: INFINITY,
        };
        let err = qp
            .solve(
                &[Vector3::zeros()],
                &[A],
                &[B],
                &[u0],
                &Vector2::zeros(),
                &[row],
            )
            .unwrap_err();
        assert!(matches!(err, SolveError::Infeasible));
    }
}
