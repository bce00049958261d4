// Discrete-time unicycle, x = (x, y, θ), u = (v, ω):
//
//   x_{k+1} = x_k + B(θ_k) u_k Ts
//
// The off-diagonal `a` terms keep the decoupling matrix non-singular at
// v = 0 so the system has a well-defined relative degree for barrier
// constraints; `a` is small enough to leave the dynamics unchanged.

use prelude::*;

use crate::ControlModel;

const RELATIVE_DEGREE_EPS: float = 1e-9;

pub struct Unicycle {
    a: float,
}

impl Unicycle {
    pub fn new() -> Unicycle {
        Unicycle {
            a: RELATIVE_DEGREE_EPS,
        }
    }

    /// Input matrix B(θ).
    pub fn input_matrix(&self, theta: float) -> Matrix3x2 {
        let (sin, cos) = theta.sin_cos();
        #[rustfmt::skip]
        let B = Matrix3x2::new(
            cos, -self.a * sin,
            sin, self.a * cos,
            0.0, 1.0,
        );
        B
    }
}

impl Default for Unicycle {
    fn default() -> Unicycle {
        Unicycle::new()
    }
}

impl ControlModel for Unicycle {
    fn step(&self, dt: float, x: &Vector3, u: &Vector2) -> Vector3 {
        x + self.input_matrix(x[2]) * u * dt
    }

    fn linearise(&self, dt: float, x0: &Vector3, u0: &Vector2) -> (Matrix3, Matrix3x2) {
        let (sin, cos) = x0[2].sin_cos();
        let (v, omega) = (u0[0], u0[1]);

        #[rustfmt::skip]
        let A = Matrix3::new(
            1.0, 0.0, dt * (-v * sin - self.a * omega * cos),
            0.0, 1.0, dt * (v * cos - self.a * omega * sin),
            0.0, 0.0, 1.0,
        );

        let B = self.input_matrix(x0[2]) * dt;

        (A, B)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zero_control_is_a_fixed_point() {
        let model = Unicycle::new();
        let zero = Vector2::zeros();
        for &x in &[
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, -1.0, PI / 2.0),
            Vector3::new(-0.3, 0.7, -2.9),
        ] {
            let next = model.step(0.1, &x, &zero);
            assert_relative_eq!(next, x, epsilon = 1e-15);
        }
    }

    #[test]
    fn step_matches_closed_form() {
        let model = Unicycle::new();
        let x = Vector3::new(1.0, 2.0, PI / 4.0);
        let u = Vector2::new(0.2, 0.5);
        let dt = 0.1;
        let next = model.step(dt, &x, &u);
        assert_relative_eq!(next[0], 1.0 + 0.2 * (PI / 4.0).cos() * dt, epsilon = 1e-9);
        assert_relative_eq!(next[1], 2.0 + 0.2 * (PI / 4.0).sin() * dt, epsilon = 1e-9);
        assert_relative_eq!(next[2], PI / 4.0 + 0.5 * dt, epsilon = 1e-12);
    }

    #[test]
    fn linearise_matches_finite_differences() {
        let model = Unicycle::new();
        let x0 = Vector3::new(0.4, -0.2, 1.1);
        let u0 = Vector2::new(0.15, -0.8);
        let dt = 0.1;
        let (A, B) = model.linearise(dt, &x0, &u0);

        let h = 1e-7;
        for j in 0..3 {
            let mut xp = x0;
            xp[j] += h;
            let col = (model.step(dt, &xp, &u0) - model.step(dt, &x0, &u0)) / h;
            for i in 0..3 {
                assert_relative_eq!(A[(i, j)], col[i], epsilon = 1e-6);
            }
        }
        for j in 0..2 {
            let mut up = u0;
            up[j] += h;
            let col = (model.step(dt, &x0, &up) - model.step(dt, &x0, &u0)) / h;
            for i in 0..3 {
                assert_relative_eq!(B[(i, j)], col[i], epsilon = 1e-6);
            }
        }
    }
}
