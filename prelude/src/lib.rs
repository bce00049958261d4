pub use nalgebra;

#[allow(non_camel_case_types)]
pub type float = f64;

pub use std::f64::consts::PI;

pub const INFINITY: float = f64::INFINITY;
pub const NEG_INFINITY: float = f64::NEG_INFINITY;

pub type Vector2 = nalgebra::Vector2<float>;
pub type Vector3 = nalgebra::Vector3<float>;
pub type Matrix2 = nalgebra::Matrix2<float>;
pub type Matrix3 = nalgebra::Matrix3<float>;
pub type Matrix3x2 = nalgebra::Matrix3x2<float>;

pub fn min<T: Copy + PartialOrd>(a: T, b: T) -> T {
    if b < a {
        b
    } else {
        a
    }
}

pub fn max<T: Copy + PartialOrd>(a: T, b: T) -> T {
    if b > a {
        b
    } else {
        a
    }
}

/// Shifts `b` by multiples of 2π until it lies within π of `a`.
pub fn phase_unwrap(a: float, mut b: float) -> float {
    if a.is_infinite() || b.is_infinite() {
        return b;
    }
    while b > a + PI {
        b -= 2.0 * PI;
    }
    while b < a - PI {
        b += 2.0 * PI;
    }
    b
}

/// Wraps an angular difference into (-π, π].
pub fn wrap_angle(delta: float) -> float {
    delta.sin().atan2(delta.cos())
}
