use std::ops::{Add, AddAssign, Div, Mul, Neg, Sub};

/// A simple 2D vector struct.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// Creates a new Vec2.
    pub const fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    /// Creates a zero vector.
    pub const fn zero() -> Self {
        Vec2 { x: 0.0, y: 0.0 }
    }

    /// Calculates the squared length (magnitude) of the vector.
    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Calculates the length (magnitude) of the vector.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns a normalized version of the vector (unit vector).
    /// Returns a zero vector if the original vector's length is zero.
    pub fn normalize_or_zero(&self) -> Self {
        let len_sq = self.length_squared();
        if len_sq > 0.0 {
            let inv_len = 1.0 / len_sq.sqrt();
            Vec2 {
                x: self.x * inv_len,
                y: self.y * inv_len,
            }
        } else {
            Vec2::zero()
        }
    }

    /// Calculates the dot product with another vector.
    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// The 2D scalar cross product (z-component of the 3D cross product).
    /// Positive when `other` lies counter-clockwise of `self`.
    pub fn cross(&self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Calculates the squared distance to another vector (point).
    pub fn distance_squared(&self, other: Vec2) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Calculates the distance to another vector (point).
    pub fn distance(&self, other: Vec2) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Returns this vector rotated by `angle` radians (standard 2x2 rotation
    /// matrix, counter-clockwise positive).
    pub fn rotated(&self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Vec2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl Add for Vec2 {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;
    fn mul(self, scalar: f64) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl Div<f64> for Vec2 {
    type Output = Self;
    fn div(self, scalar: f64) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
        }
    }
}

impl Neg for Vec2 {
    type Output = Self;
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

/// Converts an angle (in radians) to a unit vector.
pub fn angle_to_vec(angle_rad: f64) -> Vec2 {
    Vec2::new(angle_rad.cos(), angle_rad.sin())
}

/// Returns the point on segment `[a, b]` closest to `p`.
/// Degenerate segments (a == b) return `a`.
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let d = b - a;
    let len_sq = d.length_squared();
    if len_sq == 0.0 {
        return a;
    }
    let t = ((p - a).dot(d) / len_sq).clamp(0.0, 1.0);
    a + d * t
}

/// Returns the pair of closest points between segments `[p1, q1]` and
/// `[p2, q2]`, solving the clamped 2D linear system for the segment
/// parameters. Handles degenerate (point-like) and parallel segments.
pub fn segment_closest_points(p1: Vec2, q1: Vec2, p2: Vec2, q2: Vec2) -> (Vec2, Vec2) {
    const EPS: f64 = 1e-12;

    let d1 = q1 - p1;
    let d2 = q2 - p2;
    let r = p1 - p2;
    let a = d1.length_squared();
    let e = d2.length_squared();
    let f = d2.dot(r);

    if a <= EPS && e <= EPS {
        return (p1, p2);
    }
    if a <= EPS {
        let t = (f / e).clamp(0.0, 1.0);
        return (p1, p2 + d2 * t);
    }

    let c = d1.dot(r);
    if e <= EPS {
        let s = (-c / a).clamp(0.0, 1.0);
        return (p1 + d1 * s, p2);
    }

    let b = d1.dot(d2);
    let denom = a * e - b * b;
    // Parallel segments have a degenerate system; anchor s at 0 and let the
    // t-clamp below pick the closest opposing point.
    let mut s = if denom.abs() > EPS {
        ((b * f - c * e) / denom).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let mut t = (b * s + f) / e;
    if t < 0.0 {
        t = 0.0;
        s = (-c / a).clamp(0.0, 1.0);
    } else if t > 1.0 {
        t = 1.0;
        s = ((b - c) / a).clamp(0.0, 1.0);
    }

    (p1 + d1 * s, p2 + d2 * t)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    fn assert_vec_eq(a: Vec2, b: Vec2) {
        assert!(
            (a.x - b.x).abs() < TOL && (a.y - b.y).abs() < TOL,
            "expected {b:?}, got {a:?}"
        );
    }

    #[test]
    fn rotation_preserves_length() {
        let v = Vec2::new(3.0, 4.0);
        for k in 0..16 {
            let rotated = v.rotated(k as f64 * 0.7);
            assert!((rotated.length() - 5.0).abs() < 1e-12);
        }
    }

    #[test]
    fn rotation_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotated(std::f64::consts::FRAC_PI_2);
        assert_vec_eq(v, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn normalize_zero_vector_is_zero() {
        assert_vec_eq(Vec2::zero().normalize_or_zero(), Vec2::zero());
        let n = Vec2::new(0.0, -2.0).normalize_or_zero();
        assert_vec_eq(n, Vec2::new(0.0, -1.0));
    }

    #[test]
    fn closest_point_interior_and_clamped() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(4.0, 0.0);
        assert_vec_eq(
            closest_point_on_segment(Vec2::new(1.0, 3.0), a, b),
            Vec2::new(1.0, 0.0),
        );
        assert_vec_eq(
            closest_point_on_segment(Vec2::new(-2.0, 1.0), a, b),
            a,
        );
        assert_vec_eq(
            closest_point_on_segment(Vec2::new(9.0, -1.0), a, b),
            b,
        );
        // Degenerate segment collapses to its single point.
        assert_vec_eq(closest_point_on_segment(Vec2::new(5.0, 5.0), a, a), a);
    }

    #[test]
    fn crossing_segments_touch() {
        let (c1, c2) = segment_closest_points(
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, -1.0),
            Vec2::new(0.0, 1.0),
        );
        assert!(c1.distance(c2) < 1e-12);
        assert_vec_eq(c1, Vec2::zero());
    }

    #[test]
    fn skew_segments_closest_pair() {
        // Endpoint of the second segment projects onto the interior of the first.
        let (c1, c2) = segment_closest_points(
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(2.0, 1.0),
            Vec2::new(5.0, 4.0),
        );
        assert_vec_eq(c1, Vec2::new(2.0, 0.0));
        assert_vec_eq(c2, Vec2::new(2.0, 1.0));
    }

    #[test]
    fn parallel_segments_distance() {
        let (c1, c2) = segment_closest_points(
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(0.0, 1.5),
            Vec2::new(2.0, 1.5),
        );
        assert!((c1.distance(c2) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_segments_fall_back_to_points() {
        let p = Vec2::new(1.0, 1.0);
        let (c1, c2) = segment_closest_points(p, p, Vec2::new(3.0, 1.0), Vec2::new(5.0, 1.0));
        assert_vec_eq(c1, p);
        assert_vec_eq(c2, Vec2::new(3.0, 1.0));
    }
}
