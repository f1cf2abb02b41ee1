//! Pairwise contact geometry for the heterogeneous particle population.
//!
//! All variant dispatch on particle shape lives here; the force kernels and
//! the driver treat particles uniformly. Distances are surface-to-surface.

use biofilm_common::vecmath::{closest_point_on_segment, segment_closest_points, Vec2};

use crate::particle::{Particle, Shape};

/// Tolerance applied by the collision predicate to absorb floating-point
/// noise at exact touching.
const COLLISION_TOLERANCE: f64 = 1e-10;

/// Shortest surface-to-surface distance between two particles, clamped to
/// be non-negative (overlapping particles report 0).
pub fn min_distance(a: &Particle, b: &Particle) -> f64 {
    surface_separation(a, b).max(0.0)
}

/// Whether the two particles' surfaces overlap.
pub fn is_colliding(a: &Particle, b: &Particle) -> bool {
    if a.id == b.id && a.is_cell() == b.is_cell() {
        return false;
    }
    surface_separation(a, b) < COLLISION_TOLERANCE
}

/// Signed surface separation; negative values measure interpenetration.
fn surface_separation(a: &Particle, b: &Particle) -> f64 {
    match (a.shape, b.shape) {
        (Shape::Eps { radius: ra }, Shape::Eps { radius: rb }) => {
            a.position.distance(b.position) - (ra + rb)
        }
        (Shape::Cell { .. }, Shape::Cell { .. }) => rod_rod_separation(a, b),
        (Shape::Eps { radius }, Shape::Cell { .. }) => sphere_rod_separation(a.position, radius, b),
        (Shape::Cell { .. }, Shape::Eps { radius }) => sphere_rod_separation(b.position, radius, a),
    }
}

/// Sphere against spherocylinder: nearest of the body axis segment and the
/// two hemisphere centres, minus both radii.
fn sphere_rod_separation(center: Vec2, sphere_radius: f64, rod: &Particle) -> f64 {
    let (start, end) = rod.axis_endpoints();
    let (left_cap, right_cap) = rod.cap_centers();
    let nearest = center
        .distance(closest_point_on_segment(center, start, end))
        .min(center.distance(left_cap))
        .min(center.distance(right_cap));
    nearest - rod.contact_radius() - sphere_radius
}

/// Spherocylinder against spherocylinder: minimum over segment-segment, the
/// four cap-centre-to-segment candidates and the four cap-to-cap candidates,
/// minus the radii sum.
fn rod_rod_separation(a: &Particle, b: &Particle) -> f64 {
    let (a0, a1) = a.axis_endpoints();
    let (b0, b1) = b.axis_endpoints();
    let (a_left, a_right) = a.cap_centers();
    let (b_left, b_right) = b.cap_centers();

    let (pa, pb) = segment_closest_points(a0, a1, b0, b1);
    let mut nearest = pa.distance(pb);
    for cap in [a_left, a_right] {
        nearest = nearest.min(cap.distance(closest_point_on_segment(cap, b0, b1)));
    }
    for cap in [b_left, b_right] {
        nearest = nearest.min(cap.distance(closest_point_on_segment(cap, a0, a1)));
    }
    for cap_a in [a_left, a_right] {
        for cap_b in [b_left, b_right] {
            nearest = nearest.min(cap_a.distance(cap_b));
        }
    }

    nearest - a.contact_radius() - b.contact_radius()
}

/// A representative point on the contact manifold between `a` and `b`, where
/// the repulsive force is applied for torque purposes.
pub fn contact_point(a: &Particle, b: &Particle, tolerance: f64) -> Vec2 {
    match (a.shape, b.shape) {
        (Shape::Cell { .. }, Shape::Cell { .. }) => {
            let (a0, a1) = a.axis_endpoints();
            let (b0, b1) = b.axis_endpoints();
            let (pa, pb) = segment_closest_points(a0, a1, b0, b1);
            (pa + pb) * 0.5
        }
        (Shape::Eps { radius }, Shape::Eps { .. }) => {
            let delta = a.position - b.position;
            let dist = delta.length();
            if dist <= tolerance {
                return a.position;
            }
            a.position - delta * (radius / dist)
        }
        (Shape::Eps { radius }, Shape::Cell { .. }) => {
            sphere_rod_contact(a.position, radius, b, tolerance)
        }
        (Shape::Cell { .. }, Shape::Eps { radius }) => {
            sphere_rod_contact(b.position, radius, a, tolerance)
        }
    }
}

/// Contact point on the sphere surface, along the line towards the closest
/// point on the rod's axis segment.
fn sphere_rod_contact(center: Vec2, sphere_radius: f64, rod: &Particle, tolerance: f64) -> Vec2 {
    let (start, end) = rod.axis_endpoints();
    let q = closest_point_on_segment(center, start, end);
    let delta = q - center;
    let dist = delta.length();
    if dist <= tolerance {
        return center;
    }
    center + delta * (sphere_radius / dist)
}
