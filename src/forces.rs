//! Force and torque kernels.
//!
//! Each kernel is side-effect free and operates on a focal particle plus its
//! neighbourhood (indices into the population slice). Forces are summed
//! independently by the caller; torques are scalars, counter-clockwise
//! positive.

use biofilm_common::{SimParams, Vec2};
use rand::Rng;

use crate::contact;
use crate::particle::{Particle, Shape};

/// Bound of the uniform thermal force components.
pub const RANDOM_FORCE_BOUND: f64 = 0.001;

/// Elastic modulus for a particle pair: cell-cell, eps-eps or mixed.
pub fn elastic_modulus(a: &Particle, b: &Particle, params: &SimParams) -> f64 {
    match (a.is_cell(), b.is_cell()) {
        (true, true) => params.em_cell_cell,
        (false, false) => params.em_eps_eps,
        _ => params.em_eps_cell,
    }
}

/// Hertzian contact force magnitude `E * sqrt(d0) * h^(3/2)` for overlap `h`.
pub fn repulsion_magnitude(a: &Particle, b: &Particle, overlap: f64, params: &SimParams) -> f64 {
    if overlap <= 0.0 {
        return 0.0;
    }
    elastic_modulus(a, b, params) * params.sqrt_diameter * overlap.powf(1.5)
}

/// Unit normal from `b`'s centre to `a`'s centre; `(1, 0)` when the centres
/// coincide within the tolerance.
fn pair_normal(a: &Particle, b: &Particle, tolerance: f64) -> Vec2 {
    let delta = a.position - b.position;
    let dist = delta.length();
    if dist <= tolerance {
        Vec2::new(1.0, 0.0)
    } else {
        delta / dist
    }
}

/// Total repulsive contact force on `a` from its neighbourhood. The overlap
/// is measured against the reference contact diameter d0.
pub fn repulsion(
    a: &Particle,
    neighbors: &[usize],
    particles: &[Particle],
    params: &SimParams,
) -> Vec2 {
    let mut total = Vec2::zero();
    for &j in neighbors {
        let b = &particles[j];
        let overlap = params.diameter - contact::min_distance(a, b);
        if overlap > 0.0 {
            let magnitude = repulsion_magnitude(a, b, overlap, params);
            total += pair_normal(a, b, params.parallel_tolerance) * magnitude;
        }
    }
    total
}

/// Constant self-propulsion along the current orientation; cells only.
pub fn motility(p: &Particle, params: &SimParams) -> Vec2 {
    match p.shape {
        Shape::Cell { .. } => p.orientation * params.motility_force,
        Shape::Eps { .. } => Vec2::zero(),
    }
}

/// Thermal kick with independent components uniform in the bound, drawn from
/// the caller's deterministic stream. Independent of particle state.
pub fn random_force<R: Rng + ?Sized>(rng: &mut R) -> Vec2 {
    Vec2::new(
        rng.random_range(-RANDOM_FORCE_BOUND..=RANDOM_FORCE_BOUND),
        rng.random_range(-RANDOM_FORCE_BOUND..=RANDOM_FORCE_BOUND),
    )
}

/// Total repulsive torque about `a`'s centre: for each overlapping neighbour
/// the contact force is applied at the contact point, `tau = lever x F`.
pub fn repulsive_torque(
    a: &Particle,
    neighbors: &[usize],
    particles: &[Particle],
    params: &SimParams,
) -> f64 {
    let mut total = 0.0;
    for &j in neighbors {
        let b = &particles[j];
        let overlap = params.diameter - contact::min_distance(a, b);
        if overlap > 0.0 {
            let magnitude = repulsion_magnitude(a, b, overlap, params);
            let force = pair_normal(a, b, params.parallel_tolerance) * magnitude;
            let lever = contact::contact_point(a, b, params.parallel_tolerance) - a.position;
            total += lever.cross(force);
        }
    }
    total
}
