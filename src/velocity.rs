//! Overdamped dynamics: velocities are linear in the applied forces and
//! torques through a friction coefficient and the particle's geometric
//! length scale. Degenerate inputs yield zero velocity rather than errors.

use biofilm_common::Vec2;

use crate::particle::Particle;

/// Linear velocity `v = F / (eta * L)`; zero for non-positive `eta` or `L`.
pub fn linear_velocity(force: Vec2, eta: f64, effective_length: f64) -> Vec2 {
    if eta <= 0.0 || effective_length <= 0.0 {
        return Vec2::zero();
    }
    force / (eta * effective_length)
}

/// Angular velocity `omega = 12 * tau / (eta * L^3)`, clamped to the safety
/// bound; zero for non-positive `eta` or `L`.
pub fn angular_velocity(torque: f64, eta: f64, effective_length: f64, max_speed: f64) -> f64 {
    if eta <= 0.0 || effective_length <= 0.0 {
        return 0.0;
    }
    let omega = 12.0 * torque / (eta * effective_length.powi(3));
    omega.clamp(-max_speed, max_speed)
}

/// Applies one timestep: `position += v * dt` and a renormalised rotation by
/// `omega * dt`. There is no boundary reflection or wrap.
pub fn advance(p: &mut Particle, v: Vec2, omega: f64, dt: f64) {
    p.position += v * dt;
    p.rotate(omega * dt);
}
