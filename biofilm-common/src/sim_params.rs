use std::f64::consts::PI;

/// Radius of the neighbourhood used for pair forces; also the spatial hash
/// cell side, so a 3x3 tile block always covers the cutoff disk.
pub const NEIGHBOR_RADIUS: f64 = 4.0;

/// Safety clamp on angular velocity (4*pi rad per unit time).
pub const MAX_ANGULAR_SPEED: f64 = 4.0 * PI;

/// Tolerance below which two centres count as coincident.
pub const PARALLEL_TOLERANCE: f64 = 1e-12;

/// Runtime parameters derived from the configuration, used frequently during
/// simulation steps. Built once by `SimulationConfig::sim_params` and threaded
/// through constructors; never mutated.
#[derive(Debug, Clone)]
pub struct SimParams {
    // Domain (informational; particles are not confined to it)
    pub domain_width: f64,
    pub domain_height: f64,

    // Initial population
    pub initial_count: u32,

    // Cell geometry
    pub max_length: f64,
    pub diameter: f64,
    pub sqrt_diameter: f64,
    /// Reference spherocylinder area at the division length, used to
    /// normalise the growth rate.
    pub avg_cell_area: f64,

    // EPS geometry
    pub eps_diameter: f64,
    pub eps_radius: f64,

    // Growth / division / secretion
    pub growth_rate: f64,
    pub division_length: f64,
    /// Reserved; not used numerically by the core rules.
    pub division_rate: f64,
    pub eps_production_rate: f64,
    /// Per-tick Bernoulli success probability for secretion (k_eps / 10).
    pub eps_secretion_probability: f64,

    // Forces
    pub motility_force: f64,
    /// Fallback elastic modulus for pair types outside the modulus table.
    pub repulsion_force: f64,
    pub em_eps_eps: f64,
    pub em_eps_cell: f64,
    pub em_cell_cell: f64,

    // Friction
    pub zeta_cell: f64,
    pub zeta_eps: f64,

    // Nutrient field
    pub nutrient_concentration: f64,
    pub nutrient_consumption_rate: f64,
    pub diffusion_rate: f64,
    pub grid_width: usize,
    pub grid_height: usize,
    pub grid_cell_size: f64,

    // Density sensing
    pub cell_density_threshold: f64,
    pub eps_density_threshold: f64,
    pub sensing_radius: f64,
    pub sensing_radius_sq: f64,

    // Neighbourhood cutoff
    pub neighbor_radius: f64,
    pub neighbor_radius_sq: f64,

    // Numerical safety
    pub max_angular_speed: f64,
    pub parallel_tolerance: f64,

    // Time
    pub dt: f64,
    pub num_ticks: u64,

    // Randomness
    pub seed: u64,
}
