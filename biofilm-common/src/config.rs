use anyhow::{bail, Context, Result};
use log::{info, warn};
use std::collections::HashMap;
use std::f64::consts::PI;
use std::path::Path;

use crate::sim_params::{
    SimParams, MAX_ANGULAR_SPEED, NEIGHBOR_RADIUS, PARALLEL_TOLERANCE,
};

/// Simulation configuration loaded from an INI-style key/value file.
///
/// Section headers and `#` comments are ignored; inline `#` comments are
/// stripped. Missing keys fall back to defaults with a warning; malformed
/// numbers abort start-up.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub width: u32,
    pub height: u32,
    pub initial_count: u32,
    /// Maximum cell length (lmax).
    pub length: f64,
    /// Cell diameter (dc); also the reference contact diameter d0.
    pub diameter: f64,
    /// EPS particle diameter (deps).
    pub eps_diameter: f64,
    /// Linear growth rate (phi).
    pub growth_rate: f64,
    /// Critical length at which a cell divides.
    pub division_length: f64,
    /// Division rate (kdiv); reserved, not used numerically by the core rules.
    pub division_rate: f64,
    /// EPS production rate (keps).
    pub eps_production_rate: f64,
    pub motility_force: f64,
    pub repulsion_force: f64,
    pub em_eps_eps: f64,
    pub em_eps_cell: f64,
    pub em_cell_cell: f64,
    pub friction_coefficient_cell: f64,
    pub friction_coefficient_eps: f64,
    /// Initial nutrient concentration (C0).
    pub nutrient_concentration: f64,
    pub nutrient_consumption_rate: f64,
    pub diffusion_rate: f64,
    pub cell_density_threshold: f64,
    pub eps_density_threshold: f64,
    pub local_sensing_radius: f64,
    pub grid_width: u32,
    pub grid_height: u32,
    pub grid_cell_size: f64,
    pub delta_time: f64,
    pub num_ticks: u64,
    /// Root seed for every stochastic stream; reruns with the same seed are
    /// bit-identical regardless of thread count.
    pub random_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            width: 800,
            height: 800,
            initial_count: 1,
            length: 5.0,
            diameter: 1.0,
            eps_diameter: 0.5,
            growth_rate: 3.5,
            division_length: 5.0,
            division_rate: 1.0,
            eps_production_rate: 1.0,
            motility_force: 300.0,
            repulsion_force: 100.0,
            em_eps_eps: 200.0,
            em_eps_cell: 200.0,
            em_cell_cell: 200.0,
            friction_coefficient_cell: 200.0,
            friction_coefficient_eps: 200.0,
            nutrient_concentration: 3.0,
            nutrient_consumption_rate: 1.0,
            diffusion_rate: 300.0,
            cell_density_threshold: 5.0,
            eps_density_threshold: 0.3,
            local_sensing_radius: 2.0,
            grid_width: 50,
            grid_height: 50,
            grid_cell_size: 10.0,
            delta_time: 0.1,
            num_ticks: 1000,
            random_seed: 12345,
        }
    }
}

impl SimulationConfig {
    /// Loads and validates the configuration from an INI-style file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        let config = Self::from_ini_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses configuration text. Unknown keys are ignored; recognised keys
    /// missing from the text keep their defaults (with a warning).
    pub fn from_ini_str(text: &str) -> Result<Self> {
        let entries = parse_ini(text);
        let mut config = Self::default();

        config.width = get_u32(&entries, "width", config.width)?;
        config.height = get_u32(&entries, "height", config.height)?;
        config.initial_count = get_u32(&entries, "initial_count", config.initial_count)?;
        config.length = get_f64(&entries, "length", config.length)?;
        config.diameter = get_f64(&entries, "diameter", config.diameter)?;
        config.eps_diameter = get_f64(&entries, "eps_diameter", config.eps_diameter)?;
        config.growth_rate = get_f64(&entries, "growth_rate", config.growth_rate)?;
        config.division_length = get_f64(&entries, "division_length", config.division_length)?;
        config.division_rate = get_f64(&entries, "division_rate", config.division_rate)?;
        config.eps_production_rate =
            get_f64(&entries, "eps_production_rate", config.eps_production_rate)?;
        config.motility_force = get_f64(&entries, "motility_force", config.motility_force)?;
        config.repulsion_force = get_f64(&entries, "repulsion_force", config.repulsion_force)?;
        config.em_eps_eps = get_f64(&entries, "em_eps_eps", config.em_eps_eps)?;
        config.em_eps_cell = get_f64(&entries, "em_eps_cell", config.em_eps_cell)?;
        config.em_cell_cell = get_f64(&entries, "em_cell_cell", config.em_cell_cell)?;
        config.friction_coefficient_cell = get_f64(
            &entries,
            "friction_coefficient_cell",
            config.friction_coefficient_cell,
        )?;
        config.friction_coefficient_eps = get_f64(
            &entries,
            "friction_coefficient_eps",
            config.friction_coefficient_eps,
        )?;
        config.nutrient_concentration = get_f64(
            &entries,
            "nutrient_concentration",
            config.nutrient_concentration,
        )?;
        config.nutrient_consumption_rate = get_f64(
            &entries,
            "nutrient_consumption_rate",
            config.nutrient_consumption_rate,
        )?;
        config.diffusion_rate = get_f64(&entries, "diffusion_rate", config.diffusion_rate)?;
        config.cell_density_threshold = get_f64(
            &entries,
            "cell_density_threshold",
            config.cell_density_threshold,
        )?;
        config.eps_density_threshold = get_f64(
            &entries,
            "eps_density_threshold",
            config.eps_density_threshold,
        )?;
        config.local_sensing_radius =
            get_f64(&entries, "local_sensing_radius", config.local_sensing_radius)?;
        config.grid_width = get_u32(&entries, "grid_width", config.grid_width)?;
        config.grid_height = get_u32(&entries, "grid_height", config.grid_height)?;
        config.grid_cell_size = get_f64(&entries, "grid_cell_size", config.grid_cell_size)?;
        config.delta_time = get_f64(&entries, "delta_time", config.delta_time)?;
        config.num_ticks = get_u64(&entries, "num_ticks", config.num_ticks)?;
        config.random_seed = get_u64(&entries, "random_seed", config.random_seed)?;

        Ok(config)
    }

    /// Rejects configurations that would make the simulation numerically
    /// ill-defined.
    pub fn validate(&self) -> Result<()> {
        if self.initial_count == 0 {
            bail!("initial_count must be at least 1");
        }
        if self.diameter <= 0.0 {
            bail!("diameter must be positive");
        }
        if self.eps_diameter <= 0.0 {
            bail!("eps_diameter must be positive");
        }
        if self.length < 2.0 * self.diameter {
            // Initial cells start at half the maximum length and must satisfy
            // length >= diameter.
            bail!("length must be at least twice the diameter");
        }
        if self.division_length < 2.0 * self.diameter {
            // Daughters take half the mother's length and must satisfy
            // length >= diameter.
            bail!("division_length must be at least twice the diameter");
        }
        if self.friction_coefficient_cell <= 0.0 || self.friction_coefficient_eps <= 0.0 {
            bail!("friction coefficients must be positive");
        }
        if self.growth_rate < 0.0
            || self.eps_production_rate < 0.0
            || self.nutrient_concentration < 0.0
            || self.nutrient_consumption_rate < 0.0
            || self.diffusion_rate < 0.0
        {
            bail!("rates and concentrations must be non-negative");
        }
        if self.local_sensing_radius <= 0.0 {
            bail!("local_sensing_radius must be positive");
        }
        if self.grid_width < 3 || self.grid_height < 3 {
            bail!("grid_width and grid_height must be at least 3");
        }
        if self.grid_cell_size <= 0.0 {
            bail!("grid_cell_size must be positive");
        }
        if self.delta_time <= 0.0 {
            bail!("delta_time must be positive");
        }

        // Explicit FD stability guidance, documented rather than enforced.
        if self.diffusion_rate > 0.0 {
            let stable_dt = 0.25 * self.grid_cell_size * self.grid_cell_size / self.diffusion_rate;
            if self.delta_time > stable_dt {
                warn!(
                    "delta_time {} exceeds the diffusion stability bound {:.4} \
                     (0.25 * dx^2 / D); the nutrient field may oscillate",
                    self.delta_time, stable_dt
                );
            }
        }
        Ok(())
    }

    /// Logs the loaded configuration for verification.
    pub fn log_summary(&self) {
        info!("Domain: {}x{} um", self.width, self.height);
        info!(
            "Bacteria: {} initial cells, lmax {} um, d {} um, growth {} um/h, division at {} um",
            self.initial_count, self.length, self.diameter, self.growth_rate, self.division_length
        );
        info!(
            "EPS: d {} um, production rate {} /h",
            self.eps_diameter, self.eps_production_rate
        );
        info!(
            "Forces: motility {}, moduli cell-cell {} / eps-cell {} / eps-eps {}",
            self.motility_force, self.em_cell_cell, self.em_eps_cell, self.em_eps_eps
        );
        info!(
            "Friction: cell {}, EPS {}",
            self.friction_coefficient_cell, self.friction_coefficient_eps
        );
        info!(
            "Nutrients: C0 {}, consumption {} /h, diffusion {} um^2/h",
            self.nutrient_concentration, self.nutrient_consumption_rate, self.diffusion_rate
        );
        info!(
            "Density thresholds: cell {} um^2, EPS {} um^2, sensing radius {} um",
            self.cell_density_threshold, self.eps_density_threshold, self.local_sensing_radius
        );
        info!(
            "Grid: {}x{} nodes, {} um/node; dt {}, {} ticks, seed {}",
            self.grid_width,
            self.grid_height,
            self.grid_cell_size,
            self.delta_time,
            self.num_ticks,
            self.random_seed
        );
    }

    /// Converts the configuration into the runtime parameter record.
    pub fn sim_params(&self) -> SimParams {
        let r0 = self.diameter / 2.0;
        // Reference area of a cell at the division length.
        let avg_cell_area = PI * r0 * r0 + 1.5 * r0 * self.division_length;

        SimParams {
            domain_width: self.width as f64,
            domain_height: self.height as f64,
            initial_count: self.initial_count,
            max_length: self.length,
            diameter: self.diameter,
            sqrt_diameter: self.diameter.sqrt(),
            avg_cell_area,
            eps_diameter: self.eps_diameter,
            eps_radius: self.eps_diameter / 2.0,
            growth_rate: self.growth_rate,
            division_length: self.division_length,
            division_rate: self.division_rate,
            eps_production_rate: self.eps_production_rate,
            eps_secretion_probability: self.eps_production_rate / 10.0,
            motility_force: self.motility_force,
            repulsion_force: self.repulsion_force,
            em_eps_eps: self.em_eps_eps,
            em_eps_cell: self.em_eps_cell,
            em_cell_cell: self.em_cell_cell,
            zeta_cell: self.friction_coefficient_cell,
            zeta_eps: self.friction_coefficient_eps,
            nutrient_concentration: self.nutrient_concentration,
            nutrient_consumption_rate: self.nutrient_consumption_rate,
            diffusion_rate: self.diffusion_rate,
            grid_width: self.grid_width as usize,
            grid_height: self.grid_height as usize,
            grid_cell_size: self.grid_cell_size,
            cell_density_threshold: self.cell_density_threshold,
            eps_density_threshold: self.eps_density_threshold,
            sensing_radius: self.local_sensing_radius,
            sensing_radius_sq: self.local_sensing_radius * self.local_sensing_radius,
            neighbor_radius: NEIGHBOR_RADIUS,
            neighbor_radius_sq: NEIGHBOR_RADIUS * NEIGHBOR_RADIUS,
            max_angular_speed: MAX_ANGULAR_SPEED,
            parallel_tolerance: PARALLEL_TOLERANCE,
            dt: self.delta_time,
            num_ticks: self.num_ticks,
            seed: self.random_seed,
        }
    }
}

/// Parses INI-style text into a key/value map. Blank lines, `#` comment lines
/// and `[section]` headers are skipped; inline `#` comments are stripped.
fn parse_ini(text: &str) -> HashMap<String, String> {
    let mut entries = HashMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('[') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = match value.find('#') {
            Some(pos) => &value[..pos],
            None => value,
        };
        entries.insert(key.trim().to_string(), value.trim().to_string());
    }
    entries
}

fn get_f64(entries: &HashMap<String, String>, key: &str, default: f64) -> Result<f64> {
    match entries.get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid number for '{key}': '{raw}'")),
        None => {
            warn!("using default value for {key}: {default}");
            Ok(default)
        }
    }
}

fn get_u32(entries: &HashMap<String, String>, key: &str, default: u32) -> Result<u32> {
    match entries.get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid integer for '{key}': '{raw}'")),
        None => {
            warn!("using default value for {key}: {default}");
            Ok(default)
        }
    }
}

fn get_u64(entries: &HashMap<String, String>, key: &str, default: u64) -> Result<u64> {
    match entries.get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid integer for '{key}': '{raw}'")),
        None => {
            warn!("using default value for {key}: {default}");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_text_is_empty() {
        let config = SimulationConfig::from_ini_str("").unwrap();
        assert_eq!(config, SimulationConfig::default());
    }

    #[test]
    fn parses_keys_sections_and_comments() {
        let text = "\
# domain settings
[simulation]
width = 400
height=600
diameter = 2.0   # inline comment
initial_count = 8
delta_time = 0.05
";
        let config = SimulationConfig::from_ini_str(text).unwrap();
        assert_eq!(config.width, 400);
        assert_eq!(config.height, 600);
        assert_eq!(config.diameter, 2.0);
        assert_eq!(config.initial_count, 8);
        assert_eq!(config.delta_time, 0.05);
        // Untouched keys keep their defaults.
        assert_eq!(config.grid_width, 50);
        assert_eq!(config.motility_force, 300.0);
    }

    #[test]
    fn malformed_number_is_fatal() {
        assert!(SimulationConfig::from_ini_str("diameter = abc").is_err());
        assert!(SimulationConfig::from_ini_str("num_ticks = 1.5").is_err());
    }

    #[test]
    fn validation_rejects_degenerate_geometry() {
        let mut config = SimulationConfig::default();
        config.diameter = 0.0;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.division_length = 1.5 * config.diameter;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.grid_width = 2;
        assert!(config.validate().is_err());

        let mut config = SimulationConfig::default();
        config.delta_time = 0.0;
        assert!(config.validate().is_err());

        assert!(SimulationConfig::default().validate().is_ok());
    }

    #[test]
    fn derived_params_match_config() {
        let config = SimulationConfig::default();
        let params = config.sim_params();
        assert_eq!(params.diameter, 1.0);
        assert_eq!(params.eps_radius, 0.25);
        assert_eq!(params.eps_secretion_probability, 0.1);
        assert_eq!(params.grid_width, 50);
        assert_eq!(params.neighbor_radius, 4.0);
        let r0 = 0.5;
        let expected_avg = std::f64::consts::PI * r0 * r0 + 1.5 * r0 * 5.0;
        assert!((params.avg_cell_area - expected_avg).abs() < 1e-12);
        assert!((params.max_angular_speed - 4.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
