pub mod config;
pub mod sim_params;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::SimulationConfig;
pub use sim_params::SimParams;
pub use vecmath::{angle_to_vec, Vec2};
