use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use biofilm_common::SimulationConfig;

mod contact;
mod forces;
mod nutrient;
mod output;
mod particle;
mod simulation;
mod spatial;
mod velocity;

use output::CsvSink;
use simulation::Simulation;

/// Command-line arguments for the simulation engine.
#[derive(Parser, Debug)]
#[command(author, version, about = "2D individual-based biofilm colony simulator")]
struct Args {
    /// Path to the INI configuration file
    #[arg(long, default_value = "config.ini")]
    config: PathBuf,
}

fn main() -> Result<()> {
    let mut builder = Builder::from_default_env();
    builder
        .format(|buf, record| writeln!(buf, "{} - {}", record.level(), record.args()))
        .filter(None, LevelFilter::Info)
        .init();

    let args = Args::parse();
    info!("Starting biofilm simulation engine...");

    info!("Loading configuration from {}...", args.config.display());
    let config = SimulationConfig::load(&args.config).context("configuration loading failed")?;
    config.log_summary();

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    let start_init = Instant::now();
    let mut sim = Simulation::new(config.sim_params());
    sim.start();
    info!(
        "Simulation initialized with {} particles in {:.2} ms.",
        sim.particles().len(),
        start_init.elapsed().as_secs_f64() * 1000.0
    );

    let mut sink = CsvSink::create("simulation_output")?;

    let total_ticks = sim.params().num_ticks;
    info!("Starting simulation loop for {} ticks...", total_ticks);
    let start = Instant::now();
    let progress_interval = (total_ticks / 10).max(1);

    for tick in 0..total_ticks {
        sim.step();
        sink.write_frame(tick, sim.particles())?;

        if (tick + 1) % progress_interval == 0 || tick + 1 == total_ticks {
            info!(
                "Tick [{}/{}] | Particles: {} | Elapsed: {:.2} s",
                tick + 1,
                total_ticks,
                sim.particles().len(),
                start.elapsed().as_secs_f64()
            );
        }
    }

    sink.finish()?;

    let field = sim.nutrient();
    let mut total = 0.0;
    for j in 0..field.height() {
        for i in 0..field.width() {
            total += field.concentration_at(i, j);
        }
    }
    info!(
        "Mean nutrient concentration at end: {:.4}",
        total / (field.width() * field.height()) as f64
    );
    info!(
        "Simulation finished: {} ticks in {:.3} seconds, {} particles.",
        sim.tick(),
        start.elapsed().as_secs_f64(),
        sim.particles().len()
    );
    Ok(())
}
