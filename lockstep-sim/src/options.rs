//! Command-line options of the simulation driver.

use std::path::PathBuf;

/// Run a co-simulation from a system description.
#[derive(Debug, Default, clap::Parser)]
#[command(version, about)]
pub struct SimOptions {
    /// The system description (JSON) to run.
    #[arg(long)]
    pub model: PathBuf,

    /// Directory for per-component result files. Overrides the results
    /// settings of the description; default is `results`.
    #[arg(short = 'o', long)]
    pub output_dir: Option<PathBuf>,

    /// Simulation start time, default is to use the description's task
    /// settings.
    #[arg(short = 's', long)]
    pub start_time: Option<f64>,

    /// Simulation stop time, default is to use the description's task
    /// settings.
    #[arg(short = 'f', long)]
    pub stop_time: Option<f64>,

    /// Coupling step size for the stepping.
    #[arg(long = "ss")]
    pub step_size: Option<f64>,

    /// Disable results storage.
    #[arg(long)]
    pub no_results: bool,
}
