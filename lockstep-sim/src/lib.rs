//! Driver for the lockstep co-simulation core: loads a JSON system
//! description, runs the composed model, and stores per-component CSV
//! results.

#![deny(clippy::all)]

pub mod options;
pub mod storage;

use anyhow::Context;

use lockstep_input::task::{BackendKind, StoreLevelKind};
use lockstep_input::InputRoot;

use lockstep::task::NoopRecorder;
use lockstep::{FinishState, Model, Task};

use crate::options::SimOptions;
use crate::storage::CsvRecorder;

/// Statistics of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct SimStats {
    pub end_time: f64,
    pub num_steps: u64,
    pub finish_state: FinishState,
}

fn load_description(options: &SimOptions) -> anyhow::Result<InputRoot> {
    let file = std::fs::File::open(&options.model)
        .with_context(|| format!("Opening model description {}", options.model.display()))?;
    let mut root: InputRoot =
        serde_json::from_reader(std::io::BufReader::new(file)).context("Reading model description")?;

    // command-line values take precedence over the description
    if let Some(start) = options.start_time {
        root.task.start_time = Some(start);
    }
    if let Some(stop) = options.stop_time {
        root.task.end_time = Some(stop);
    }
    if let Some(step) = options.step_size {
        root.task.delta_time = Some(step);
    }

    Ok(root)
}

/// Run the co-simulation described by the given options.
pub fn simulate(options: &SimOptions) -> anyhow::Result<SimStats> {
    let root = load_description(options)?;

    let mut task = Task::from_input(&root.task)?;
    let mut model = Model::read(&root.config, &root.model, None)?;
    model.setup(&task)?;
    task.setup(&model)?;
    model.initialize(&task)?;

    let backend = root.task.results.backend.unwrap_or_default();
    let store = !options.no_results
        && backend == BackendKind::Csv
        && task.store_level() != StoreLevelKind::None;

    let finish_state = if store {
        let output_dir = options
            .output_dir
            .clone()
            .or_else(|| root.task.results.output_directory.clone())
            .unwrap_or_else(|| "results".into());
        let mut recorder = CsvRecorder::new(output_dir);
        task.run(&mut model, &mut recorder)?
    } else {
        task.run(&mut model, &mut NoopRecorder)?
    };

    Ok(SimStats {
        end_time: task.params().time,
        num_steps: task.params().num_steps,
        finish_state,
    })
}
